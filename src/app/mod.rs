//! Application core: settings orchestration and RPC handlers.
//!
//! All interaction with subsystems happens through **port traits**
//! defined in [`ports`], keeping this layer testable without hardware.

pub mod freshness;
pub mod handlers;
pub mod ports;
pub mod service;
pub mod subscribers;
