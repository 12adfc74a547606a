//! Field beacon firmware library.
//!
//! Exposes the settings store, the RPC dispatch layer and the adapters
//! for integration testing and for the firmware binary. All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod drivers;
pub mod error;
pub mod rpc;
pub mod settings;

pub use error::{Error, Result};
