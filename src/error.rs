//! Unified error type for the beacon firmware.
//!
//! Subsystems keep their own precise error enums; this type is what the
//! boot path and the binary see. Every subsystem error converts into it.

use core::fmt;

use crate::rpc::RpcError;
use crate::rpc::channels::{ChannelError, EnqueueError};
use crate::settings::store::StoreError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Settings could not be read or written.
    Storage(StoreError),
    /// The settings document exceeded its capacity; trailing entries were
    /// not persisted.
    SchemaOverflow { dropped: usize },
    /// A request named a function nobody registered.
    UnknownFunction(String),
    /// A handler failed while serving a request.
    HandlerFailure(String),
    /// A transport channel operation failed.
    Channel(ChannelError),
    /// A request could not be queued.
    Enqueue(EnqueueError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "settings storage: {e}"),
            Self::SchemaOverflow { dropped } => {
                write!(f, "settings overflow: {dropped} entries not persisted")
            }
            Self::UnknownFunction(name) => write!(f, "unknown RPC function '{name}'"),
            Self::HandlerFailure(msg) => write!(f, "RPC handler failed: {msg}"),
            Self::Channel(e) => write!(f, "RPC channel: {e}"),
            Self::Enqueue(e) => write!(f, "RPC enqueue: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Storage(e)
    }
}

impl From<ChannelError> for Error {
    fn from(e: ChannelError) -> Self {
        Self::Channel(e)
    }
}

impl From<EnqueueError> for Error {
    fn from(e: EnqueueError) -> Self {
        Self::Enqueue(e)
    }
}

impl From<RpcError> for Error {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::UnknownFunction(name) => Self::UnknownFunction(name),
            other => Self::HandlerFailure(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
