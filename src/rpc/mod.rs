//! Transport-agnostic JSON RPC subsystem.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         RPC Stack                            │
//! │                                                              │
//! │  ┌───────────┐ enqueue ┌─────────────┐ poll ┌──────────────┐ │
//! │  │ Transport │────────▶│ ChannelHub  │─────▶│  Dispatcher  │ │
//! │  │ (web,mesh)│         │ (per-channel│      │  → registry  │ │
//! │  └───────────┘         │   queues)   │      │  → handler   │ │
//! │        ▲               └─────────────┘      └──────┬───────┘ │
//! │        │            send_response (per channel policy)│      │
//! │        └──────────────────────────────────────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Requests are JSON objects naming a `"function"`. Each transport owns
//! one channel; the dispatcher serves enabled channels round-robin, one
//! request per channel per pass, and routes responses according to the
//! channel's [`channels::ResponsePolicy`].

use core::fmt;

use serde_json::Value;

pub mod channels;
pub mod dispatcher;
pub mod message;
pub mod registry;
pub mod transport;

pub use channels::{ChannelHub, ChannelId, ChannelState, ResponsePolicy};
pub use dispatcher::{DispatchStats, Dispatcher, DispatcherConfig};
pub use message::{Address, RpcRequest};
pub use registry::FunctionRegistry;
pub use transport::Transport;

/// Handler outcome: an optional response document or an error that the
/// dispatcher turns into an error response.
pub type HandlerResult = Result<Option<Value>, RpcError>;

#[derive(Debug, Clone, PartialEq)]
pub enum RpcError {
    UnknownFunction(String),
    MissingFunctionName,
    InvalidParams(&'static str),
    Validation { field: String, reason: String },
    Storage(String),
    Failed(String),
}

impl RpcError {
    /// The `"error"` code placed in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownFunction(_) => "UnknownFunction",
            Self::MissingFunctionName => "MissingFunctionName",
            Self::InvalidParams(_) => "InvalidParams",
            Self::Validation { .. } => "ValidationFailed",
            Self::Storage(_) => "StorageError",
            Self::Failed(_) => "HandlerFailure",
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownFunction(name) => write!(f, "no function named '{name}'"),
            Self::MissingFunctionName => write!(f, "request has no 'function' field"),
            Self::InvalidParams(what) => write!(f, "invalid parameters: {what}"),
            Self::Validation { field, reason } => write!(f, "'{field}' rejected: {reason}"),
            Self::Storage(msg) => write!(f, "storage: {msg}"),
            Self::Failed(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for RpcError {}
