//! Transport abstraction: anything that can submit JSON requests and
//! deliver JSON responses.
//!
//! Concrete implementations:
//! - HTTP `POST /rpc` on the WiFi station ([`crate::adapters::web_rpc`])
//! - ESP-NOW peer frames ([`crate::adapters::mesh_rpc`])
//!
//! The dispatcher only ever holds an `Arc<dyn Transport>` per channel, so
//! adding a transport requires no change to the RPC logic.

use log::trace;
use serde_json::Value;

use super::message::{Address, RpcRequest};

pub trait Transport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Submit a parsed request into this transport's channel. Returns
    /// `false` if the channel is unassigned, disabled, or full.
    fn enqueue(&self, request: RpcRequest, origin: Address) -> bool;

    /// Deliver a response document.
    fn send_response(&self, response: &Value, destination: Address);
}

/// A transport that accepts nothing and discards every response.
/// Stands in for a subsystem that has no link yet.
pub struct NullTransport;

impl Transport for NullTransport {
    fn name(&self) -> &'static str {
        "null"
    }

    fn enqueue(&self, _request: RpcRequest, _origin: Address) -> bool {
        false
    }

    fn send_response(&self, _response: &Value, destination: Address) {
        trace!("RPC[null]: response for {} dropped", destination);
    }
}
