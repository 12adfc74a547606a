//! Request and response documents.

use core::fmt;

use serde_json::{Map, Value};

use super::RpcError;

/// Name of the request member that selects the handler.
pub const FUNCTION_KEY: &str = "function";

/// Largest request body a transport will accept.
pub const MAX_REQUEST_BYTES: usize = 4096;

/// Where a request came from, or where a response should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    /// Web connection, identified by the adapter's request counter.
    Connection(u32),
    /// Mesh peer MAC.
    Peer([u8; 6]),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(id) => write!(f, "conn#{id}"),
            Self::Peer(mac) => write!(
                f,
                "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
                mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedRequest {
    TooLarge,
    InvalidJson,
    NotAnObject,
}

impl fmt::Display for MalformedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge => write!(f, "request exceeds {MAX_REQUEST_BYTES} bytes"),
            Self::InvalidJson => write!(f, "request is not valid JSON"),
            Self::NotAnObject => write!(f, "request is not a JSON object"),
        }
    }
}

impl std::error::Error for MalformedRequest {}

/// A parsed request: always a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    body: Map<String, Value>,
}

impl RpcRequest {
    /// Parse raw transport bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, MalformedRequest> {
        if bytes.len() > MAX_REQUEST_BYTES {
            return Err(MalformedRequest::TooLarge);
        }
        let value: Value =
            serde_json::from_slice(bytes).map_err(|_| MalformedRequest::InvalidJson)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, MalformedRequest> {
        match value {
            Value::Object(body) => Ok(Self { body }),
            _ => Err(MalformedRequest::NotAnObject),
        }
    }

    /// The requested function name, if present and a string.
    pub fn function(&self) -> Option<&str> {
        self.body.get(FUNCTION_KEY).and_then(Value::as_str)
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(Value::as_str)
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }
}

/// Build the error document sent back for a failed request.
///
/// ```text
/// {"error": "ValidationFailed", "function": "UpdateSetting",
///  "message": "...", "field": "Frequency"}
/// ```
pub fn error_response(function: Option<&str>, err: &RpcError) -> Value {
    let mut obj = Map::new();
    obj.insert("error".into(), Value::from(err.code()));
    obj.insert(
        FUNCTION_KEY.into(),
        function.map_or(Value::Null, Value::from),
    );
    obj.insert("message".into(), Value::String(err.to_string()));
    if let Some(field) = err.field() {
        obj.insert("field".into(), Value::from(field));
    }
    Value::Object(obj)
}
