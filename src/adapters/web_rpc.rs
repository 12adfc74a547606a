//! Web RPC transport: HTTP `POST /rpc` on the WiFi station interface.
//!
//! ```text
//!  HTTP task                      dispatcher task
//!  ─────────                      ───────────────
//!  submit(body) ──enqueue──▶ channel ──▶ handler
//!  await_response(conn) ◀──── send_response(conn)
//! ```
//!
//! Each request gets a connection number; the HTTP task blocks on it
//! until the dispatcher delivers the matching response or the wait
//! times out. The channel starts disabled and is enabled once the
//! station has an IP address.

use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

#[cfg(target_os = "espidf")]
use log::info;
use log::{debug, warn};
use serde_json::{Value, json};

use crate::rpc::channels::{ChannelConfig, ChannelError, EnqueueError};
use crate::rpc::message::MalformedRequest;
use crate::rpc::{Address, ChannelHub, ChannelId, ResponsePolicy, RpcRequest, Transport};

pub const WEB_CHANNEL_CAPACITY: usize = 8;

/// Longest an HTTP request waits for its response.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Station interface events the adapter reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationEvent {
    GotIp,
    LostIp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    Malformed(MalformedRequest),
    Rejected(EnqueueError),
}

impl core::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "{e}"),
            Self::Rejected(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SubmitError {}

/// HTTP status and JSON body for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct WebReply {
    pub status: u16,
    pub body: Value,
}

pub struct WebRpcAdapter {
    hub: Arc<ChannelHub>,
    channel: AtomicI32,
    /// Held while the channel is being assigned.
    assigning: Mutex<()>,
    next_connection: AtomicU32,
    /// Connections waiting for a response; `Some` once it has arrived.
    waiting: Mutex<HashMap<u32, Option<Value>>>,
    delivered: Condvar,
}

impl WebRpcAdapter {
    pub fn new(hub: Arc<ChannelHub>) -> Arc<Self> {
        Arc::new(Self {
            hub,
            channel: AtomicI32::new(ChannelId::UNASSIGNED.raw()),
            assigning: Mutex::new(()),
            next_connection: AtomicU32::new(1),
            waiting: Mutex::new(HashMap::new()),
            delivered: Condvar::new(),
        })
    }

    pub fn channel_id(&self) -> ChannelId {
        ChannelId::from_raw(self.channel.load(Ordering::Acquire))
    }

    /// Register the web channel (disabled). Idempotent.
    pub fn attach(self: &Arc<Self>) -> Result<ChannelId, ChannelError> {
        let _assigning = self
            .assigning
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = self.channel_id();
        if current.is_assigned() {
            return Ok(current);
        }
        let config = ChannelConfig {
            label: "web",
            capacity: WEB_CHANNEL_CAPACITY,
            policy: ResponsePolicy::EchoToSender,
        };
        let id = self.hub.add_channel(config, Arc::clone(self) as Arc<dyn Transport>)?;
        self.channel.store(id.raw(), Ordering::Release);
        Ok(id)
    }

    pub fn on_station_event(&self, event: StationEvent) {
        let id = self.channel_id();
        let result = match event {
            StationEvent::GotIp => self.hub.enable(id),
            StationEvent::LostIp => self.hub.disable(id),
        };
        if let Err(e) = result {
            warn!("Web: {:?} ignored: {}", event, e);
        }
    }

    fn waiting(&self) -> MutexGuard<'_, HashMap<u32, Option<Value>>> {
        self.waiting
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Parse a request body and queue it. Returns the connection number
    /// to wait on.
    pub fn submit(&self, body: &[u8]) -> Result<u32, SubmitError> {
        let request = RpcRequest::from_slice(body).map_err(|e| {
            debug!("Web: malformed request: {}", e);
            SubmitError::Malformed(e)
        })?;
        let conn = self.next_connection.fetch_add(1, Ordering::Relaxed);
        self.waiting().insert(conn, None);

        if let Err(e) = self
            .hub
            .enqueue(self.channel_id(), request, Address::Connection(conn))
        {
            self.waiting().remove(&conn);
            warn!("Web: request refused: {}", e);
            return Err(SubmitError::Rejected(e));
        }
        Ok(conn)
    }

    /// Block until the response for `conn` arrives or `timeout` passes.
    /// The connection is forgotten either way.
    pub fn await_response(&self, conn: u32, timeout: Duration) -> Option<Value> {
        let guard = self.waiting();
        let (mut guard, _) = self
            .delivered
            .wait_timeout_while(guard, timeout, |w| matches!(w.get(&conn), Some(None)))
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let response = guard.remove(&conn).flatten();
        if response.is_none() {
            warn!("Web: conn#{} timed out", conn);
        }
        response
    }

    /// Full request cycle as the HTTP server sees it.
    pub fn handle(&self, body: &[u8], timeout: Duration) -> WebReply {
        let conn = match self.submit(body) {
            Ok(conn) => conn,
            Err(SubmitError::Malformed(e)) => return malformed(e),
            Err(SubmitError::Rejected(e)) => {
                let status = if e == EnqueueError::Full { 429 } else { 503 };
                return WebReply {
                    status,
                    body: json!({ "error": "Unavailable", "message": e.to_string() }),
                };
            }
        };
        match self.await_response(conn, timeout) {
            Some(body) => WebReply { status: 200, body },
            None => WebReply {
                status: 504,
                body: json!({ "error": "Timeout", "message": "no response from dispatcher" }),
            },
        }
    }

    /// Bind `POST /rpc` on a new HTTP server. The server lives as long as
    /// the returned handle.
    #[cfg(target_os = "espidf")]
    pub fn serve(
        self: &Arc<Self>,
    ) -> anyhow::Result<esp_idf_svc::http::server::EspHttpServer<'static>> {
        use esp_idf_svc::http::Method;
        use esp_idf_svc::http::server::{Configuration, EspHttpServer};
        use esp_idf_svc::io::{Read, Write};

        use crate::rpc::message::MAX_REQUEST_BYTES;

        let conf = Configuration {
            stack_size: 10 * 1024,
            ..Default::default()
        };
        let mut server = EspHttpServer::new(&conf)?;
        let adapter = Arc::clone(self);

        server.fn_handler::<anyhow::Error, _>("/rpc", Method::Post, move |mut req| {
            let len = req.content_len().unwrap_or(0) as usize;
            let reply = if len > MAX_REQUEST_BYTES {
                malformed(MalformedRequest::TooLarge)
            } else {
                let mut body = vec![0u8; len];
                if len > 0 {
                    req.read_exact(&mut body)?;
                }
                adapter.handle(&body, RESPONSE_TIMEOUT)
            };
            let bytes = serde_json::to_vec(&reply.body)?;
            req.into_response(
                reply.status,
                None,
                &[
                    ("Content-Type", "application/json; charset=utf-8"),
                    ("Access-Control-Allow-Origin", "*"),
                ],
            )?
            .write_all(&bytes)?;
            Ok(())
        })?;

        info!("Web: serving POST /rpc");
        Ok(server)
    }
}

fn malformed(e: MalformedRequest) -> WebReply {
    WebReply {
        status: 400,
        body: json!({ "error": "MalformedRequest", "message": e.to_string() }),
    }
}

impl Transport for WebRpcAdapter {
    fn name(&self) -> &'static str {
        "web"
    }

    fn enqueue(&self, request: RpcRequest, origin: Address) -> bool {
        match self.hub.enqueue(self.channel_id(), request, origin) {
            Ok(()) => true,
            Err(e) => {
                warn!("Web: request from {} refused: {}", origin, e);
                false
            }
        }
    }

    fn send_response(&self, response: &Value, destination: Address) {
        let Address::Connection(conn) = destination else {
            warn!("Web: cannot answer {}", destination);
            return;
        };
        let mut waiting = self.waiting();
        match waiting.get_mut(&conn) {
            Some(slot) => {
                *slot = Some(response.clone());
                self.delivered.notify_all();
            }
            None => debug!("Web: conn#{} gone, response dropped", conn),
        }
    }
}
