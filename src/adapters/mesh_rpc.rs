//! Mesh RPC transport: JSON frames over the ESP-NOW provisioning link.
//!
//! The channel is created the first time the link comes up and reused
//! afterwards:
//!
//! ```text
//!  Unassigned ──initialize──▶ Enabled ──deinitialize──▶ Disabled
//!                                ▲                          │
//!                                └────────initialize────────┘
//! ```
//!
//! Requests on this channel are fire-and-forget (dongle pushes such as
//! WiFi credentials), so the channel discards responses by default.

use core::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use serde_json::Value;

use crate::app::ports::{MeshLinkPort, ProvisioningLinkPort};
use crate::rpc::channels::{ChannelConfig, ChannelError, EnqueueError};
use crate::rpc::message::MalformedRequest;
use crate::rpc::{Address, ChannelHub, ChannelId, ResponsePolicy, RpcRequest, Transport};

pub const MESH_CHANNEL_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshError {
    Channel(ChannelError),
    /// The radio refused to start the link.
    LinkRefused,
}

impl core::fmt::Display for MeshError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Channel(e) => write!(f, "{e}"),
            Self::LinkRefused => write!(f, "mesh link refused to start"),
        }
    }
}

impl std::error::Error for MeshError {}

impl From<ChannelError> for MeshError {
    fn from(e: ChannelError) -> Self {
        Self::Channel(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    Malformed(MalformedRequest),
    Rejected(EnqueueError),
}

pub struct MeshRpcAdapter {
    hub: Arc<ChannelHub>,
    link: Arc<dyn MeshLinkPort>,
    channel: AtomicI32,
    /// Held while the channel is being assigned.
    assigning: Mutex<()>,
}

impl MeshRpcAdapter {
    pub fn new(hub: Arc<ChannelHub>, link: Arc<dyn MeshLinkPort>) -> Arc<Self> {
        Arc::new(Self {
            hub,
            link,
            channel: AtomicI32::new(ChannelId::UNASSIGNED.raw()),
            assigning: Mutex::new(()),
        })
    }

    pub fn channel_id(&self) -> ChannelId {
        ChannelId::from_raw(self.channel.load(Ordering::Acquire))
    }

    /// Assign the channel if needed, enable it, and start the link.
    pub fn initialize(self: &Arc<Self>) -> Result<ChannelId, MeshError> {
        let id = self.assign()?;
        self.hub.enable(id)?;
        if !self.link.start() {
            warn!("Mesh: link refused to start");
            self.hub.disable(id)?;
            return Err(MeshError::LinkRefused);
        }
        info!("Mesh: provisioning link up on {}", id);
        Ok(id)
    }

    fn assign(self: &Arc<Self>) -> Result<ChannelId, ChannelError> {
        let _assigning = self
            .assigning
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = self.channel_id();
        if current.is_assigned() {
            return Ok(current);
        }
        let config = ChannelConfig {
            label: "mesh",
            capacity: MESH_CHANNEL_CAPACITY,
            policy: ResponsePolicy::Discard,
        };
        let id = self
            .hub
            .add_channel(config, Arc::clone(self) as Arc<dyn Transport>)?;
        self.channel.store(id.raw(), Ordering::Release);
        Ok(id)
    }

    /// Handle one inbound radio frame.
    pub fn on_receive(&self, peer: [u8; 6], data: &[u8]) -> Result<(), FrameError> {
        let request = RpcRequest::from_slice(data).map_err(|e| {
            warn!("Mesh: malformed frame from {}: {}", Address::Peer(peer), e);
            FrameError::Malformed(e)
        })?;
        self.hub
            .enqueue(self.channel_id(), request, Address::Peer(peer))
            .map_err(|e| {
                warn!("Mesh: frame from {} refused: {}", Address::Peer(peer), e);
                FrameError::Rejected(e)
            })
    }
}

impl ProvisioningLinkPort for MeshRpcAdapter {
    /// Stop serving and take the link down. Queued requests stay queued.
    fn deinitialize(&self, disable_radio: bool) {
        let id = self.channel_id();
        if id.is_assigned() {
            if let Err(e) = self.hub.disable(id) {
                warn!("Mesh: disable failed: {}", e);
            }
        }
        self.link.stop(disable_radio);
        info!("Mesh: provisioning link down");
    }
}

impl Transport for MeshRpcAdapter {
    fn name(&self) -> &'static str {
        "mesh"
    }

    fn enqueue(&self, request: RpcRequest, origin: Address) -> bool {
        self.hub.enqueue(self.channel_id(), request, origin).is_ok()
    }

    fn send_response(&self, response: &Value, destination: Address) {
        let Address::Peer(mac) = destination else {
            warn!("Mesh: cannot answer {}", destination);
            return;
        };
        match serde_json::to_vec(response) {
            Ok(frame) => {
                if !self.link.send(&mac, &frame) {
                    warn!("Mesh: send to {} failed", destination);
                }
            }
            Err(e) => debug!("Mesh: response not encodable: {}", e),
        }
    }
}
