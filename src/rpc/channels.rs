//! RPC channels.
//!
//! Each transport owns one channel: a bounded FIFO of pending requests, an
//! enable flag, and a response policy. Channels live in a [`ChannelHub`]
//! shared (via `Arc`) by the transports that fill them and the dispatcher
//! that drains them.
//!
//! ```text
//!   Unassigned ──add_channel──▶ Disabled ◀──disable/enable──▶ Enabled
//! ```
//!
//! Queues are `embassy-sync` channels behind a critical-section mutex, so
//! transports may enqueue from any task while the dispatcher drains. A
//! slot is reserved before a request is queued and released after it is
//! taken, so the queue never holds more than the channel's capacity.
//!
//! Hub critical sections only move `Arc`s and integers; channels are
//! built and released outside them.

use core::cell::RefCell;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, info, warn};

use super::message::{Address, RpcRequest};
use super::transport::Transport;

/// Maximum number of channels (one per transport).
pub const MAX_CHANNELS: usize = 4;

/// Hard upper bound on a channel's queue depth.
pub const MAX_CHANNEL_DEPTH: usize = 16;

/// Channel handle. Transports hold [`ChannelId::UNASSIGNED`] until the
/// hub hands them a real id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(i32);

impl ChannelId {
    pub const UNASSIGNED: Self = Self(-1);

    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    pub const fn is_assigned(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_assigned() {
            write!(f, "ch{}", self.0)
        } else {
            write!(f, "unassigned")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Unassigned,
    Disabled,
    Enabled,
}

/// Where the dispatcher sends a handler's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponsePolicy {
    /// Back to the address the request came from.
    EchoToSender,
    /// Always to one configured destination.
    FixedDestination(Address),
    /// Nowhere.
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub label: &'static str,
    /// Queue depth in messages; clamped to [`MAX_CHANNEL_DEPTH`].
    pub capacity: usize,
    pub policy: ResponsePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    Unassigned,
    UnknownChannel(ChannelId),
    TableFull,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unassigned => write!(f, "channel id not assigned"),
            Self::UnknownChannel(id) => write!(f, "no channel {id}"),
            Self::TableFull => write!(f, "channel table full ({MAX_CHANNELS})"),
        }
    }
}

impl std::error::Error for ChannelError {}

/// Why a request was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    Unassigned,
    Disabled,
    Full,
}

impl fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unassigned => write!(f, "channel not assigned"),
            Self::Disabled => write!(f, "channel disabled"),
            Self::Full => write!(f, "channel full"),
        }
    }
}

impl std::error::Error for EnqueueError {}

/// A queued request with its origin.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub request: RpcRequest,
    pub origin: Address,
}

pub struct RpcChannel {
    /// Set once, when the hub files the channel.
    id: AtomicI32,
    label: &'static str,
    capacity: usize,
    /// Reserved slots; always at least `queue.len()`.
    reserved: AtomicUsize,
    policy: ResponsePolicy,
    enabled: AtomicBool,
    queue: Channel<CriticalSectionRawMutex, Envelope, MAX_CHANNEL_DEPTH>,
    transport: Arc<dyn Transport>,
}

impl RpcChannel {
    pub fn id(&self) -> ChannelId {
        ChannelId(self.id.load(Ordering::Acquire))
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> ResponsePolicy {
        self.policy
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    fn set_enabled(&self, on: bool) {
        self.enabled.store(on, Ordering::Release);
    }

    /// Queue a request. Disabled channels reject; a full queue applies
    /// backpressure to the caller.
    pub fn enqueue(&self, request: RpcRequest, origin: Address) -> Result<(), EnqueueError> {
        if !self.is_enabled() {
            return Err(EnqueueError::Disabled);
        }
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .map_err(|_| EnqueueError::Full)?;
        match self.queue.try_send(Envelope { request, origin }) {
            Ok(()) => Ok(()),
            Err(_) => {
                self.reserved.fetch_sub(1, Ordering::AcqRel);
                Err(EnqueueError::Full)
            }
        }
    }

    /// Next queued request, if any. Used by the dispatcher.
    pub fn try_next(&self) -> Option<Envelope> {
        let envelope = self.queue.try_receive().ok()?;
        self.reserved.fetch_sub(1, Ordering::AcqRel);
        Some(envelope)
    }
}

/// Registry of all channels.
pub struct ChannelHub {
    channels: Mutex<CriticalSectionRawMutex, RefCell<heapless::Vec<Arc<RpcChannel>, MAX_CHANNELS>>>,
}

impl ChannelHub {
    pub const fn new() -> Self {
        Self {
            channels: Mutex::new(RefCell::new(heapless::Vec::new())),
        }
    }

    /// Create a channel. New channels start disabled.
    pub fn add_channel(
        &self,
        config: ChannelConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<ChannelId, ChannelError> {
        let capacity = config.capacity.clamp(1, MAX_CHANNEL_DEPTH);
        if capacity != config.capacity {
            warn!(
                "RPC: '{}' capacity {} clamped to {}",
                config.label, config.capacity, capacity
            );
        }

        let channel = Arc::new(RpcChannel {
            id: AtomicI32::new(ChannelId::UNASSIGNED.0),
            label: config.label,
            capacity,
            reserved: AtomicUsize::new(0),
            policy: config.policy,
            enabled: AtomicBool::new(false),
            queue: Channel::new(),
            transport,
        });

        // A rejected channel is handed back so it is dropped after the
        // critical section ends.
        let filed = self.channels.lock(|cell| {
            let mut channels = cell.borrow_mut();
            if channels.is_full() {
                return Err(channel);
            }
            let id = ChannelId(channels.len() as i32);
            channel.id.store(id.0, Ordering::Release);
            channels.push(channel).map(|()| id)
        });

        match filed {
            Ok(id) => {
                info!(
                    "RPC: channel {} '{}' added (capacity {}, {:?})",
                    id, config.label, capacity, config.policy
                );
                Ok(id)
            }
            Err(_rejected) => {
                warn!("RPC: no room for channel '{}'", config.label);
                Err(ChannelError::TableFull)
            }
        }
    }

    pub fn get(&self, id: ChannelId) -> Option<Arc<RpcChannel>> {
        if !id.is_assigned() {
            return None;
        }
        self.channels
            .lock(|cell| cell.borrow().get(id.0 as usize).cloned())
    }

    fn lookup(&self, id: ChannelId) -> Result<Arc<RpcChannel>, ChannelError> {
        if !id.is_assigned() {
            return Err(ChannelError::Unassigned);
        }
        self.get(id).ok_or(ChannelError::UnknownChannel(id))
    }

    pub fn enable(&self, id: ChannelId) -> Result<(), ChannelError> {
        let channel = self.lookup(id)?;
        if !channel.is_enabled() {
            channel.set_enabled(true);
            info!("RPC: channel {} '{}' enabled", id, channel.label());
        }
        Ok(())
    }

    /// Disable a channel. Requests already queued stay queued but are not
    /// served until the channel is enabled again.
    pub fn disable(&self, id: ChannelId) -> Result<(), ChannelError> {
        let channel = self.lookup(id)?;
        if channel.is_enabled() {
            channel.set_enabled(false);
            info!("RPC: channel {} '{}' disabled", id, channel.label());
        }
        Ok(())
    }

    pub fn state(&self, id: ChannelId) -> ChannelState {
        match self.get(id) {
            None => ChannelState::Unassigned,
            Some(ch) if ch.is_enabled() => ChannelState::Enabled,
            Some(_) => ChannelState::Disabled,
        }
    }

    pub fn enqueue(
        &self,
        id: ChannelId,
        request: RpcRequest,
        origin: Address,
    ) -> Result<(), EnqueueError> {
        let channel = self.get(id).ok_or(EnqueueError::Unassigned)?;
        let result = channel.enqueue(request, origin);
        if let Err(e) = result {
            debug!("RPC: {} rejected request from {}: {}", id, origin, e);
        }
        result
    }

    /// Every channel, in id order.
    pub fn channels(&self) -> heapless::Vec<Arc<RpcChannel>, MAX_CHANNELS> {
        self.channels.lock(|cell| cell.borrow().clone())
    }

    pub fn len(&self) -> usize {
        self.channels.lock(|cell| cell.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new()
    }
}
