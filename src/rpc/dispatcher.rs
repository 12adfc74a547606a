//! Request dispatcher.
//!
//! Owns the function registry and the handler context. Each pass visits
//! every enabled channel once and serves at most one queued request from
//! it, so a busy transport cannot starve the others. Handler errors and
//! panics become error responses; the dispatcher itself keeps running.

use std::any::Any;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde_json::Value;

use super::RpcError;
use super::channels::{ChannelHub, ChannelId, ResponsePolicy, RpcChannel};
use super::message::{Address, RpcRequest, error_response};
use super::registry::FunctionRegistry;
use crate::drivers::task_pin::{Core, WorkerSpec, spawn_worker};

/// Worker placement and pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub priority: u8,
    pub core: Core,
    pub stack_kb: usize,
    /// Sleep between passes that found nothing to do.
    pub idle_wait: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            priority: 5,
            core: Core::App,
            stack_kb: 8,
            idle_wait: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Requests taken off a queue.
    pub served: u32,
    /// Responses handed to a transport.
    pub responses: u32,
    /// Responses dropped by a `Discard` policy.
    pub discarded: u32,
    /// Requests naming no function or an unregistered one.
    pub unknown: u32,
    /// Handlers that returned an error.
    pub rejected: u32,
    /// Handlers that panicked.
    pub panicked: u32,
}

pub struct Dispatcher<C> {
    registry: FunctionRegistry<C>,
    hub: Arc<ChannelHub>,
    context: C,
    stats: DispatchStats,
}

impl<C> Dispatcher<C> {
    pub fn new(registry: FunctionRegistry<C>, hub: Arc<ChannelHub>, context: C) -> Self {
        Self {
            registry,
            hub,
            context,
            stats: DispatchStats::default(),
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn registry_mut(&mut self) -> &mut FunctionRegistry<C> {
        &mut self.registry
    }

    pub fn hub(&self) -> &Arc<ChannelHub> {
        &self.hub
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// One round-robin pass. Returns the number of requests served.
    pub fn poll_once(&mut self) -> usize {
        let mut served = 0;
        for channel in &self.hub.channels() {
            if !channel.is_enabled() {
                continue;
            }
            let Some(envelope) = channel.try_next() else {
                continue;
            };
            self.stats.served = self.stats.served.wrapping_add(1);
            served += 1;

            let response = self.dispatch(channel.id(), &envelope.request);
            if let Some(response) = response {
                self.route(channel, envelope.origin, &response);
            }
        }
        served
    }

    /// Resolve and run one request. Returns the document to send back.
    pub fn dispatch(&mut self, channel: ChannelId, request: &RpcRequest) -> Option<Value> {
        let Some(name) = request.function() else {
            warn!("RPC[{}]: request without function name", channel);
            self.stats.unknown = self.stats.unknown.wrapping_add(1);
            return Some(error_response(None, &RpcError::MissingFunctionName));
        };

        let Some(handler) = self.registry.resolve(name) else {
            warn!("RPC[{}]: unknown function '{}'", channel, name);
            self.stats.unknown = self.stats.unknown.wrapping_add(1);
            return Some(error_response(
                Some(name),
                &RpcError::UnknownFunction(name.to_owned()),
            ));
        };

        debug!("RPC[{}]: {}", channel, name);
        let context = &mut self.context;
        match catch_unwind(AssertUnwindSafe(|| handler(context, request))) {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("RPC[{}]: {} failed: {}", channel, name, e);
                self.stats.rejected = self.stats.rejected.wrapping_add(1);
                Some(error_response(Some(name), &e))
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                error!("RPC[{}]: {} panicked: {}", channel, name, msg);
                self.stats.panicked = self.stats.panicked.wrapping_add(1);
                Some(error_response(Some(name), &RpcError::Failed(msg)))
            }
        }
    }

    fn route(&mut self, channel: &RpcChannel, origin: Address, response: &Value) {
        let destination = match channel.policy() {
            ResponsePolicy::EchoToSender => origin,
            ResponsePolicy::FixedDestination(addr) => addr,
            ResponsePolicy::Discard => {
                debug!("RPC[{}]: response discarded", channel.id());
                self.stats.discarded = self.stats.discarded.wrapping_add(1);
                return;
            }
        };
        channel.transport().send_response(response, destination);
        self.stats.responses = self.stats.responses.wrapping_add(1);
    }

    /// Serve forever, sleeping `idle_wait` after an empty pass.
    pub fn run(mut self, idle_wait: Duration) -> ! {
        info!(
            "RPC: dispatcher running ({} functions, {} channels)",
            self.registry.len(),
            self.hub.len()
        );
        loop {
            if self.poll_once() == 0 {
                std::thread::sleep(idle_wait);
            }
        }
    }
}

impl<C: Send + 'static> Dispatcher<C> {
    /// Move the dispatcher onto its own pinned worker.
    pub fn spawn(self, config: DispatcherConfig) -> io::Result<JoinHandle<()>> {
        let spec = WorkerSpec {
            name: "rpc-dispatch\0",
            core: config.core,
            priority: config.priority,
            stack_kb: config.stack_kb,
        };
        let idle = config.idle_wait;
        spawn_worker(spec, move || self.run(idle))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_owned()
    }
}
