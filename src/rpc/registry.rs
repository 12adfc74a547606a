//! Function name → handler table.

use std::collections::HashMap;

use log::{debug, warn};

use super::HandlerResult;
use super::message::RpcRequest;

/// A registered handler. `C` is the dispatcher's context (the service the
/// handlers operate on).
pub type RpcHandler<C> = Box<dyn Fn(&mut C, &RpcRequest) -> HandlerResult + Send + Sync>;

pub struct FunctionRegistry<C> {
    functions: HashMap<String, RpcHandler<C>>,
}

impl<C> FunctionRegistry<C> {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Register `handler` under `name`. A later registration of the same
    /// name replaces the earlier one; returns `true` when that happened.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F) -> bool
    where
        F: Fn(&mut C, &RpcRequest) -> HandlerResult + Send + Sync + 'static,
    {
        let name = name.into();
        let replaced = self.functions.insert(name.clone(), Box::new(handler)).is_some();
        if replaced {
            warn!("RPC: handler for '{}' replaced", name);
        } else {
            debug!("RPC: registered '{}'", name);
        }
        replaced
    }

    pub fn resolve(&self, name: &str) -> Option<&RpcHandler<C>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl<C> Default for FunctionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
