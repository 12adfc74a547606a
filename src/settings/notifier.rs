//! Settings change notification.
//!
//! Subsystems register a callback once at startup; after every boot or
//! mutation the service invokes them all, in registration order, with the
//! current document. A subscriber that errors or panics is logged and
//! skipped; the rest still run.

use std::panic::{AssertUnwindSafe, catch_unwind};

use log::{debug, warn};

use super::document::SettingsDocument;

type Callback = Box<dyn FnMut(&SettingsDocument) -> anyhow::Result<()> + Send>;

struct Subscriber {
    name: &'static str,
    callback: Callback,
}

/// Result of one [`SettingsNotifier::invoke`] round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub delivered: usize,
    pub failed: Vec<&'static str>,
}

#[derive(Default)]
pub struct SettingsNotifier {
    subscribers: Vec<Subscriber>,
    rounds: u32,
}

impl SettingsNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, name: &'static str, callback: F)
    where
        F: FnMut(&SettingsDocument) -> anyhow::Result<()> + Send + 'static,
    {
        debug!("Settings: subscriber '{}' registered", name);
        self.subscribers.push(Subscriber {
            name,
            callback: Box::new(callback),
        });
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// How many notification rounds have run.
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn invoke(&mut self, doc: &SettingsDocument) -> NotifyReport {
        self.rounds = self.rounds.wrapping_add(1);
        let mut report = NotifyReport::default();

        for sub in &mut self.subscribers {
            let callback = &mut sub.callback;
            match catch_unwind(AssertUnwindSafe(|| callback(doc))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!("Settings: subscriber '{}' failed: {:#}", sub.name, e);
                    report.failed.push(sub.name);
                }
                Err(_) => {
                    warn!("Settings: subscriber '{}' panicked", sub.name);
                    report.failed.push(sub.name);
                }
            }
        }
        report
    }
}
