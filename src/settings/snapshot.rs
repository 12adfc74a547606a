//! Published read-only copy of the settings document.
//!
//! The service mutates the document on the dispatcher context; display
//! and radio code on other contexts read the latest published snapshot.
//! Publishing swaps an `Arc` under a critical-section mutex, so readers
//! never observe a half-applied update. The replaced document is released
//! after the critical section ends.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use super::document::SettingsDocument;

pub struct SettingsSnapshot {
    current: Mutex<CriticalSectionRawMutex, RefCell<Arc<SettingsDocument>>>,
    generation: AtomicU32,
}

impl SettingsSnapshot {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(RefCell::new(Arc::new(SettingsDocument::new()))),
            generation: AtomicU32::new(0),
        }
    }

    pub fn publish(&self, doc: SettingsDocument) {
        let doc = Arc::new(doc);
        let previous = self.current.lock(|cell| cell.replace(doc));
        drop(previous);
        self.generation.fetch_add(1, Ordering::Release);
    }

    pub fn current(&self) -> Arc<SettingsDocument> {
        self.current.lock(|cell| Arc::clone(&cell.borrow()))
    }

    /// Bumped on every publish; lets pollers skip unchanged snapshots.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
