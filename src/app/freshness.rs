//! Message freshness gate.
//!
//! The radio reports every inbound message together with whether it is
//! new or a repeat of one already seen. Only new messages should wake the
//! UI; repeats are counted and dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use log::trace;

use super::ports::DisplayPort;

/// Display input raised when a new message arrives.
pub const MESSAGE_RECEIVED_INPUT: u8 = 0x20;

pub struct MessageFreshnessGate {
    display: Arc<dyn DisplayPort>,
    input_id: u8,
    notified: AtomicU32,
    suppressed: AtomicU32,
}

impl MessageFreshnessGate {
    pub fn new(display: Arc<dyn DisplayPort>) -> Self {
        Self::with_input(display, MESSAGE_RECEIVED_INPUT)
    }

    pub fn with_input(display: Arc<dyn DisplayPort>, input_id: u8) -> Self {
        Self {
            display,
            input_id,
            notified: AtomicU32::new(0),
            suppressed: AtomicU32::new(0),
        }
    }

    /// Returns `true` if the display was notified.
    pub fn on_message(&self, sender_id: u32, is_new: bool) -> bool {
        if !is_new {
            trace!("Radio: repeat from {:08X} suppressed", sender_id);
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.display.send_input_command(self.input_id);
        self.notified.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn notified(&self) -> u32 {
        self.notified.load(Ordering::Relaxed)
    }

    pub fn suppressed(&self) -> u32 {
        self.suppressed.load(Ordering::Relaxed)
    }
}
