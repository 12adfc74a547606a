//! System adapter: global flags, restart, heap and uptime.
//!
//! Flags set by the settings subscriber are plain atomics that the UI
//! and the radio read on their own contexts.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::AtomicU32;
use core::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

use crate::app::ports::{SystemInfo, SystemPort};

pub struct SystemAdapter {
    silent_mode: AtomicBool,
    time_24h: AtomicBool,
    /// Simulation: restart requests seen.
    #[cfg(not(target_os = "espidf"))]
    restarts: AtomicU32,
}

impl SystemAdapter {
    pub fn new() -> Self {
        Self {
            silent_mode: AtomicBool::new(false),
            time_24h: AtomicBool::new(false),
            #[cfg(not(target_os = "espidf"))]
            restarts: AtomicU32::new(0),
        }
    }

    pub fn silent_mode(&self) -> bool {
        self.silent_mode.load(Ordering::Relaxed)
    }

    pub fn time_24h(&self) -> bool {
        self.time_24h.load(Ordering::Relaxed)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn restarts(&self) -> u32 {
        self.restarts.load(Ordering::Relaxed)
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_restart(&self) {
        // Give the response a moment to leave before the reset.
        std::thread::sleep(std::time::Duration::from_millis(500));
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
        info!("System(sim): restart requested");
    }

    #[cfg(target_os = "espidf")]
    fn platform_info(&self) -> SystemInfo {
        // SAFETY: read-only queries with no preconditions.
        let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
        let free_heap = unsafe { esp_idf_svc::sys::esp_get_free_heap_size() };
        let min_free_heap = unsafe { esp_idf_svc::sys::esp_get_minimum_free_heap_size() };
        SystemInfo {
            uptime_secs: (us / 1_000_000) as u64,
            free_heap,
            min_free_heap,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_info(&self) -> SystemInfo {
        use std::time::Instant;
        static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
        SystemInfo {
            uptime_secs: START.get_or_init(Instant::now).elapsed().as_secs(),
            free_heap: 200 * 1024,
            min_free_heap: 180 * 1024,
        }
    }
}

impl Default for SystemAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemPort for SystemAdapter {
    fn set_silent_mode(&self, enabled: bool) {
        if self.silent_mode.swap(enabled, Ordering::Relaxed) != enabled {
            info!("System: silent mode {}", if enabled { "on" } else { "off" });
        }
    }

    fn set_time_24h(&self, enabled: bool) {
        if self.time_24h.swap(enabled, Ordering::Relaxed) != enabled {
            info!("System: {}-hour clock", if enabled { 24 } else { 12 });
        }
    }

    fn restart(&self) {
        warn!("System: restarting");
        self.platform_restart();
    }

    fn system_info(&self) -> SystemInfo {
        self.platform_info()
    }
}
