//! Core-pinned worker threads.
//!
//! ESP-IDF implements `std::thread` on pthreads, which are thin wrappers
//! around FreeRTOS tasks. `esp_pthread_set_cfg()` sets thread-local
//! configuration consumed by the *next* `pthread_create()` from the
//! calling thread, so the configure→spawn pair must not be interleaved
//! with other thread creation on the same thread.
//!
//! On the host the core and priority are ignored.

use std::io;
use std::thread::JoinHandle;

/// CPU core identifiers for the ESP32 dual-core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU): WiFi, ESP-NOW and lwIP.
    Pro = 0,
    /// Core 1 (APP_CPU): application work such as RPC dispatch.
    App = 1,
}

/// Placement of a worker task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSpec {
    /// NUL-terminated task name, e.g. `"rpc-dispatch\0"`.
    pub name: &'static str,
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
}

impl WorkerSpec {
    fn display_name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }
}

/// Host threads run serde and test harness code that needs more stack
/// than a FreeRTOS task budget.
#[cfg(not(target_os = "espidf"))]
const HOST_MIN_STACK_KB: usize = 256;

#[cfg(target_os = "espidf")]
pub fn spawn_worker(
    spec: WorkerSpec,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    // SAFETY: the config struct is fully initialised by
    // esp_create_default_pthread_config and `spec.name` is a 'static
    // NUL-terminated string, so the pointer outlives the spawned task.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = spec.core as i32;
        cfg.prio = i32::from(spec.priority);
        cfg.stack_size = (spec.stack_kb * 1024) as i32;
        cfg.thread_name = spec.name.as_ptr().cast();
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
    }

    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        spec.display_name(),
        spec.core,
        spec.priority,
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name().into())
        .spawn(f)
}

#[cfg(not(target_os = "espidf"))]
pub fn spawn_worker(
    spec: WorkerSpec,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    let stack_kb = spec.stack_kb.max(HOST_MIN_STACK_KB);
    log::info!(
        "Spawning '{}' (sim, no core pinning, stack={}KB)",
        spec.display_name(),
        stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name().into())
        .stack_size(stack_kb * 1024)
        .spawn(f)
}
