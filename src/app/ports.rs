//! Port traits: the hexagonal boundary between beacon logic and the
//! subsystems it drives.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ BeaconService / subscribers
//! ```
//!
//! Storage and randomness are owned by the settings service and take
//! `&mut self`. The collaborator ports (LED, radio, system, display,
//! network, mesh link) are shared between the service, the settings
//! subscribers and the transport adapters, so they take `&self` and must
//! be `Send + Sync`.

use crate::settings::view::Rgb;

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: service ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// Keys are namespaced to prevent collisions between subsystems. Writes
/// must be atomic: after a power loss either the old or the new blob is
/// readable, never a torn one. The ESP-IDF NVS API guarantees this.
pub trait StoragePort {
    /// Read a value. Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Randomness
// ───────────────────────────────────────────────────────────────

/// Source of the random `UserID` drawn on first boot.
pub trait RandomSource {
    fn next_u32(&mut self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Collaborator ports (service / subscribers → subsystems)
// ───────────────────────────────────────────────────────────────

/// LED subsystem. Animation is the adapter's business.
pub trait LedPort: Send + Sync {
    fn set_theme_color(&self, color: Rgb);
}

/// Long-range radio subsystem.
pub trait RadioPort: Send + Sync {
    fn set_user_id(&self, user_id: u32);
    fn set_user_name(&self, name: &str);
    fn set_default_send_attempts(&self, attempts: u8);
    fn set_frequency(&self, mhz: f64);
    fn set_modem_config(&self, index: u8);
}

/// Runtime facts reported by `GetSystemInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemInfo {
    pub uptime_secs: u64,
    pub free_heap: u32,
    pub min_free_heap: u32,
}

/// System-wide flags and lifecycle.
pub trait SystemPort: Send + Sync {
    fn set_silent_mode(&self, enabled: bool);
    fn set_time_24h(&self, enabled: bool);
    /// Request a restart. On hardware this does not return.
    fn restart(&self);
    fn system_info(&self) -> SystemInfo;
}

/// Display subsystem input queue.
pub trait DisplayPort: Send + Sync {
    /// Push a synthetic input (e.g. "message received") to the UI.
    fn send_input_command(&self, input_id: u8);
}

/// WiFi station control.
pub trait NetworkPort: Send + Sync {
    /// Try to join an access point. Returns `true` once associated.
    fn connect_to_access_point(&self, ssid: &str, password: &str) -> bool;
}

/// Peer-to-peer radio link used by the mesh transport (ESP-NOW).
pub trait MeshLinkPort: Send + Sync {
    /// Bring the link up. Returns `false` if the radio refused.
    fn start(&self) -> bool;
    /// Tear the link down, optionally powering the radio off.
    fn stop(&self, disable_radio: bool);
    /// Send one frame to a peer.
    fn send(&self, peer: &[u8; 6], data: &[u8]) -> bool;
}

/// Provisioning link that must be released once WiFi credentials have
/// been applied.
pub trait ProvisioningLinkPort: Send + Sync {
    fn deinitialize(&self, disable_radio: bool);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for StorageError {}
