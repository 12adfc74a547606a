//! Mock adapters for integration tests.
//!
//! Every collaborator call is recorded so tests can assert on the full
//! command history without touching real flash, radio or display.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use beacon::app::ports::{
    DisplayPort, LedPort, MeshLinkPort, NetworkPort, ProvisioningLinkPort, RadioPort,
    RandomSource, StorageError, StoragePort, SystemInfo, SystemPort,
};
use beacon::app::service::{BeaconService, Collaborators};
use beacon::app::subscribers::register_subscribers;
use beacon::rpc::{Address, RpcRequest, Transport};
use beacon::settings::{Rgb, Schema, SettingsNotifier, SettingsStore};
use serde_json::Value;

// ── MemStorage ────────────────────────────────────────────────

/// In-memory storage. Clones share the same blobs so a test can keep a
/// handle after moving one into the store.
#[derive(Clone, Default)]
pub struct MemStorage {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_writes: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, namespace: &str, key: &str, data: &[u8]) {
        self.blobs
            .lock()
            .unwrap()
            .insert(format!("{}::{}", namespace, key), data.to_vec());
    }

    pub fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(&format!("{}::{}", namespace, key))
            .cloned()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl StoragePort for MemStorage {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.get(namespace, key) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::IoError);
        }
        self.put(namespace, key, data);
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.blobs
            .lock()
            .unwrap()
            .remove(&format!("{}::{}", namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.get(namespace, key).is_some()
    }
}

// ── FixedRng ──────────────────────────────────────────────────

pub struct FixedRng(pub u32);

impl RandomSource for FixedRng {
    fn next_u32(&mut self) -> u32 {
        self.0
    }
}

// ── Collaborator call record ──────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Theme(Rgb),
    UserId(u32),
    UserName(String),
    SendAttempts(u8),
    Frequency(f64),
    ModemConfig(u8),
    SilentMode(bool),
    Time24h(bool),
    Restart,
    DisplayInput(u8),
    ConnectAp { ssid: String },
    MeshStart,
    MeshStop { disable_radio: bool },
    MeshSend { peer: [u8; 6], frame: Vec<u8> },
    ProvisioningDeinit { disable_radio: bool },
}

/// One recorder standing in for every collaborator port.
#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<Call>>,
    /// What `connect_to_access_point` reports.
    pub ap_joins: AtomicBool,
}

#[allow(dead_code)]
impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn last_theme(&self) -> Option<Rgb> {
        self.calls().into_iter().rev().find_map(|c| match c {
            Call::Theme(rgb) => Some(rgb),
            _ => None,
        })
    }

    pub fn last_frequency(&self) -> Option<f64> {
        self.calls().into_iter().rev().find_map(|c| match c {
            Call::Frequency(f) => Some(f),
            _ => None,
        })
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }
}

impl LedPort for Recorder {
    fn set_theme_color(&self, color: Rgb) {
        self.push(Call::Theme(color));
    }
}

impl RadioPort for Recorder {
    fn set_user_id(&self, user_id: u32) {
        self.push(Call::UserId(user_id));
    }
    fn set_user_name(&self, name: &str) {
        self.push(Call::UserName(name.to_owned()));
    }
    fn set_default_send_attempts(&self, attempts: u8) {
        self.push(Call::SendAttempts(attempts));
    }
    fn set_frequency(&self, mhz: f64) {
        self.push(Call::Frequency(mhz));
    }
    fn set_modem_config(&self, index: u8) {
        self.push(Call::ModemConfig(index));
    }
}

impl SystemPort for Recorder {
    fn set_silent_mode(&self, enabled: bool) {
        self.push(Call::SilentMode(enabled));
    }
    fn set_time_24h(&self, enabled: bool) {
        self.push(Call::Time24h(enabled));
    }
    fn restart(&self) {
        self.push(Call::Restart);
    }
    fn system_info(&self) -> SystemInfo {
        SystemInfo {
            uptime_secs: 42,
            free_heap: 150_000,
            min_free_heap: 120_000,
        }
    }
}

impl DisplayPort for Recorder {
    fn send_input_command(&self, input_id: u8) {
        self.push(Call::DisplayInput(input_id));
    }
}

impl NetworkPort for Recorder {
    fn connect_to_access_point(&self, ssid: &str, _password: &str) -> bool {
        self.push(Call::ConnectAp {
            ssid: ssid.to_owned(),
        });
        self.ap_joins.load(Ordering::SeqCst)
    }
}

impl MeshLinkPort for Recorder {
    fn start(&self) -> bool {
        self.push(Call::MeshStart);
        true
    }
    fn stop(&self, disable_radio: bool) {
        self.push(Call::MeshStop { disable_radio });
    }
    fn send(&self, peer: &[u8; 6], data: &[u8]) -> bool {
        self.push(Call::MeshSend {
            peer: *peer,
            frame: data.to_vec(),
        });
        true
    }
}

impl ProvisioningLinkPort for Recorder {
    fn deinitialize(&self, disable_radio: bool) {
        self.push(Call::ProvisioningDeinit { disable_radio });
    }
}

// ── RecordingTransport ────────────────────────────────────────

/// Transport that keeps every response it is asked to deliver.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(Value, Address)>>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn responses(&self) -> Vec<(Value, Address)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn enqueue(&self, _request: RpcRequest, _origin: Address) -> bool {
        false
    }

    fn send_response(&self, response: &Value, destination: Address) {
        self.sent
            .lock()
            .unwrap()
            .push((response.clone(), destination));
    }
}

// ── Service fixture ───────────────────────────────────────────

pub const TEST_USER_ID: u32 = 0xC0FF_EE42;

/// A service over `storage` with every collaborator recorded, the
/// standard subscribers registered, and `Recorder` as provisioning link.
#[allow(dead_code)]
pub fn service_with(
    storage: MemStorage,
    schema: Schema,
    rec: &Arc<Recorder>,
) -> BeaconService<MemStorage> {
    let mut notifier = SettingsNotifier::new();
    register_subscribers(&mut notifier, rec.clone(), rec.clone(), rec.clone());
    BeaconService::new(
        SettingsStore::new(storage),
        schema,
        notifier,
        Box::new(FixedRng(TEST_USER_ID)),
        Collaborators {
            system: rec.clone(),
            network: rec.clone(),
            provisioning: Some(rec.clone() as Arc<dyn ProvisioningLinkPort>),
        },
    )
}
