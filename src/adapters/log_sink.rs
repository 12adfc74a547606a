//! Log-based collaborator adapters.
//!
//! The LED strip, long-range radio, display and WiFi station drivers are
//! separate subsystems. Until one is linked in, [`LogCollaborators`]
//! stands in for it by writing every command to the ESP-IDF logger
//! (UART / USB-CDC in production) and remembering the last value, so the
//! settings pipeline can be observed end to end on a bare board.

use std::sync::Mutex;

use log::info;

use crate::app::ports::{DisplayPort, LedPort, MeshLinkPort, NetworkPort, RadioPort};
use crate::rpc::Address;
use crate::settings::view::Rgb;

/// Last values pushed through the logging adapters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoggedState {
    pub theme: Option<Rgb>,
    pub user_id: Option<u32>,
    pub user_name: Option<String>,
    pub send_attempts: Option<u8>,
    pub frequency_mhz: Option<f64>,
    pub modem_config: Option<u8>,
    pub display_inputs: u32,
    pub mesh_up: bool,
}

/// Adapter that logs every collaborator command to the serial console.
#[derive(Default)]
pub struct LogCollaborators {
    state: Mutex<LoggedState>,
}

impl LogCollaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LoggedState {
        self.with_state(|s| s.clone())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut LoggedState) -> T) -> T {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

impl LedPort for LogCollaborators {
    fn set_theme_color(&self, color: Rgb) {
        info!("LED | theme={}", color);
        self.with_state(|s| s.theme = Some(color));
    }
}

impl RadioPort for LogCollaborators {
    fn set_user_id(&self, user_id: u32) {
        info!("RADIO | user_id={:08X}", user_id);
        self.with_state(|s| s.user_id = Some(user_id));
    }

    fn set_user_name(&self, name: &str) {
        info!("RADIO | user_name='{}'", name);
        self.with_state(|s| s.user_name = Some(name.to_owned()));
    }

    fn set_default_send_attempts(&self, attempts: u8) {
        info!("RADIO | send_attempts={}", attempts);
        self.with_state(|s| s.send_attempts = Some(attempts));
    }

    fn set_frequency(&self, mhz: f64) {
        info!("RADIO | frequency={:.1}MHz", mhz);
        self.with_state(|s| s.frequency_mhz = Some(mhz));
    }

    fn set_modem_config(&self, index: u8) {
        info!("RADIO | modem_config={}", index);
        self.with_state(|s| s.modem_config = Some(index));
    }
}

impl DisplayPort for LogCollaborators {
    fn send_input_command(&self, input_id: u8) {
        info!("DISPLAY | input=0x{:02X}", input_id);
        self.with_state(|s| s.display_inputs = s.display_inputs.wrapping_add(1));
    }
}

impl NetworkPort for LogCollaborators {
    fn connect_to_access_point(&self, ssid: &str, _password: &str) -> bool {
        info!("WIFI | connect '{}' skipped, no station driver", ssid);
        false
    }
}

impl MeshLinkPort for LogCollaborators {
    fn start(&self) -> bool {
        info!("MESH | link up");
        self.with_state(|s| s.mesh_up = true);
        true
    }

    fn stop(&self, disable_radio: bool) {
        info!("MESH | link down (radio off: {})", disable_radio);
        self.with_state(|s| s.mesh_up = false);
    }

    fn send(&self, peer: &[u8; 6], data: &[u8]) -> bool {
        info!("MESH | {} bytes to {}", data.len(), Address::Peer(*peer));
        true
    }
}
