//! Settings subscribers for the LED, radio and system subsystems.
//!
//! Each subscriber reads the document through the typed
//! [`BeaconSettings`] view and pushes the relevant values into its port.

use std::sync::Arc;

use log::{debug, warn};

use super::ports::{LedPort, RadioPort, SystemPort};
use crate::settings::schema::THEME_CUSTOM;
use crate::settings::view::{BeaconSettings, Rgb};
use crate::settings::{SettingsDocument, SettingsNotifier};

/// Preset theme colours, indexed by `Color Theme` value.
pub const THEME_PRESETS: [(i64, Rgb); 8] = [
    (1, Rgb::new(0xFF, 0x00, 0x00)), // Red
    (2, Rgb::new(0x00, 0x80, 0x00)), // Green
    (3, Rgb::new(0x00, 0x00, 0xFF)), // Blue
    (4, Rgb::new(0x80, 0x00, 0x80)), // Purple
    (5, Rgb::new(0xFF, 0xFF, 0x00)), // Yellow
    (6, Rgb::new(0x00, 0xFF, 0xFF)), // Cyan
    (7, Rgb::new(0xFF, 0xFF, 0xFF)), // White
    (8, Rgb::new(0xFF, 0xA5, 0x00)), // Orange
];

/// How a theme colour was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeSelection {
    Preset(i64),
    Custom,
    /// Index has no preset; the custom components are used instead.
    Unmapped(i64),
}

pub fn resolve_theme(settings: &BeaconSettings) -> (ThemeSelection, Rgb) {
    let index = settings.color_theme;
    if index == THEME_CUSTOM {
        return (ThemeSelection::Custom, settings.custom_color);
    }
    match THEME_PRESETS.iter().find(|(i, _)| *i == index) {
        Some((_, rgb)) => (ThemeSelection::Preset(index), *rgb),
        None => (ThemeSelection::Unmapped(index), settings.custom_color),
    }
}

pub fn led_subscriber(
    led: Arc<dyn LedPort>,
) -> impl FnMut(&SettingsDocument) -> anyhow::Result<()> + Send + 'static {
    move |doc| {
        let settings = BeaconSettings::from_document(doc)?;
        let (selection, color) = resolve_theme(&settings);
        if let ThemeSelection::Unmapped(index) = selection {
            warn!("LED: theme {} has no preset, using custom colour", index);
        }
        debug!("LED: theme {:?} -> {}", selection, color);
        led.set_theme_color(color);
        Ok(())
    }
}

pub fn radio_subscriber(
    radio: Arc<dyn RadioPort>,
) -> impl FnMut(&SettingsDocument) -> anyhow::Result<()> + Send + 'static {
    move |doc| {
        let settings = BeaconSettings::from_document(doc)?;
        radio.set_user_id(settings.user_id);
        radio.set_user_name(&settings.user_name);
        radio.set_default_send_attempts(settings.broadcast_attempts);
        radio.set_frequency(settings.frequency_mhz);
        radio.set_modem_config(settings.modem_config);
        Ok(())
    }
}

pub fn system_subscriber(
    system: Arc<dyn SystemPort>,
) -> impl FnMut(&SettingsDocument) -> anyhow::Result<()> + Send + 'static {
    move |doc| {
        let settings = BeaconSettings::from_document(doc)?;
        system.set_silent_mode(settings.silent_mode);
        system.set_time_24h(settings.time_24h);
        Ok(())
    }
}

/// Register the three standard subscribers in LED, radio, system order.
pub fn register_subscribers(
    notifier: &mut SettingsNotifier,
    led: Arc<dyn LedPort>,
    radio: Arc<dyn RadioPort>,
    system: Arc<dyn SystemPort>,
) {
    notifier.subscribe("led", led_subscriber(led));
    notifier.subscribe("radio", radio_subscriber(radio));
    notifier.subscribe("system", system_subscriber(system));
}
