//! Typed view over the settings document.
//!
//! Subscribers read settings through [`BeaconSettings`] instead of poking
//! at document entries; missing or mistyped entries surface as a single
//! [`ViewError`] rather than scattered defaults.

use core::fmt;

use super::document::SettingsDocument;
use super::field::Scalar;
use super::schema::keys;

/// 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    Missing(&'static str),
    WrongType(&'static str),
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(k) => write!(f, "setting '{k}' missing"),
            Self::WrongType(k) => write!(f, "setting '{k}' has the wrong type"),
        }
    }
}

impl std::error::Error for ViewError {}

#[derive(Debug, Clone, PartialEq)]
pub struct BeaconSettings {
    pub user_id: u32,
    pub user_name: String,
    pub device_name: String,
    pub color_theme: i64,
    pub custom_color: Rgb,
    pub frequency_mhz: f64,
    pub modem_config: u8,
    pub broadcast_attempts: u8,
    pub silent_mode: bool,
    pub time_24h: bool,
    pub wifi_provisioning: i64,
    pub firmware_version: String,
    pub hardware_version: i64,
}

impl BeaconSettings {
    pub fn from_document(doc: &SettingsDocument) -> Result<Self, ViewError> {
        Ok(Self {
            user_id: narrow(int(doc, keys::USER_ID)?, keys::USER_ID)?,
            user_name: text(doc, keys::USER_NAME)?,
            device_name: text(doc, keys::DEVICE_NAME)?,
            color_theme: int(doc, keys::COLOR_THEME)?,
            custom_color: Rgb::new(
                narrow(int(doc, keys::THEME_RED)?, keys::THEME_RED)?,
                narrow(int(doc, keys::THEME_GREEN)?, keys::THEME_GREEN)?,
                narrow(int(doc, keys::THEME_BLUE)?, keys::THEME_BLUE)?,
            ),
            frequency_mhz: lookup(doc, keys::FREQUENCY)?
                .as_float()
                .ok_or(ViewError::WrongType(keys::FREQUENCY))?,
            modem_config: narrow(int(doc, keys::MODEM_CONFIG)?, keys::MODEM_CONFIG)?,
            broadcast_attempts: narrow(
                int(doc, keys::BROADCAST_ATTEMPTS)?,
                keys::BROADCAST_ATTEMPTS,
            )?,
            silent_mode: boolean(doc, keys::SILENT_MODE)?,
            time_24h: boolean(doc, keys::TIME_24H)?,
            wifi_provisioning: int(doc, keys::WIFI_PROVISIONING)?,
            firmware_version: text(doc, keys::FIRMWARE_VERSION)?,
            hardware_version: int(doc, keys::HARDWARE_VERSION)?,
        })
    }
}

fn lookup<'a>(doc: &'a SettingsDocument, key: &'static str) -> Result<&'a Scalar, ViewError> {
    doc.value(key).ok_or(ViewError::Missing(key))
}

fn int(doc: &SettingsDocument, key: &'static str) -> Result<i64, ViewError> {
    lookup(doc, key)?.as_int().ok_or(ViewError::WrongType(key))
}

fn boolean(doc: &SettingsDocument, key: &'static str) -> Result<bool, ViewError> {
    lookup(doc, key)?.as_bool().ok_or(ViewError::WrongType(key))
}

fn text(doc: &SettingsDocument, key: &'static str) -> Result<String, ViewError> {
    lookup(doc, key)?
        .as_text()
        .map(str::to_owned)
        .ok_or(ViewError::WrongType(key))
}

fn narrow<T: TryFrom<i64>>(v: i64, key: &'static str) -> Result<T, ViewError> {
    T::try_from(v).map_err(|_| ViewError::WrongType(key))
}
