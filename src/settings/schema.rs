//! The settings schema compiled into this firmware.
//!
//! Every build carries a table of the entries it expects to find in the
//! settings document. Migration walks this table on boot; the RPC layer
//! consults it for read-only entries.

use std::borrow::Cow;

use super::document::SettingsDocument;
use super::field::{ColorChannel, EnumOption, FieldKind, Scalar};

/// Firmware version stamped into the document on every boot.
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Board revision this firmware is built for.
pub const HARDWARE_VERSION: i64 = 3;

/// Upper bound on schema entries; sizes the migration report.
pub const MAX_SCHEMA_FIELDS: usize = 32;

/// Entry names as they appear in the document and the UI.
pub mod keys {
    pub const USER_ID: &str = "UserID";
    pub const USER_NAME: &str = "User Name";
    pub const DEVICE_NAME: &str = "Device Name";
    pub const COLOR_THEME: &str = "Color Theme";
    pub const THEME_RED: &str = "Theme Red";
    pub const THEME_GREEN: &str = "Theme Green";
    pub const THEME_BLUE: &str = "Theme Blue";
    pub const FREQUENCY: &str = "Frequency";
    pub const MODEM_CONFIG: &str = "Modem Config";
    pub const BROADCAST_ATTEMPTS: &str = "Broadcast Attempts";
    pub const SILENT_MODE: &str = "Silent Mode";
    pub const TIME_24H: &str = "24H Time";
    pub const WIFI_PROVISIONING: &str = "WiFi Provisioning";
    pub const FIRMWARE_VERSION: &str = "Firmware Version";
    pub const HARDWARE_VERSION: &str = "Hardware Version";
}

/// Version information of the running build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub firmware_version: &'static str,
    pub hardware_version: i64,
}

impl BuildInfo {
    pub const fn current() -> Self {
        Self {
            firmware_version: FIRMWARE_VERSION,
            hardware_version: HARDWARE_VERSION,
        }
    }
}

/// How an entry is stored in the document.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Typed field with constraints.
    Field(FieldKind),
    /// Bare scalar value.
    Scalar,
    /// Build stamp, rewritten whenever it differs from the running build.
    Stamp,
}

/// Where a default value comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(&'static str),
    /// Random u32, drawn once when the entry is created.
    RandomId,
    /// `<prefix><low 16 bits of UserID as 4 hex digits>`.
    DerivedName { prefix: &'static str },
    FirmwareVersion,
    HardwareVersion,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub shape: Shape,
    pub default: DefaultValue,
}

impl FieldSpec {
    /// Entries a client may never overwrite.
    pub fn is_read_only(&self) -> bool {
        matches!(self.shape, Shape::Stamp) || matches!(self.default, DefaultValue::RandomId)
    }

    /// Whether a bare scalar has the type this entry's default implies.
    pub fn accepts_scalar(&self, value: &Scalar) -> bool {
        match (self.default, value) {
            (DefaultValue::Bool(_), Scalar::Bool(_)) => true,
            (DefaultValue::Int(_) | DefaultValue::HardwareVersion, Scalar::Int(_)) => true,
            (DefaultValue::RandomId, Scalar::Int(i)) => u32::try_from(*i).is_ok(),
            (DefaultValue::Float(_), Scalar::Float(_) | Scalar::Int(_)) => true,
            (
                DefaultValue::Text(_)
                | DefaultValue::DerivedName { .. }
                | DefaultValue::FirmwareVersion,
                Scalar::Text(_),
            ) => true,
            _ => false,
        }
    }
}

pub const THEME_CUSTOM: i64 = 0;

const THEME_OPTIONS: &[EnumOption] = &[
    EnumOption::new(THEME_CUSTOM, "Custom"),
    EnumOption::new(1, "Red"),
    EnumOption::new(2, "Green"),
    EnumOption::new(3, "Blue"),
    EnumOption::new(4, "Purple"),
    EnumOption::new(5, "Yellow"),
    EnumOption::new(6, "Cyan"),
    EnumOption::new(7, "White"),
    EnumOption::new(8, "Orange"),
];

const MODEM_OPTIONS: &[EnumOption] = &[
    EnumOption::new(0, "125 kHz, 4/5, 128"),
    EnumOption::new(1, "500 kHz, 4/5, 128"),
    EnumOption::new(2, "31.25 kHz, 4/8, 512"),
    EnumOption::new(3, "125 kHz, 4/8, 4096"),
    EnumOption::new(4, "125 khz, 4/5, 2048"),
];

pub const PROVISIONING_NONE: i64 = 0;
pub const PROVISIONING_ESP_NOW: i64 = 1;

const PROVISIONING_OPTIONS: &[EnumOption] = &[
    EnumOption::new(PROVISIONING_NONE, "None"),
    EnumOption::new(PROVISIONING_ESP_NOW, "ESP-NOW Dongle"),
];

const BEACON_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: keys::USER_ID,
        shape: Shape::Scalar,
        default: DefaultValue::RandomId,
    },
    FieldSpec {
        name: keys::USER_NAME,
        shape: Shape::Field(FieldKind::FreeText { max_len: 12 }),
        default: DefaultValue::DerivedName { prefix: "User_" },
    },
    FieldSpec {
        name: keys::DEVICE_NAME,
        shape: Shape::Field(FieldKind::FreeText { max_len: 20 }),
        default: DefaultValue::DerivedName { prefix: "Beacon_" },
    },
    FieldSpec {
        name: keys::COLOR_THEME,
        shape: Shape::Field(FieldKind::Enumerated {
            options: Cow::Borrowed(THEME_OPTIONS),
        }),
        default: DefaultValue::Int(2),
    },
    FieldSpec {
        name: keys::THEME_RED,
        shape: Shape::Field(FieldKind::ColorComponent {
            channel: ColorChannel::Red,
        }),
        default: DefaultValue::Int(0),
    },
    FieldSpec {
        name: keys::THEME_GREEN,
        shape: Shape::Field(FieldKind::ColorComponent {
            channel: ColorChannel::Green,
        }),
        default: DefaultValue::Int(255),
    },
    FieldSpec {
        name: keys::THEME_BLUE,
        shape: Shape::Field(FieldKind::ColorComponent {
            channel: ColorChannel::Blue,
        }),
        default: DefaultValue::Int(0),
    },
    FieldSpec {
        name: keys::FREQUENCY,
        shape: Shape::Field(FieldKind::Float {
            min: 902.3,
            max: 914.9,
            step: 0.2,
        }),
        default: DefaultValue::Float(914.9),
    },
    FieldSpec {
        name: keys::MODEM_CONFIG,
        shape: Shape::Field(FieldKind::Enumerated {
            options: Cow::Borrowed(MODEM_OPTIONS),
        }),
        default: DefaultValue::Int(1),
    },
    FieldSpec {
        name: keys::BROADCAST_ATTEMPTS,
        shape: Shape::Field(FieldKind::Integer {
            min: 1,
            max: 5,
            step: 1,
            signed: false,
        }),
        default: DefaultValue::Int(3),
    },
    FieldSpec {
        name: keys::SILENT_MODE,
        shape: Shape::Scalar,
        default: DefaultValue::Bool(false),
    },
    FieldSpec {
        name: keys::TIME_24H,
        shape: Shape::Scalar,
        default: DefaultValue::Bool(false),
    },
    FieldSpec {
        name: keys::WIFI_PROVISIONING,
        shape: Shape::Field(FieldKind::Enumerated {
            options: Cow::Borrowed(PROVISIONING_OPTIONS),
        }),
        default: DefaultValue::Int(PROVISIONING_ESP_NOW),
    },
    FieldSpec {
        name: keys::FIRMWARE_VERSION,
        shape: Shape::Stamp,
        default: DefaultValue::FirmwareVersion,
    },
    FieldSpec {
        name: keys::HARDWARE_VERSION,
        shape: Shape::Stamp,
        default: DefaultValue::HardwareVersion,
    },
];

/// An ordered field table plus the build it belongs to.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Cow<'static, [FieldSpec]>,
    build: BuildInfo,
}

impl Schema {
    pub fn new(fields: impl Into<Cow<'static, [FieldSpec]>>, build: BuildInfo) -> Self {
        let fields = fields.into();
        debug_assert!(fields.len() <= MAX_SCHEMA_FIELDS);
        Self { fields, build }
    }

    /// The schema of the running firmware.
    pub fn beacon() -> Self {
        Self::new(BEACON_FIELDS, BuildInfo::current())
    }

    /// Same fields, different build stamps. Used to model upgrades.
    pub fn with_build(&self, build: BuildInfo) -> Self {
        Self {
            fields: self.fields.clone(),
            build,
        }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn build(&self) -> BuildInfo {
        self.build
    }

    pub fn spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_read_only(&self, name: &str) -> bool {
        self.spec(name).is_some_and(FieldSpec::is_read_only)
    }

    /// Resolve a default that does not need randomness.
    ///
    /// Returns `None` for [`DefaultValue::RandomId`]. Derived names read the
    /// `UserID` already present in `doc` (0 if it is missing).
    pub fn fixed_default(&self, spec: &FieldSpec, doc: &SettingsDocument) -> Option<Scalar> {
        Some(match spec.default {
            DefaultValue::Bool(b) => Scalar::Bool(b),
            DefaultValue::Int(i) => Scalar::Int(i),
            DefaultValue::Float(f) => Scalar::Float(f),
            DefaultValue::Text(s) => Scalar::Text(s.to_owned()),
            DefaultValue::RandomId => return None,
            DefaultValue::DerivedName { prefix } => {
                let id = doc
                    .value(keys::USER_ID)
                    .and_then(Scalar::as_int)
                    .unwrap_or(0);
                Scalar::Text(derived_name(prefix, id))
            }
            DefaultValue::FirmwareVersion => Scalar::Text(self.build.firmware_version.to_owned()),
            DefaultValue::HardwareVersion => Scalar::Int(self.build.hardware_version),
        })
    }
}

/// `prefix` followed by the low 16 bits of `user_id` in upper-case hex.
pub fn derived_name(prefix: &str, user_id: i64) -> String {
    format!("{}{:04X}", prefix, user_id & 0xFFFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beacon_schema_order_and_size() {
        let schema = Schema::beacon();
        let names: Vec<_> = schema.fields().iter().map(|f| f.name).collect();
        assert_eq!(names.first(), Some(&keys::USER_ID));
        assert_eq!(names.last(), Some(&keys::HARDWARE_VERSION));
        assert_eq!(names.len(), 15);
    }

    #[test]
    fn fixed_defaults_satisfy_their_constraints() {
        let schema = Schema::beacon();
        let mut doc = SettingsDocument::new();
        doc.insert(
            keys::USER_ID,
            super::super::document::Entry::Scalar(Scalar::Int(0xFFFF_FFFF)),
        );
        for spec in schema.fields() {
            if let Shape::Field(kind) = &spec.shape {
                let default = schema.fixed_default(spec, &doc).unwrap();
                assert!(kind.check(&default).is_ok(), "{} default invalid", spec.name);
            }
        }
    }

    #[test]
    fn derived_names_use_low_sixteen_bits() {
        assert_eq!(derived_name("User_", 0x1234_ABCD), "User_ABCD");
        assert_eq!(derived_name("Beacon_", 0x7), "Beacon_0007");
    }

    #[test]
    fn read_only_entries() {
        let schema = Schema::beacon();
        assert!(schema.is_read_only(keys::USER_ID));
        assert!(schema.is_read_only(keys::FIRMWARE_VERSION));
        assert!(schema.is_read_only(keys::HARDWARE_VERSION));
        assert!(!schema.is_read_only(keys::FREQUENCY));
        assert!(!schema.is_read_only("Unknown"));
    }

    #[test]
    fn scalar_type_checks() {
        let schema = Schema::beacon();
        let uid = schema.spec(keys::USER_ID).unwrap();
        assert!(uid.accepts_scalar(&Scalar::Int(0xFFFF_FFFF)));
        assert!(!uid.accepts_scalar(&Scalar::Int(-1)));
        assert!(!uid.accepts_scalar(&Scalar::Text("1".into())));
        let silent = schema.spec(keys::SILENT_MODE).unwrap();
        assert!(silent.accepts_scalar(&Scalar::Bool(true)));
        assert!(!silent.accepts_scalar(&Scalar::Int(1)));
    }
}
