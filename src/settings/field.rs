//! Typed configuration fields.
//!
//! A [`ConfigField`] carries its current value, its default, and the
//! constraints the UI needs to render an editor for it. On the wire (web
//! UI, legacy settings file) a field is a JSON object keyed by the short
//! names the UI understands:
//!
//! ```text
//! { "cfgType": 9, "cfgVal": 914.9, "dftVal": 914.9,
//!   "minVal": 902.3, "maxVal": 914.9, "incVal": 0.2 }
//! ```

use core::fmt;
use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── cfgType codes understood by the UI ────────────────────────

pub const CFG_TYPE_BOOLEAN: u8 = 7;
pub const CFG_TYPE_INTEGER: u8 = 8;
pub const CFG_TYPE_FLOAT: u8 = 9;
pub const CFG_TYPE_TEXT: u8 = 10;
pub const CFG_TYPE_ENUMERATED: u8 = 11;
pub const CFG_TYPE_COLOR: u8 = 12;

/// Relative tolerance used when checking float bounds and step alignment.
const FLOAT_STEP_TOLERANCE: f64 = 1e-3;

// ───────────────────────────────────────────────────────────────
// Scalar values
// ───────────────────────────────────────────────────────────────

/// A bare value: either a field's current/default value or a top-level
/// flag such as `Silent Mode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats; nothing else converts.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Convert a JSON value. Arrays, objects and null have no scalar form.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Int(i))
                } else {
                    n.as_f64().map(Self::Float)
                }
            }
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Field kinds and constraints
// ───────────────────────────────────────────────────────────────

/// Which channel of the custom theme colour a component field controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorChannel {
    Red,
    Green,
    Blue,
}

impl ColorChannel {
    fn tag(self) -> &'static str {
        match self {
            Self::Red => "R",
            Self::Green => "G",
            Self::Blue => "B",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "R" => Some(Self::Red),
            "G" => Some(Self::Green),
            "B" => Some(Self::Blue),
            _ => None,
        }
    }
}

/// One allowed value of an enumerated field together with its label.
///
/// Value and label live in the same record, so the two lists the UI sees
/// (`vals` / `valTxt`) can never drift out of alignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumOption {
    pub value: i64,
    pub label: Cow<'static, str>,
}

impl EnumOption {
    pub const fn new(value: i64, label: &'static str) -> Self {
        Self {
            value,
            label: Cow::Borrowed(label),
        }
    }
}

/// Kind tag plus the constraints that apply to values of that kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    FreeText {
        max_len: u16,
    },
    Integer {
        min: i64,
        max: i64,
        step: i64,
        signed: bool,
    },
    Float {
        min: f64,
        max: f64,
        step: f64,
    },
    Boolean,
    Enumerated {
        options: Cow<'static, [EnumOption]>,
    },
    ColorComponent {
        channel: ColorChannel,
    },
}

/// Why a value was refused by a field's constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintViolation {
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    OutOfRange {
        min: f64,
        max: f64,
    },
    OffStep {
        step: f64,
    },
    NotFinite,
    TooLong {
        max_len: u16,
    },
    NotAnOption,
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongType { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            Self::OutOfRange { min, max } => write!(f, "outside [{min}, {max}]"),
            Self::OffStep { step } => write!(f, "not a multiple of step {step}"),
            Self::NotFinite => write!(f, "not a finite number"),
            Self::TooLong { max_len } => write!(f, "longer than {max_len} characters"),
            Self::NotAnOption => write!(f, "not one of the allowed values"),
        }
    }
}

impl std::error::Error for ConstraintViolation {}

impl FieldKind {
    /// The `cfgType` code the UI uses to pick an editor.
    pub fn cfg_type(&self) -> u8 {
        match self {
            Self::Boolean => CFG_TYPE_BOOLEAN,
            Self::Integer { .. } => CFG_TYPE_INTEGER,
            Self::Float { .. } => CFG_TYPE_FLOAT,
            Self::FreeText { .. } => CFG_TYPE_TEXT,
            Self::Enumerated { .. } => CFG_TYPE_ENUMERATED,
            Self::ColorComponent { .. } => CFG_TYPE_COLOR,
        }
    }

    /// Check `value` against this kind and return its normalised form.
    ///
    /// Normalisation only widens (an integer offered to a float field
    /// becomes a float); accepted values are never snapped or clamped.
    pub fn check(&self, value: &Scalar) -> Result<Scalar, ConstraintViolation> {
        match self {
            Self::Boolean => match value {
                Scalar::Bool(_) => Ok(value.clone()),
                other => Err(wrong_type("bool", other)),
            },

            Self::FreeText { max_len } => match value {
                Scalar::Text(s) if s.chars().count() <= *max_len as usize => Ok(value.clone()),
                Scalar::Text(_) => Err(ConstraintViolation::TooLong { max_len: *max_len }),
                other => Err(wrong_type("text", other)),
            },

            Self::Integer { min, max, step, signed } => {
                let v = integral(value)?;
                let lower = if *signed { *min } else { (*min).max(0) };
                if v < lower || v > *max {
                    return Err(ConstraintViolation::OutOfRange {
                        min: lower as f64,
                        max: *max as f64,
                    });
                }
                if *step > 1 && (v - lower) % step != 0 {
                    return Err(ConstraintViolation::OffStep { step: *step as f64 });
                }
                Ok(Scalar::Int(v))
            }

            Self::Float { min, max, step } => {
                let v = value
                    .as_float()
                    .ok_or_else(|| wrong_type("float", value))?;
                if !v.is_finite() {
                    return Err(ConstraintViolation::NotFinite);
                }
                let slack = if *step > 0.0 {
                    step * FLOAT_STEP_TOLERANCE
                } else {
                    f64::EPSILON
                };
                if v < min - slack || v > max + slack {
                    return Err(ConstraintViolation::OutOfRange { min: *min, max: *max });
                }
                if *step > 0.0 {
                    let steps = (v - min) / step;
                    if (steps - steps.round()).abs() > FLOAT_STEP_TOLERANCE {
                        return Err(ConstraintViolation::OffStep { step: *step });
                    }
                }
                Ok(Scalar::Float(v))
            }

            Self::Enumerated { options } => {
                let v = integral(value)?;
                if options.iter().any(|o| o.value == v) {
                    Ok(Scalar::Int(v))
                } else {
                    Err(ConstraintViolation::NotAnOption)
                }
            }

            Self::ColorComponent { .. } => {
                let v = integral(value)?;
                if (0..=255).contains(&v) {
                    Ok(Scalar::Int(v))
                } else {
                    Err(ConstraintViolation::OutOfRange { min: 0.0, max: 255.0 })
                }
            }
        }
    }

    /// Label for an enumerated value, if this kind is enumerated.
    pub fn label_for(&self, value: i64) -> Option<&str> {
        match self {
            Self::Enumerated { options } => options
                .iter()
                .find(|o| o.value == value)
                .map(|o| o.label.as_ref()),
            _ => None,
        }
    }
}

fn wrong_type(expected: &'static str, found: &Scalar) -> ConstraintViolation {
    ConstraintViolation::WrongType {
        expected,
        found: found.type_name(),
    }
}

/// Integers pass through; floats with no fractional part are accepted
/// because JSON clients frequently send `3.0` for `3`.
fn integral(value: &Scalar) -> Result<i64, ConstraintViolation> {
    match value {
        Scalar::Int(i) => Ok(*i),
        Scalar::Float(f) if f.is_finite() && f.fract() == 0.0 => Ok(*f as i64),
        other => Err(wrong_type("integer", other)),
    }
}

// ───────────────────────────────────────────────────────────────
// ConfigField
// ───────────────────────────────────────────────────────────────

/// A typed, constrained configuration entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigField {
    pub kind: FieldKind,
    pub current: Scalar,
    pub default: Scalar,
}

/// Why a JSON object could not be read as a [`ConfigField`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldParseError {
    UnknownType(u64),
    MissingKey(&'static str),
    MisalignedOptions { values: usize, labels: usize },
}

impl fmt::Display for FieldParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType(t) => write!(f, "unknown cfgType {t}"),
            Self::MissingKey(k) => write!(f, "missing or invalid '{k}'"),
            Self::MisalignedOptions { values, labels } => {
                write!(f, "{values} values but {labels} labels")
            }
        }
    }
}

impl std::error::Error for FieldParseError {}

impl ConfigField {
    /// A field whose current value starts at its default.
    pub fn new(kind: FieldKind, default: Scalar) -> Self {
        Self {
            kind,
            current: default.clone(),
            default,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.kind.check(&self.current).is_ok()
    }

    /// Validate and assign a new current value.
    pub fn set(&mut self, value: &Scalar) -> Result<(), ConstraintViolation> {
        self.current = self.kind.check(value)?;
        Ok(())
    }

    /// Reset an invalid current value to the default. Returns `true` if
    /// the value changed.
    pub fn coerce(&mut self) -> bool {
        if self.is_valid() {
            return false;
        }
        self.current = self.default.clone();
        true
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("cfgType".into(), Value::from(self.kind.cfg_type()));
        obj.insert("cfgVal".into(), self.current.to_json());
        obj.insert("dftVal".into(), self.default.to_json());

        match &self.kind {
            FieldKind::Boolean => {}
            FieldKind::FreeText { max_len } => {
                obj.insert("maxLen".into(), Value::from(*max_len));
            }
            FieldKind::Integer { min, max, step, signed } => {
                obj.insert("minVal".into(), Value::from(*min));
                obj.insert("maxVal".into(), Value::from(*max));
                obj.insert("incVal".into(), Value::from(*step));
                obj.insert("signed".into(), Value::Bool(*signed));
            }
            FieldKind::Float { min, max, step } => {
                obj.insert("minVal".into(), Value::from(*min));
                obj.insert("maxVal".into(), Value::from(*max));
                obj.insert("incVal".into(), Value::from(*step));
            }
            FieldKind::Enumerated { options } => {
                let vals = options.iter().map(|o| Value::from(o.value)).collect();
                let txt = options
                    .iter()
                    .map(|o| Value::String(o.label.to_string()))
                    .collect();
                obj.insert("vals".into(), Value::Array(vals));
                obj.insert("valTxt".into(), Value::Array(txt));
            }
            FieldKind::ColorComponent { channel } => {
                obj.insert("channel".into(), Value::from(channel.tag()));
                obj.insert("minVal".into(), Value::from(0));
                obj.insert("maxVal".into(), Value::from(255));
                obj.insert("incVal".into(), Value::from(1));
            }
        }

        Value::Object(obj)
    }

    pub fn from_json(obj: &Map<String, Value>) -> Result<Self, FieldParseError> {
        let cfg_type = obj
            .get("cfgType")
            .and_then(Value::as_u64)
            .ok_or(FieldParseError::MissingKey("cfgType"))?;
        let current = obj
            .get("cfgVal")
            .and_then(Scalar::from_json)
            .ok_or(FieldParseError::MissingKey("cfgVal"))?;
        let default = obj
            .get("dftVal")
            .and_then(Scalar::from_json)
            .unwrap_or_else(|| current.clone());

        let kind = match cfg_type {
            t if t == CFG_TYPE_BOOLEAN as u64 => FieldKind::Boolean,
            t if t == CFG_TYPE_INTEGER as u64 => FieldKind::Integer {
                min: get_i64(obj, "minVal")?,
                max: get_i64(obj, "maxVal")?,
                step: obj.get("incVal").and_then(Value::as_i64).unwrap_or(1),
                signed: obj.get("signed").and_then(Value::as_bool).unwrap_or(false),
            },
            t if t == CFG_TYPE_FLOAT as u64 => FieldKind::Float {
                min: get_f64(obj, "minVal")?,
                max: get_f64(obj, "maxVal")?,
                step: obj.get("incVal").and_then(Value::as_f64).unwrap_or(0.0),
            },
            t if t == CFG_TYPE_TEXT as u64 => FieldKind::FreeText {
                max_len: obj
                    .get("maxLen")
                    .and_then(Value::as_u64)
                    .and_then(|n| u16::try_from(n).ok())
                    .ok_or(FieldParseError::MissingKey("maxLen"))?,
            },
            t if t == CFG_TYPE_ENUMERATED as u64 => parse_enumerated(obj)?,
            t if t == CFG_TYPE_COLOR as u64 => FieldKind::ColorComponent {
                channel: obj
                    .get("channel")
                    .and_then(Value::as_str)
                    .and_then(ColorChannel::from_tag)
                    .ok_or(FieldParseError::MissingKey("channel"))?,
            },
            other => return Err(FieldParseError::UnknownType(other)),
        };

        Ok(Self {
            kind,
            current,
            default,
        })
    }
}

fn get_i64(obj: &Map<String, Value>, key: &'static str) -> Result<i64, FieldParseError> {
    obj.get(key)
        .and_then(Value::as_i64)
        .ok_or(FieldParseError::MissingKey(key))
}

fn get_f64(obj: &Map<String, Value>, key: &'static str) -> Result<f64, FieldParseError> {
    obj.get(key)
        .and_then(Value::as_f64)
        .ok_or(FieldParseError::MissingKey(key))
}

fn parse_enumerated(obj: &Map<String, Value>) -> Result<FieldKind, FieldParseError> {
    let vals = obj
        .get("vals")
        .and_then(Value::as_array)
        .ok_or(FieldParseError::MissingKey("vals"))?;
    let txt = obj
        .get("valTxt")
        .and_then(Value::as_array)
        .ok_or(FieldParseError::MissingKey("valTxt"))?;
    if vals.len() != txt.len() {
        return Err(FieldParseError::MisalignedOptions {
            values: vals.len(),
            labels: txt.len(),
        });
    }

    let mut options = Vec::with_capacity(vals.len());
    for (v, t) in vals.iter().zip(txt) {
        let value = v.as_i64().ok_or(FieldParseError::MissingKey("vals"))?;
        let label = t.as_str().ok_or(FieldParseError::MissingKey("valTxt"))?;
        options.push(EnumOption {
            value,
            label: Cow::Owned(label.to_owned()),
        });
    }
    Ok(FieldKind::Enumerated {
        options: Cow::Owned(options),
    })
}
