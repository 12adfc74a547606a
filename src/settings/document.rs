//! The in-memory settings document.
//!
//! An ordered map from entry name to [`Entry`]. Order is preserved through
//! both encodings so the UI renders fields in schema order, and entries the
//! current firmware does not know about are carried along untouched.

use core::fmt;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::field::{ConfigField, Scalar};

/// One top-level entry of the settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entry {
    /// Typed, constrained field.
    Field(ConfigField),
    /// Bare value (flags, identifiers, build stamps).
    Scalar(Scalar),
    /// Anything else found in storage, kept verbatim as JSON text.
    Opaque(String),
}

impl Entry {
    /// The effective value: a field's current value or the bare scalar.
    pub fn value(&self) -> Option<&Scalar> {
        match self {
            Self::Field(f) => Some(&f.current),
            Self::Scalar(s) => Some(s),
            Self::Opaque(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Field(f) => f.to_json(),
            Self::Scalar(s) => s.to_json(),
            Self::Opaque(raw) => serde_json::from_str(raw).unwrap_or(Value::Null),
        }
    }

    fn from_json(name: &str, value: &Value) -> Self {
        match value {
            Value::Object(obj) if obj.contains_key("cfgType") => {
                match ConfigField::from_json(obj) {
                    Ok(field) => Self::Field(field),
                    Err(e) => {
                        warn!("Settings: '{}' kept opaque ({})", name, e);
                        Self::Opaque(value.to_string())
                    }
                }
            }
            other => match Scalar::from_json(other) {
                Some(s) => Self::Scalar(s),
                None => Self::Opaque(other.to_string()),
            },
        }
    }
}

#[derive(Debug)]
pub enum DocumentError {
    Json(serde_json::Error),
    NotAnObject,
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(e) => write!(f, "invalid JSON: {e}"),
            Self::NotAnObject => write!(f, "settings root is not an object"),
        }
    }
}

impl std::error::Error for DocumentError {}

impl From<serde_json::Error> for DocumentError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsDocument {
    entries: Vec<(String, Entry)>,
}

impl SettingsDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.position(name).map(|i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Entry> {
        self.position(name).map(|i| &mut self.entries[i].1)
    }

    /// Insert or replace. A replaced entry keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, entry: Entry) -> Option<Entry> {
        let name = name.into();
        match self.position(&name) {
            Some(i) => Some(core::mem::replace(&mut self.entries[i].1, entry)),
            None => {
                self.entries.push((name, entry));
                None
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn value(&self, name: &str) -> Option<&Scalar> {
        self.get(name).and_then(Entry::value)
    }

    pub fn field(&self, name: &str) -> Option<&ConfigField> {
        match self.get(name) {
            Some(Entry::Field(f)) => Some(f),
            _ => None,
        }
    }

    /// The first `n` entries, used when the encoded form must be truncated.
    pub fn prefix(&self, n: usize) -> Self {
        Self {
            entries: self.entries.iter().take(n).cloned().collect(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == name)
    }

    // ── JSON (UI and legacy file) ──────────────────────────────

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        for (name, entry) in &self.entries {
            obj.insert(name.clone(), entry.to_json());
        }
        Value::Object(obj)
    }

    pub fn from_json(value: &Value) -> Result<Self, DocumentError> {
        let obj = value.as_object().ok_or(DocumentError::NotAnObject)?;
        let entries = obj
            .iter()
            .map(|(name, v)| (name.clone(), Entry::from_json(name, v)))
            .collect();
        Ok(Self { entries })
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_json(&value)
    }

    // ── Binary (persisted blob) ────────────────────────────────

    /// Encode into `buf`, returning the used prefix.
    pub fn encode_into<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], postcard::Error> {
        postcard::to_slice(self, buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
