//! Persistent settings store.
//!
//! Owns the in-memory [`SettingsDocument`] and moves it to and from a
//! [`StoragePort`]. The persisted form is a postcard blob of at most
//! [`SETTINGS_CAPACITY`] bytes; a document that does not fit is truncated
//! at an entry boundary and the store remembers that it overflowed.
//!
//! A JSON settings file written by earlier firmware is imported once when
//! no binary blob exists, and removed after the first successful write.

use core::fmt;

use log::{debug, info, warn};

use super::document::{Entry, SettingsDocument};
use super::field::{ConstraintViolation, Scalar};
use super::migration::{MigrationReport, migrate};
use super::schema::Schema;
use crate::app::ports::{RandomSource, StorageError, StoragePort};

pub const SETTINGS_NAMESPACE: &str = "beacon";
pub const SETTINGS_KEY: &str = "/Settings.msgpk";
pub const LEGACY_SETTINGS_KEY: &str = "/settings.json";

/// Maximum encoded size of the persisted document.
pub const SETTINGS_CAPACITY: usize = 2048;

/// First read size for the legacy JSON file; doubled while the buffer
/// comes back full.
const LEGACY_READ_INITIAL: usize = 4096;
/// Largest legacy file the importer will buffer.
const LEGACY_READ_CEILING: usize = 32 * 1024;

/// Outcome of [`SettingsStore::load`]. Loading never fails outright: every
/// non-`Loaded` status leaves a usable (possibly empty) document behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded { bytes: usize },
    ImportedLegacy { bytes: usize },
    /// Nothing stored yet (first boot).
    Empty,
    /// A blob was found but could not be decoded.
    Corrupted,
    /// The backend refused the read.
    ReadFailed(StorageError),
}

impl LoadStatus {
    /// Whether the document came from storage as-is.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. } | Self::ImportedLegacy { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReport {
    pub bytes: usize,
    /// Entries left out because the document exceeded capacity.
    pub dropped: Vec<String>,
}

impl PersistReport {
    pub fn overflowed(&self) -> bool {
        !self.dropped.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Storage(StorageError),
    Encode,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Encode => write!(f, "settings could not be encoded"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<StorageError> for StoreError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

/// Why an in-memory update was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateError {
    UnknownField,
    ReadOnly,
    Constraint(ConstraintViolation),
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField => write!(f, "no such setting"),
            Self::ReadOnly => write!(f, "setting is read-only"),
            Self::Constraint(v) => write!(f, "{v}"),
        }
    }
}

impl std::error::Error for UpdateError {}

pub struct SettingsStore<S: StoragePort> {
    backend: S,
    document: SettingsDocument,
    overflowed: bool,
    legacy_pending: bool,
    writes: u32,
}

impl<S: StoragePort> SettingsStore<S> {
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            document: SettingsDocument::new(),
            overflowed: false,
            legacy_pending: false,
            writes: 0,
        }
    }

    pub fn document(&self) -> &SettingsDocument {
        &self.document
    }

    /// An owned copy for readers on other contexts.
    pub fn snapshot(&self) -> SettingsDocument {
        self.document.clone()
    }

    /// Whether the last persist had to truncate the document.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Successful writes since construction.
    pub fn writes(&self) -> u32 {
        self.writes
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    /// Replace the in-memory document from storage.
    pub fn load(&mut self) -> LoadStatus {
        self.document = SettingsDocument::new();
        self.legacy_pending = false;
        let mut buf = vec![0u8; SETTINGS_CAPACITY];

        match self.backend.read(SETTINGS_NAMESPACE, SETTINGS_KEY, &mut buf) {
            Ok(n) => match SettingsDocument::decode(&buf[..n]) {
                Ok(doc) => {
                    info!("Settings: loaded {} entries ({} bytes)", doc.len(), n);
                    self.document = doc;
                    LoadStatus::Loaded { bytes: n }
                }
                Err(e) => {
                    warn!("Settings: stored blob unreadable ({:?}), starting empty", e);
                    LoadStatus::Corrupted
                }
            },
            Err(StorageError::NotFound) => self.import_legacy(),
            Err(e) => {
                warn!("Settings: read failed ({}), starting empty", e);
                LoadStatus::ReadFailed(e)
            }
        }
    }

    fn import_legacy(&mut self) -> LoadStatus {
        let (buf, n) = match self.read_legacy() {
            Ok(read) => read,
            Err(StorageError::NotFound) => {
                info!("Settings: nothing stored, first boot");
                return LoadStatus::Empty;
            }
            Err(e) => {
                warn!("Settings: legacy read failed ({})", e);
                return LoadStatus::ReadFailed(e);
            }
        };

        // The legacy file is only scheduled for removal once its contents
        // are held in memory.
        match SettingsDocument::from_json_slice(&buf[..n]) {
            Ok(doc) => {
                info!("Settings: imported legacy JSON ({} entries)", doc.len());
                self.document = doc;
                self.legacy_pending = true;
                LoadStatus::ImportedLegacy { bytes: n }
            }
            Err(e) => {
                warn!("Settings: legacy file unreadable ({}), keeping it", e);
                LoadStatus::Corrupted
            }
        }
    }

    /// Read the whole legacy file, growing the buffer while it fills up.
    fn read_legacy(&self) -> Result<(Vec<u8>, usize), StorageError> {
        let mut size = LEGACY_READ_INITIAL;
        loop {
            let mut buf = vec![0u8; size];
            let n = self
                .backend
                .read(SETTINGS_NAMESPACE, LEGACY_SETTINGS_KEY, &mut buf)?;
            if n < size {
                return Ok((buf, n));
            }
            if size >= LEGACY_READ_CEILING {
                warn!("Settings: legacy file exceeds {} bytes", LEGACY_READ_CEILING);
                return Err(StorageError::Full);
            }
            size = (size * 2).min(LEGACY_READ_CEILING);
        }
    }

    /// Bring the document up to `schema`. Does not write.
    pub fn migrate(&mut self, schema: &Schema, rng: &mut dyn RandomSource) -> MigrationReport {
        migrate(&mut self.document, schema, rng)
    }

    /// Encode and write the document.
    pub fn persist(&mut self) -> Result<PersistReport, StoreError> {
        let mut buf = vec![0u8; SETTINGS_CAPACITY];

        let (len, dropped) = match self.document.encode_into(&mut buf) {
            Ok(used) => (used.len(), Vec::new()),
            Err(postcard::Error::SerializeBufferFull) => self.encode_truncated(&mut buf)?,
            Err(e) => {
                warn!("Settings: encode failed ({:?})", e);
                return Err(StoreError::Encode);
            }
        };

        self.overflowed = !dropped.is_empty();
        if self.overflowed {
            warn!(
                "Settings: document exceeds {} bytes, {} entries not persisted: {:?}",
                SETTINGS_CAPACITY,
                dropped.len(),
                dropped
            );
        }

        if let Err(e) = self.backend.write(SETTINGS_NAMESPACE, SETTINGS_KEY, &buf[..len]) {
            warn!("Settings: write failed ({})", e);
            return Err(StoreError::Storage(e));
        }
        self.writes = self.writes.wrapping_add(1);
        debug!("Settings: persisted {} bytes", len);

        if self.legacy_pending {
            match self.backend.delete(SETTINGS_NAMESPACE, LEGACY_SETTINGS_KEY) {
                Ok(()) => {
                    info!("Settings: legacy JSON file removed");
                    self.legacy_pending = false;
                }
                Err(e) => warn!("Settings: could not remove legacy file ({})", e),
            }
        }

        Ok(PersistReport {
            bytes: len,
            dropped,
        })
    }

    /// Longest entry prefix that fits in `buf`.
    fn encode_truncated(&self, buf: &mut [u8]) -> Result<(usize, Vec<String>), StoreError> {
        for keep in (0..self.document.len()).rev() {
            if let Ok(used) = self.document.prefix(keep).encode_into(buf) {
                let len = used.len();
                let dropped = self
                    .document
                    .keys()
                    .skip(keep)
                    .map(str::to_owned)
                    .collect();
                return Ok((len, dropped));
            }
        }
        Err(StoreError::Encode)
    }

    /// Validate and apply one value in memory. Returns the stored
    /// (normalised) value. Does not persist.
    pub fn update_value(
        &mut self,
        name: &str,
        value: &Scalar,
        schema: &Schema,
    ) -> Result<Scalar, UpdateError> {
        apply(&mut self.document, name, value, schema)
    }

    /// Validate every update against a scratch copy and commit only if all
    /// succeed. On failure reports the first offending name.
    pub fn update_values(
        &mut self,
        updates: &[(String, Scalar)],
        schema: &Schema,
    ) -> Result<(), (String, UpdateError)> {
        let mut scratch = self.document.clone();
        for (name, value) in updates {
            apply(&mut scratch, name, value, schema).map_err(|e| (name.clone(), e))?;
        }
        self.document = scratch;
        Ok(())
    }

    /// Drop both stored forms and clear the in-memory document.
    pub fn erase(&mut self) -> Result<(), StoreError> {
        self.backend.delete(SETTINGS_NAMESPACE, SETTINGS_KEY)?;
        self.backend.delete(SETTINGS_NAMESPACE, LEGACY_SETTINGS_KEY)?;
        self.document = SettingsDocument::new();
        self.legacy_pending = false;
        self.overflowed = false;
        warn!("Settings: erased");
        Ok(())
    }
}

fn apply(
    doc: &mut SettingsDocument,
    name: &str,
    value: &Scalar,
    schema: &Schema,
) -> Result<Scalar, UpdateError> {
    if schema.is_read_only(name) {
        return Err(UpdateError::ReadOnly);
    }
    match doc.get_mut(name) {
        None => Err(UpdateError::UnknownField),
        Some(Entry::Field(field)) => {
            field.set(value).map_err(UpdateError::Constraint)?;
            Ok(field.current.clone())
        }
        Some(Entry::Scalar(current)) => {
            let accepted = match schema.spec(name) {
                Some(spec) => spec.accepts_scalar(value),
                None => current.type_name() == value.type_name(),
            };
            if !accepted {
                return Err(UpdateError::Constraint(ConstraintViolation::WrongType {
                    expected: current.type_name(),
                    found: value.type_name(),
                }));
            }
            *current = value.clone();
            Ok(value.clone())
        }
        Some(Entry::Opaque(_)) => Err(UpdateError::ReadOnly),
    }
}
