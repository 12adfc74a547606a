//! Boot-time schema migration.
//!
//! Brings a stored document up to the running firmware's schema:
//!
//! - missing entries are inserted with their defaults,
//! - present entries keep their valid current values while type metadata
//!   and defaults are refreshed,
//! - values that violate their constraints are coerced to the default,
//! - build stamps are rewritten when they differ,
//! - entries the schema does not name are left alone.
//!
//! Migration is idempotent: a second pass over its own output changes
//! nothing and reports clean.

use heapless::Vec;
use log::{debug, info, warn};

use super::document::{Entry, SettingsDocument};
use super::field::{ConfigField, FieldKind, Scalar};
use super::schema::{DefaultValue, FieldSpec, MAX_SCHEMA_FIELDS, Schema, Shape};
use crate::app::ports::RandomSource;

type Names = Vec<&'static str, MAX_SCHEMA_FIELDS>;

/// What a migration pass changed, by entry name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub inserted: Names,
    pub refreshed: Names,
    pub coerced: Names,
    pub restamped: Names,
}

impl MigrationReport {
    /// Whether the document differs from what was loaded and needs a write.
    pub fn is_dirty(&self) -> bool {
        self.changes() > 0
    }

    pub fn changes(&self) -> usize {
        self.inserted.len() + self.refreshed.len() + self.coerced.len() + self.restamped.len()
    }
}

fn note(list: &mut Names, name: &'static str) {
    // Bounded by MAX_SCHEMA_FIELDS, which the schema constructor asserts.
    let _ = list.push(name);
}

/// Run one migration pass over `doc`.
pub fn migrate(
    doc: &mut SettingsDocument,
    schema: &Schema,
    rng: &mut dyn RandomSource,
) -> MigrationReport {
    let mut report = MigrationReport::default();

    for spec in schema.fields() {
        match &spec.shape {
            Shape::Stamp => migrate_stamp(doc, schema, spec, &mut report),
            Shape::Scalar => migrate_scalar(doc, schema, spec, rng, &mut report),
            Shape::Field(kind) => migrate_field(doc, schema, spec, kind, &mut report),
        }
    }

    if report.is_dirty() {
        info!(
            "Settings: migrated ({} inserted, {} refreshed, {} coerced, {} restamped)",
            report.inserted.len(),
            report.refreshed.len(),
            report.coerced.len(),
            report.restamped.len()
        );
    } else {
        debug!("Settings: document already matches schema");
    }
    report
}

fn migrate_stamp(
    doc: &mut SettingsDocument,
    schema: &Schema,
    spec: &FieldSpec,
    report: &mut MigrationReport,
) {
    let Some(expected) = schema.fixed_default(spec, doc) else {
        return;
    };
    let expected = Entry::Scalar(expected);
    match doc.get(spec.name) {
        Some(existing) if *existing == expected => {}
        Some(_) => {
            info!("Settings: '{}' restamped", spec.name);
            doc.insert(spec.name, expected);
            note(&mut report.restamped, spec.name);
        }
        None => {
            doc.insert(spec.name, expected);
            note(&mut report.inserted, spec.name);
        }
    }
}

fn migrate_scalar(
    doc: &mut SettingsDocument,
    schema: &Schema,
    spec: &FieldSpec,
    rng: &mut dyn RandomSource,
    report: &mut MigrationReport,
) {
    let existing = doc.get(spec.name).cloned();
    match existing {
        Some(Entry::Scalar(v)) if spec.accepts_scalar(&v) => {}
        // A scalar stored as a field by an older layout keeps its value.
        Some(Entry::Field(f)) if spec.accepts_scalar(&f.current) => {
            doc.insert(spec.name, Entry::Scalar(f.current));
            note(&mut report.refreshed, spec.name);
        }
        Some(_) => {
            warn!("Settings: '{}' has an invalid value, reset to default", spec.name);
            let value = scalar_default(doc, schema, spec, rng);
            doc.insert(spec.name, Entry::Scalar(value));
            note(&mut report.coerced, spec.name);
        }
        None => {
            let value = scalar_default(doc, schema, spec, rng);
            doc.insert(spec.name, Entry::Scalar(value));
            note(&mut report.inserted, spec.name);
        }
    }
}

fn scalar_default(
    doc: &SettingsDocument,
    schema: &Schema,
    spec: &FieldSpec,
    rng: &mut dyn RandomSource,
) -> Scalar {
    match spec.default {
        DefaultValue::RandomId => Scalar::Int(i64::from(rng.next_u32())),
        _ => schema
            .fixed_default(spec, doc)
            .unwrap_or(Scalar::Int(0)),
    }
}

fn migrate_field(
    doc: &mut SettingsDocument,
    schema: &Schema,
    spec: &FieldSpec,
    kind: &FieldKind,
    report: &mut MigrationReport,
) {
    let default = field_default(doc, schema, spec, kind);

    let Some(existing) = doc.get(spec.name) else {
        doc.insert(spec.name, Entry::Field(ConfigField::new(kind.clone(), default)));
        note(&mut report.inserted, spec.name);
        return;
    };

    let current = match existing {
        Entry::Field(f) => kind.check(&f.current),
        Entry::Scalar(s) => kind.check(s),
        Entry::Opaque(_) => Err(super::field::ConstraintViolation::WrongType {
            expected: "field",
            found: "opaque",
        }),
    };

    match current {
        Ok(current) => {
            let target = ConfigField {
                kind: kind.clone(),
                current,
                default,
            };
            if !matches!(existing, Entry::Field(f) if *f == target) {
                debug!("Settings: '{}' metadata refreshed", spec.name);
                doc.insert(spec.name, Entry::Field(target));
                note(&mut report.refreshed, spec.name);
            }
        }
        Err(violation) => {
            warn!(
                "Settings: '{}' {}, reset to default",
                spec.name, violation
            );
            doc.insert(spec.name, Entry::Field(ConfigField::new(kind.clone(), default)));
            note(&mut report.coerced, spec.name);
        }
    }
}

/// Derived-name defaults are fixed at creation: an existing valid default
/// is kept so a later `UserID` change does not rename the device.
fn field_default(
    doc: &SettingsDocument,
    schema: &Schema,
    spec: &FieldSpec,
    kind: &FieldKind,
) -> Scalar {
    if matches!(spec.default, DefaultValue::DerivedName { .. }) {
        if let Some(f) = doc.field(spec.name) {
            if kind.check(&f.default).is_ok() {
                return f.default.clone();
            }
        }
    }
    schema
        .fixed_default(spec, doc)
        .unwrap_or(Scalar::Int(0))
}
