//! Self-migrating settings.
//!
//! ```text
//!   storage ──load──▶ SettingsDocument ──migrate(schema)──▶ persist
//!                          │
//!                          └──▶ notifier ──▶ subscribers (LED, radio, system)
//! ```
//!
//! The document survives firmware upgrades: on boot it is brought up to
//! the running [`schema::Schema`] without discarding user edits or
//! entries this build does not know about.

pub mod document;
pub mod field;
pub mod migration;
pub mod notifier;
pub mod schema;
pub mod snapshot;
pub mod store;
pub mod view;

pub use document::{Entry, SettingsDocument};
pub use field::{ConfigField, FieldKind, Scalar};
pub use migration::{MigrationReport, migrate};
pub use notifier::{NotifyReport, SettingsNotifier};
pub use schema::{Schema, keys};
pub use snapshot::SettingsSnapshot;
pub use store::{LoadStatus, PersistReport, SettingsStore, StoreError, UpdateError};
pub use view::{BeaconSettings, Rgb};
