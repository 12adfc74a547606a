//! Beacon service: the hexagonal core.
//!
//! [`BeaconService`] owns the settings store, the schema it migrates to,
//! the subscriber list, and the collaborator ports RPC handlers need. It
//! is the dispatcher's handler context, so every mutation happens on the
//! dispatcher task; other contexts read the published snapshot.
//!
//! ```text
//!  StoragePort ──▶ ┌──────────────────────────┐ ──▶ subscribers
//!                  │      BeaconService       │
//!  RandomSource ──▶│ store · schema · notifier│ ──▶ SettingsSnapshot
//!                  └──────────────────────────┘
//! ```

use std::sync::Arc;

use log::{info, warn};

use super::ports::{NetworkPort, ProvisioningLinkPort, RandomSource, StoragePort, SystemPort};
use crate::error::Error;
use crate::settings::store::{LoadStatus, PersistReport, SettingsStore, StoreError, UpdateError};
use crate::settings::{
    MigrationReport, NotifyReport, Scalar, Schema, SettingsDocument, SettingsNotifier,
    SettingsSnapshot,
};

/// Ports the RPC handlers reach through the service.
#[derive(Clone)]
pub struct Collaborators {
    pub system: Arc<dyn SystemPort>,
    pub network: Arc<dyn NetworkPort>,
    /// Link to release after WiFi credentials are applied, if any.
    pub provisioning: Option<Arc<dyn ProvisioningLinkPort>>,
}

/// Everything that happened during [`BeaconService::boot`].
#[derive(Debug, Clone, PartialEq)]
pub struct BootReport {
    pub load: LoadStatus,
    pub migration: MigrationReport,
    /// `None` when migration left the document unchanged.
    pub persist: Option<Result<PersistReport, StoreError>>,
    pub notify: NotifyReport,
}

impl BootReport {
    /// Collapse into the first problem worth surfacing at the top level.
    pub fn check(&self) -> crate::error::Result<()> {
        match &self.persist {
            Some(Err(e)) => Err(Error::Storage(e.clone())),
            Some(Ok(r)) if r.overflowed() => Err(Error::SchemaOverflow {
                dropped: r.dropped.len(),
            }),
            _ => Ok(()),
        }
    }
}

/// Why a settings update did not fully succeed.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsUpdateError {
    /// Validation failed; nothing changed.
    Rejected { field: String, error: UpdateError },
    /// Applied in memory and announced to subscribers, but not persisted.
    NotPersisted(StoreError),
}

impl core::fmt::Display for SettingsUpdateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Rejected { field, error } => write!(f, "'{field}' rejected: {error}"),
            Self::NotPersisted(e) => write!(f, "applied but not persisted: {e}"),
        }
    }
}

impl std::error::Error for SettingsUpdateError {}

pub struct BeaconService<S: StoragePort> {
    store: SettingsStore<S>,
    schema: Schema,
    notifier: SettingsNotifier,
    rng: Box<dyn RandomSource + Send>,
    snapshot: Arc<SettingsSnapshot>,
    collaborators: Collaborators,
}

impl<S: StoragePort> BeaconService<S> {
    /// Construct the service. Does **not** load anything; call
    /// [`boot`](Self::boot) next.
    pub fn new(
        store: SettingsStore<S>,
        schema: Schema,
        notifier: SettingsNotifier,
        rng: Box<dyn RandomSource + Send>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            store,
            schema,
            notifier,
            rng,
            snapshot: Arc::new(SettingsSnapshot::new()),
            collaborators,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load → migrate → persist if changed → notify → publish.
    ///
    /// A legacy import is always persisted so the JSON file is retired.
    pub fn boot(&mut self) -> BootReport {
        let load = self.store.load();
        let migration = self.store.migrate(&self.schema, self.rng.as_mut());

        let imported = matches!(load, LoadStatus::ImportedLegacy { .. });
        let persist = if migration.is_dirty() || imported {
            Some(self.store.persist())
        } else {
            None
        };
        if let Some(Err(e)) = &persist {
            warn!("Settings: boot persist failed ({}), continuing in memory", e);
        }

        let notify = self.announce();
        info!(
            "Settings: boot complete ({:?}, {} changes, {} subscribers notified)",
            load,
            migration.changes(),
            notify.delivered
        );
        BootReport {
            load,
            migration,
            persist,
            notify,
        }
    }

    /// Erase stored settings and boot from an empty document. A fresh
    /// `UserID` is drawn.
    pub fn factory_reset(&mut self) -> Result<BootReport, StoreError> {
        warn!("Settings: factory reset");
        self.store.erase()?;
        let migration = self.store.migrate(&self.schema, self.rng.as_mut());
        let persist = self.store.persist();
        let notify = self.announce();
        Ok(BootReport {
            load: LoadStatus::Empty,
            migration,
            persist: Some(persist),
            notify,
        })
    }

    // ── Mutation ──────────────────────────────────────────────

    /// Validate → apply → persist → notify. Returns the stored value.
    pub fn update_setting(
        &mut self,
        name: &str,
        value: &Scalar,
    ) -> Result<Scalar, SettingsUpdateError> {
        let stored = self
            .store
            .update_value(name, value, &self.schema)
            .map_err(|error| SettingsUpdateError::Rejected {
                field: name.to_owned(),
                error,
            })?;
        info!("Settings: '{}' = {}", name, stored);
        self.commit()?;
        Ok(stored)
    }

    /// Apply several updates atomically: all validate or none apply. One
    /// persist and one notification round for the whole batch.
    pub fn update_settings(
        &mut self,
        updates: &[(String, Scalar)],
    ) -> Result<usize, SettingsUpdateError> {
        self.store
            .update_values(updates, &self.schema)
            .map_err(|(field, error)| SettingsUpdateError::Rejected { field, error })?;
        info!("Settings: {} values updated", updates.len());
        self.commit()?;
        Ok(updates.len())
    }

    fn commit(&mut self) -> Result<(), SettingsUpdateError> {
        let persisted = self.store.persist();
        self.announce();
        persisted
            .map(|_| ())
            .map_err(SettingsUpdateError::NotPersisted)
    }

    fn announce(&mut self) -> NotifyReport {
        let report = self.notifier.invoke(self.store.document());
        self.snapshot.publish(self.store.snapshot());
        report
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn settings(&self) -> &SettingsDocument {
        self.store.document()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn store(&self) -> &SettingsStore<S> {
        &self.store
    }

    /// Shared handle to the published snapshot.
    pub fn snapshot(&self) -> Arc<SettingsSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn system(&self) -> &dyn SystemPort {
        self.collaborators.system.as_ref()
    }

    pub fn network(&self) -> &dyn NetworkPort {
        self.collaborators.network.as_ref()
    }

    pub fn provisioning(&self) -> Option<&dyn ProvisioningLinkPort> {
        self.collaborators.provisioning.as_deref()
    }
}
