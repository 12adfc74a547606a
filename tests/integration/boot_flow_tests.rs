//! Boot sequence: load → migrate → persist → notify, against mock storage.

use beacon::app::service::BeaconService;
use beacon::error::Error;
use beacon::settings::schema::BuildInfo;
use beacon::settings::store::{LEGACY_SETTINGS_KEY, SETTINGS_KEY, SETTINGS_NAMESPACE};
use beacon::settings::{BeaconSettings, LoadStatus, Rgb, Scalar, Schema, SettingsDocument, keys};
use serde_json::json;

use crate::mock_hw::{Call, MemStorage, Recorder, TEST_USER_ID, service_with};

fn view<S: beacon::app::ports::StoragePort>(svc: &BeaconService<S>) -> BeaconSettings {
    BeaconSettings::from_document(svc.settings()).unwrap()
}

#[test]
fn first_boot_populates_defaults_and_persists() {
    let storage = MemStorage::new();
    let rec = Recorder::new();
    let mut svc = service_with(storage.clone(), Schema::beacon(), &rec);

    let report = svc.boot();
    assert_eq!(report.load, LoadStatus::Empty);
    assert_eq!(report.migration.inserted.len(), Schema::beacon().fields().len());
    assert!(matches!(report.persist, Some(Ok(_))));
    assert_eq!(report.notify.delivered, 3);
    assert!(report.check().is_ok());
    assert!(storage.get(SETTINGS_NAMESPACE, SETTINGS_KEY).is_some());

    let s = view(&svc);
    assert_eq!(s.user_id, TEST_USER_ID);
    assert_eq!(s.user_name, "User_EE42");
    assert_eq!(s.device_name, "Beacon_EE42");
    assert_eq!(s.frequency_mhz, 914.9);

    let calls = rec.calls();
    assert!(calls.contains(&Call::Theme(Rgb::new(0x00, 0x80, 0x00))));
    assert!(calls.contains(&Call::UserId(TEST_USER_ID)));
    assert!(calls.contains(&Call::Frequency(914.9)));
    assert!(calls.contains(&Call::SendAttempts(3)));
    assert!(calls.contains(&Call::SilentMode(false)));
}

#[test]
fn second_boot_is_clean_and_does_not_write() {
    let storage = MemStorage::new();
    let rec = Recorder::new();
    service_with(storage.clone(), Schema::beacon(), &rec).boot();
    let stored = storage.get(SETTINGS_NAMESPACE, SETTINGS_KEY);

    let mut svc = service_with(storage.clone(), Schema::beacon(), &rec);
    let report = svc.boot();
    assert!(matches!(report.load, LoadStatus::Loaded { .. }));
    assert!(!report.migration.is_dirty());
    assert_eq!(report.persist, None);
    assert_eq!(svc.store().writes(), 0);
    assert_eq!(storage.get(SETTINGS_NAMESPACE, SETTINGS_KEY), stored);
    // Subscribers hear about the loaded document all the same.
    assert_eq!(report.notify.delivered, 3);
}

#[test]
fn upgrade_restamps_versions_and_keeps_user_edits() {
    let storage = MemStorage::new();
    let rec = Recorder::new();
    let old_build = BuildInfo {
        firmware_version: "0.3.0",
        hardware_version: 2,
    };

    let mut old = service_with(storage.clone(), Schema::beacon().with_build(old_build), &rec);
    old.boot();
    old.update_setting(keys::USER_NAME, &Scalar::Text("Ranger".into()))
        .unwrap();
    old.update_setting(keys::SILENT_MODE, &Scalar::Bool(true))
        .unwrap();

    let mut new = service_with(storage.clone(), Schema::beacon(), &rec);
    let report = new.boot();
    assert!(report.migration.restamped.contains(&keys::FIRMWARE_VERSION));
    assert!(report.migration.restamped.contains(&keys::HARDWARE_VERSION));
    assert!(report.migration.inserted.is_empty());
    assert!(report.migration.coerced.is_empty());

    let s = view(&new);
    assert_eq!(s.user_name, "Ranger");
    assert!(s.silent_mode);
    assert_eq!(s.user_id, TEST_USER_ID);
    assert_eq!(s.firmware_version, env!("CARGO_PKG_VERSION"));
    assert_eq!(s.hardware_version, 3);
}

#[test]
fn missing_flag_is_inserted_alone() {
    let storage = MemStorage::new();
    let rec = Recorder::new();
    let mut first = service_with(storage.clone(), Schema::beacon(), &rec);
    first.boot();

    let mut stripped = SettingsDocument::new();
    for (name, entry) in first.settings().iter() {
        if name != keys::SILENT_MODE {
            stripped.insert(name, entry.clone());
        }
    }
    let mut buf = vec![0u8; 4096];
    let len = stripped.encode_into(&mut buf).unwrap().len();
    storage.put(SETTINGS_NAMESPACE, SETTINGS_KEY, &buf[..len]);

    let mut svc = service_with(storage, Schema::beacon(), &rec);
    let report = svc.boot();
    assert_eq!(report.migration.inserted.as_slice(), [keys::SILENT_MODE]);
    assert_eq!(report.migration.changes(), 1);
    assert!(matches!(report.persist, Some(Ok(_))));
    assert_eq!(svc.store().writes(), 1);
    assert_eq!(
        svc.settings().value(keys::SILENT_MODE),
        Some(&Scalar::Bool(false))
    );
    // Appended after the existing entries; the rest keep their values.
    assert_eq!(svc.settings().keys().last(), Some(keys::SILENT_MODE));
    assert_eq!(view(&svc).user_id, TEST_USER_ID);
}

#[test]
fn legacy_json_is_imported_once_and_retired() {
    let storage = MemStorage::new();
    let legacy = json!({
        "UserID": 4660,
        "User Name": {"cfgType": 10, "cfgVal": "Scout", "dftVal": "User_1234", "maxLen": 12},
        "Frequency": {
            "cfgType": 9, "cfgVal": 903.1, "dftVal": 914.9,
            "minVal": 902.3, "maxVal": 914.9, "incVal": 0.2
        },
        "Saved Note": "keep me"
    });
    storage.put(
        SETTINGS_NAMESPACE,
        LEGACY_SETTINGS_KEY,
        legacy.to_string().as_bytes(),
    );

    let rec = Recorder::new();
    let mut svc = service_with(storage.clone(), Schema::beacon(), &rec);
    let report = svc.boot();
    assert!(matches!(report.load, LoadStatus::ImportedLegacy { .. }));
    assert!(matches!(report.persist, Some(Ok(_))));
    assert!(storage.get(SETTINGS_NAMESPACE, LEGACY_SETTINGS_KEY).is_none());
    assert!(storage.get(SETTINGS_NAMESPACE, SETTINGS_KEY).is_some());

    let s = view(&svc);
    assert_eq!(s.user_id, 4660);
    assert_eq!(s.user_name, "Scout");
    assert_eq!(s.device_name, "Beacon_1234");
    assert!((s.frequency_mhz - 903.1).abs() < 1e-9);
    assert_eq!(
        svc.settings().value("Saved Note"),
        Some(&Scalar::Text("keep me".into()))
    );

    // Next boot reads the binary blob.
    let mut again = service_with(storage, Schema::beacon(), &rec);
    assert!(matches!(again.boot().load, LoadStatus::Loaded { .. }));
}

#[test]
fn corrupted_blob_is_fully_repopulated() {
    let storage = MemStorage::new();
    storage.put(SETTINGS_NAMESPACE, SETTINGS_KEY, &[0xFF; 12]);

    let rec = Recorder::new();
    let mut svc = service_with(storage, Schema::beacon(), &rec);
    let report = svc.boot();
    assert_eq!(report.load, LoadStatus::Corrupted);
    assert_eq!(report.migration.inserted.len(), Schema::beacon().fields().len());
    assert!(matches!(report.persist, Some(Ok(_))));
    assert_eq!(view(&svc).user_id, TEST_USER_ID);
}

#[test]
fn failed_boot_write_keeps_memory_authoritative() {
    let storage = MemStorage::new();
    storage.fail_writes(true);
    let rec = Recorder::new();
    let mut svc = service_with(storage.clone(), Schema::beacon(), &rec);

    let report = svc.boot();
    assert!(matches!(report.persist, Some(Err(_))));
    assert!(matches!(report.check(), Err(Error::Storage(_))));
    assert_eq!(report.notify.delivered, 3);
    assert_eq!(view(&svc).user_name, "User_EE42");
    assert!(storage.get(SETTINGS_NAMESPACE, SETTINGS_KEY).is_none());
}

#[test]
fn factory_reset_returns_to_defaults() {
    let storage = MemStorage::new();
    let rec = Recorder::new();
    let mut svc = service_with(storage, Schema::beacon(), &rec);
    svc.boot();
    svc.update_setting(keys::BROADCAST_ATTEMPTS, &Scalar::Int(5))
        .unwrap();
    assert_eq!(view(&svc).broadcast_attempts, 5);

    let report = svc.factory_reset().unwrap();
    assert_eq!(report.load, LoadStatus::Empty);
    assert!(matches!(report.persist, Some(Ok(_))));
    assert_eq!(view(&svc).broadcast_attempts, 3);
}

#[test]
fn snapshot_tracks_every_announcement() {
    let rec = Recorder::new();
    let mut svc = service_with(MemStorage::new(), Schema::beacon(), &rec);
    let snapshot = svc.snapshot();
    let before = snapshot.generation();

    svc.boot();
    svc.update_setting(keys::TIME_24H, &Scalar::Bool(true)).unwrap();

    assert_eq!(snapshot.generation(), before + 2);
    assert_eq!(
        snapshot.current().value(keys::TIME_24H),
        Some(&Scalar::Bool(true))
    );
}
