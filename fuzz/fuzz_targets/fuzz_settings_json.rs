//! Fuzz target: legacy JSON settings import
//!
//! Parses arbitrary bytes as a legacy settings file, migrates the result
//! and asserts the typed view can always be built afterwards.
//!
//! cargo fuzz run fuzz_settings_json

#![no_main]

use beacon::app::ports::RandomSource;
use beacon::settings::{BeaconSettings, Schema, SettingsDocument, migrate};
use libfuzzer_sys::fuzz_target;

struct Fixed;

impl RandomSource for Fixed {
    fn next_u32(&mut self) -> u32 {
        0x5EED_0001
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(mut doc) = SettingsDocument::from_json_slice(data) else {
        return;
    };
    let schema = Schema::beacon();
    migrate(&mut doc, &schema, &mut Fixed);
    assert!(
        BeaconSettings::from_document(&doc).is_ok(),
        "migrated document has no typed view"
    );
    assert!(!migrate(&mut doc, &schema, &mut Fixed).is_dirty());
});
