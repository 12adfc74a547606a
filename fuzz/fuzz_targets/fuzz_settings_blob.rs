//! Fuzz target: `SettingsDocument::decode`
//!
//! Feeds arbitrary bytes to the binary settings decoder. Anything that
//! decodes must migrate cleanly and re-encode.
//!
//! cargo fuzz run fuzz_settings_blob

#![no_main]

use beacon::app::ports::RandomSource;
use beacon::settings::{Schema, SettingsDocument, migrate};
use libfuzzer_sys::fuzz_target;

struct Fixed;

impl RandomSource for Fixed {
    fn next_u32(&mut self) -> u32 {
        0x5EED_0002
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(mut doc) = SettingsDocument::decode(data) else {
        return;
    };
    migrate(&mut doc, &Schema::beacon(), &mut Fixed);

    let mut buf = vec![0u8; 64 * 1024];
    if let Ok(used) = doc.encode_into(&mut buf) {
        let len = used.len();
        let again = SettingsDocument::decode(&buf[..len]).expect("re-encoded blob must decode");
        assert_eq!(again.len(), doc.len());
    }
});
