//! Hardware random number source.
//!
//! Only used once per device lifetime in practice: migration draws the
//! `UserID` when the document has none.

use crate::app::ports::RandomSource;

pub struct HardwareRng;

impl HardwareRng {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HardwareRng {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for HardwareRng {
    /// ESP-IDF: the hardware RNG. True entropy once the radio is up,
    /// pseudo-random before that, which is fine for an identifier.
    #[cfg(target_os = "espidf")]
    fn next_u32(&mut self) -> u32 {
        // SAFETY: esp_random has no preconditions and touches no caller memory.
        unsafe { esp_idf_svc::sys::esp_random() }
    }

    /// Simulation stub: uses `RandomState` to produce non-cryptographic entropy.
    #[cfg(not(target_os = "espidf"))]
    fn next_u32(&mut self) -> u32 {
        use std::collections::hash_map::RandomState;
        use std::hash::{BuildHasher, Hasher};

        let bits = RandomState::new().build_hasher().finish();
        (bits ^ (bits >> 32)) as u32
    }
}
