//! Fuzz target for decoding engine step results and terms from JSON.
//!
//! Decoded values must re-encode without panicking.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_step_json
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use polar_host_types::{StepResult, Term};

fuzz_target!(|data: &[u8]| {
    if let Ok(step) = serde_json::from_slice::<StepResult>(data) {
        let _ = serde_json::to_vec(&step);
    }
    if let Ok(term) = serde_json::from_slice::<Term>(data) {
        let _ = term.to_string();
    }
});
