//! Fuzz target: `parse_w1_slave`
//!
//! Arbitrary `w1_slave` file contents must parse to a plausible
//! temperature or a typed error, never a panic.
//!
//! cargo fuzz run fuzz_w1_slave

#![no_main]

use libfuzzer_sys::fuzz_target;
use poolctl::sensors::onewire::parse_w1_slave;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    if let Ok(f) = parse_w1_slave(&text) {
        assert!(f.is_finite(), "non-finite reading from {text:?}");
    }
});
