//! Fuzz target: converter and temperature register decoding.
//!
//! Feeds arbitrary bytes to the ADC frame decoder at every resolution and
//! to the temperature decoder; neither may panic and every decoded code
//! must fit in the resolution's width plus sign.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use pemstack::sensors::adc::{decode_frame, is_not_ready, Resolution};
use pemstack::sensors::temperature::decode_celsius;

fuzz_target!(|data: &[u8]| {
    for res in Resolution::ALL {
        let _ = is_not_ready(data, res);
        if let Some(code) = decode_frame(data, res) {
            let span = 1i32 << res.bits();
            assert!((-span..span).contains(&code), "{res:?} decoded {code}");
        }
    }

    if let [msb, lsb, ..] = data {
        let t = decode_celsius(*msb, *lsb);
        assert!((-128.0..128.0).contains(&t));
    }
});
