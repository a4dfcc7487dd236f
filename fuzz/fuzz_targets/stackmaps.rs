#![no_main]

use jitlower::stackmap::StackMaps;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(maps) = StackMaps::parse(data) {
        let _ = maps.compute_record_map();
    }
});
