#![no_main]

use jitlower::{compile_function, emit::LirEmitter, schedule::Schedule, Backend, LoweringConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(schedule) = Schedule::from_text(text) else {
        return;
    };

    let backend = Backend::initialize();
    let mut emitter = LirEmitter::new("fuzz");
    let _ = compile_function(backend, &schedule, &LoweringConfig::default(), &mut emitter);
});
