#![no_main]
use libfuzzer_sys::fuzz_target;
use rtsimd::{Assembler, P32Vsx1F32x2, Profile, ProfileId, X64Avx1F32};

fn builder<P: Profile>(data: &str) {
    let mut asm = Assembler::<P>::new();
    for line in data.lines() {
        if asm.emit(line).is_err() {
            return;
        }
    }
    let _ = asm.finish();
}

fuzz_target!(|data: &str| {
    // The one-shot front end must never panic, only return Ok/Err.
    for id in ProfileId::ALL {
        let _ = rtsimd::assemble(data, id);
    }

    // Line-at-a-time emission through the typed builder, on the two
    // profiles with the most shims.
    builder::<X64Avx1F32>(data);
    builder::<P32Vsx1F32x2>(data);
});
