#![no_main]

use memtest_core::{
    CsrBus, Engine, EngineConfig, LfsrConfig, ReadBeat, StepInputs, Word, MEMTEST_MAGIC,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    let mut lfsr = LfsrConfig::with_output_bits(data[0] % 129);
    lfsr.taps = vec![data[1] % 40, 30];
    let config = EngineConfig {
        lfsr,
        ..EngineConfig::default()
    };
    let Ok(mut engine) = Engine::new(config) else {
        return;
    };

    for chunk in data[2..].chunks(4) {
        match chunk {
            [op, a, b, c] if op & 0x80 != 0 => {
                let offset = u16::from(op & 0x0f);
                let value = u64::from_le_bytes([*a, *b, *c, 0, 0, 0, 0, 0]);
                let _ = engine.write_csr(offset, value);
                let _ = engine.read_csr(offset);
            }
            [op, a, b, ..] => {
                let outputs = engine.step(StepInputs {
                    write_ready: op & 1 != 0,
                    read: ReadBeat {
                        valid: op & 2 != 0,
                        data: Word::from(u16::from_le_bytes([*a, *b])),
                    },
                });
                assert!(outputs.read_ready);
                assert!(!outputs.write_accepted || outputs.write.strobe);
            }
            _ => {}
        }
        assert_eq!(engine.registers().magic(), MEMTEST_MAGIC);
    }
});
