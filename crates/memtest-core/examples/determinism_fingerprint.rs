//! Deterministic run fingerprint used for cross-host comparison.

use memtest_core::{
    BitFlip, CsrBus, Engine, EngineConfig, RunBoundary, SimMemory, Throttle, TraceEvent,
    CSR_BURST_LENGTH_OFFSET, CSR_ERROR_COUNT_OFFSET, CSR_WRITER_SHOOT_OFFSET,
};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

const WORDS: u64 = 256;
const BUDGET: u64 = 100_000;

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn fingerprint() -> String {
    let mut engine = Engine::new(EngineConfig::default()).expect("default config is valid");
    let mut memory = SimMemory::new(512)
        .with_write_throttle(Throttle {
            period: 5,
            stalled: 2,
        })
        .with_read_throttle(Throttle {
            period: 3,
            stalled: 1,
        });
    memory.inject_bit_flip(BitFlip {
        address: 70,
        bit: 12,
    });

    engine
        .write_csr(CSR_BURST_LENGTH_OFFSET, WORDS)
        .expect("burst length is mapped");
    engine
        .write_csr(CSR_WRITER_SHOOT_OFFSET, 1)
        .expect("shoot is mapped");

    let mut events = Vec::new();
    memory.start_write(64);
    engine
        .run_until_traced(&mut memory, RunBoundary::WriteDrained, BUDGET, &mut events)
        .expect("write should drain");
    memory.start_read(64, usize::try_from(WORDS).expect("fits"));
    engine
        .run_until_traced(&mut memory, RunBoundary::ReadDrained, BUDGET, &mut events)
        .expect("read should drain");

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    for event in &events {
        match *event {
            TraceEvent::BurstLoaded { cycle, length } => {
                hash_bytes(&mut hash, &[0x10]);
                hash_bytes(&mut hash, &cycle.to_le_bytes());
                hash_bytes(&mut hash, &length.to_le_bytes());
            }
            TraceEvent::WordWritten { cycle, data } => {
                hash_bytes(&mut hash, &[0x11]);
                hash_bytes(&mut hash, &cycle.to_le_bytes());
                hash_bytes(&mut hash, &data.to_le_bytes());
            }
            TraceEvent::WordCompared {
                cycle,
                expected,
                observed,
            } => {
                hash_bytes(&mut hash, &[0x12]);
                hash_bytes(&mut hash, &cycle.to_le_bytes());
                hash_bytes(&mut hash, &expected.to_le_bytes());
                hash_bytes(&mut hash, &observed.to_le_bytes());
            }
            TraceEvent::WriterReset { cycle } => {
                hash_bytes(&mut hash, &[0x13]);
                hash_bytes(&mut hash, &cycle.to_le_bytes());
            }
            TraceEvent::ReaderReset { cycle } => {
                hash_bytes(&mut hash, &[0x14]);
                hash_bytes(&mut hash, &cycle.to_le_bytes());
            }
        }
    }

    let errors = engine
        .read_csr(CSR_ERROR_COUNT_OFFSET)
        .expect("error count is mapped");
    hash_bytes(&mut hash, &errors.to_le_bytes());
    hash_bytes(&mut hash, &engine.cycle().to_le_bytes());

    format!("{hash:016x}")
}

fn main() {
    println!("{}", fingerprint());
}
