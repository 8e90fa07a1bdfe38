//! Write-path burst accounting and backpressure coverage.

use memtest_core::{
    CsrBus, Engine, EngineConfig, LfsrConfig, SequenceGenerator, StepInputs, Word,
    CSR_BURST_LENGTH_OFFSET, CSR_WRITER_RESET_OFFSET, CSR_WRITER_SHOOT_OFFSET,
};
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

const READY: StepInputs = StepInputs {
    write_ready: true,
    read: memtest_core::ReadBeat::IDLE,
};

const STALLED: StepInputs = StepInputs {
    write_ready: false,
    read: memtest_core::ReadBeat::IDLE,
};

fn engine() -> Engine {
    Engine::new(EngineConfig::default()).expect("default config is valid")
}

fn expected_words(count: usize) -> Vec<Word> {
    let mut generator = SequenceGenerator::new(&LfsrConfig::default()).expect("valid");
    let mut out = vec![generator.output()];
    out.extend((1..count).map(|_| generator.advance()));
    out.truncate(count);
    out
}

fn trigger(engine: &mut Engine, length: u64) {
    engine
        .write_csr(CSR_BURST_LENGTH_OFFSET, length)
        .expect("burst length is mapped");
    engine
        .write_csr(CSR_WRITER_SHOOT_OFFSET, 1)
        .expect("shoot is mapped");
    // The pulse is observed by this step; nothing is offered yet.
    let outputs = engine.step(STALLED);
    assert!(!outputs.write.strobe);
}

#[rstest]
#[case::empty(0)]
#[case::single(1)]
#[case::short(7)]
#[case::long(300)]
fn burst_transfers_exactly_burst_length_words(#[case] length: u64) {
    let mut engine = engine();
    trigger(&mut engine, length);

    let mut written = Vec::new();
    for _ in 0..length + 10 {
        written.extend(engine.step(READY).written_word());
    }

    assert_eq!(written.len() as u64, length);
    assert_eq!(written, expected_words(length as usize));
    assert_eq!(engine.writer().words_remaining(), 0);
}

#[test]
fn burst_has_no_gaps_under_full_readiness() {
    let mut engine = engine();
    trigger(&mut engine, 16);

    for _ in 0..16 {
        let outputs = engine.step(READY);
        assert!(outputs.write.strobe);
        assert!(outputs.write_accepted);
    }
    assert!(!engine.step(READY).write.strobe);
}

#[rstest]
#[case(1)]
#[case(5)]
#[case(40)]
fn withheld_readiness_freezes_generator_and_count(#[case] stall_steps: u64) {
    let mut engine = engine();
    trigger(&mut engine, 8);
    let registers = engine.writer().generator().registers();

    for _ in 0..stall_steps {
        let outputs = engine.step(STALLED);
        assert!(outputs.write.strobe);
        assert!(!outputs.write_accepted);
    }

    assert_eq!(engine.writer().generator().registers(), registers);
    assert_eq!(engine.writer().words_remaining(), 8);

    let mut written = Vec::new();
    while engine.writer().words_remaining() > 0 {
        written.extend(engine.step(READY).written_word());
    }
    assert_eq!(written, expected_words(8));
}

#[test]
fn intermittent_backpressure_neither_skips_nor_duplicates() {
    let mut engine = engine();
    trigger(&mut engine, 20);

    let mut written = Vec::new();
    let mut step = 0_u32;
    while engine.writer().words_remaining() > 0 {
        let inputs = if step % 3 == 1 { STALLED } else { READY };
        written.extend(engine.step(inputs).written_word());
        step += 1;
    }

    assert_eq!(written, expected_words(20));
}

#[test]
fn trigger_mid_burst_restarts_the_count() {
    let mut engine = engine();
    trigger(&mut engine, 10);
    for _ in 0..4 {
        assert!(engine.step(READY).write_accepted);
    }
    assert_eq!(engine.writer().words_remaining(), 6);

    engine
        .write_csr(CSR_BURST_LENGTH_OFFSET, 3)
        .expect("burst length is mapped");
    engine
        .write_csr(CSR_WRITER_SHOOT_OFFSET, 1)
        .expect("shoot is mapped");
    // The reload step still transfers the word on offer.
    assert!(engine.step(READY).write_accepted);
    assert_eq!(engine.writer().words_remaining(), 3);

    let mut written = Vec::new();
    while engine.writer().words_remaining() > 0 {
        written.extend(engine.step(READY).written_word());
    }
    // The sequence continues; the restart only affects the count.
    assert_eq!(written, expected_words(8)[5..8].to_vec());
}

#[test]
fn writer_reset_restarts_sequence_without_touching_count() {
    let mut engine = engine();
    trigger(&mut engine, 6);
    engine.step(READY);
    engine.step(READY);

    engine
        .write_csr(CSR_WRITER_RESET_OFFSET, 1)
        .expect("reset is mapped");
    engine.step(STALLED);

    assert_eq!(engine.writer().words_remaining(), 4);
    assert_eq!(engine.writer().generator().state(), 0);

    let mut written = Vec::new();
    while engine.writer().words_remaining() > 0 {
        written.extend(engine.step(READY).written_word());
    }
    assert_eq!(written, expected_words(4));
}
