//! Core crate for the LFSR memory stress-test engine.

/// Error taxonomy for configuration, register access and bounded runs.
pub mod error;
pub use error::{ConfigError, CsrError, RunError};

/// Maximal-length sequence generator.
pub mod lfsr;
pub use lfsr::{
    word_mask, GeneratorUpdate, LfsrConfig, LfsrRegisters, SequenceGenerator, Word,
    DEFAULT_OUTPUT_BITS, DEFAULT_STATE_BITS, DEFAULT_TAPS, MAX_WORD_BITS,
};

/// Control/status register file and register map.
pub mod registers;
pub use registers::{
    address_mask, ControlRegisters, CsrAccess, CsrRegister, ErrorCounter, Pulses,
    CSR_BURST_LENGTH_OFFSET, CSR_ERROR_COUNT_OFFSET, CSR_MAGIC_OFFSET, CSR_READER_RESET_OFFSET,
    CSR_WRITER_RESET_OFFSET, CSR_WRITER_SHOOT_OFFSET, DEFAULT_ADDRESS_WIDTH, MAX_ADDRESS_WIDTH,
    MEMTEST_MAGIC,
};

/// Write-side burst controller.
pub mod writer;
pub use writer::{WriteBeat, WriteController, WritePlan};

/// Read-side compare controller.
pub mod reader;
pub use reader::{CounterUpdate, ReadBeat, ReadController, ReadPlan, ReadState};

/// Public host-facing API contract and integration types.
pub mod api;
pub use api::{
    CsrBus, CsrWriteResult, EngineConfig, MemoryFabric, RunBoundary, RunOutcome, StepInputs,
    StepOutputs, TraceEvent, TraceSink,
};

/// Two-phase stepping engine.
pub mod engine;
pub use engine::Engine;

/// Reference memory fabric.
pub mod fabric;
pub use fabric::{BitFlip, SimMemory, Throttle};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
