//! Public host-facing API contracts for embedding the engine.
//!
//! Covers configuration, the register-bus and memory-fabric boundaries, the
//! per-step signal bundles and the deterministic trace hook.

use crate::{
    ConfigError, LfsrConfig, ReadBeat, ReadState, Word, WriteBeat, DEFAULT_ADDRESS_WIDTH,
    MAX_ADDRESS_WIDTH,
};

/// Top-level immutable configuration for an engine instance.
///
/// Both controllers are built from the same [`LfsrConfig`], so the write and
/// read generators cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EngineConfig {
    /// Generator parameters shared by the write and read paths.
    pub lfsr: LfsrConfig,
    /// Width of `BURST_LENGTH` and `ERROR_COUNT`.
    pub address_width: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lfsr: LfsrConfig::default(),
            address_width: DEFAULT_ADDRESS_WIDTH,
        }
    }
}

impl EngineConfig {
    /// Checks the generator parameters and the address width.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address_width == 0 || self.address_width > MAX_ADDRESS_WIDTH {
            return Err(ConfigError::AddressWidth {
                bits: self.address_width,
            });
        }
        self.lfsr.validate()
    }
}

/// Result categories for register writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CsrWriteResult {
    /// Write side effects take effect from the next step.
    Applied,
    /// Register is read-only; the write was dropped without side effects.
    DeniedSuppressed,
}

/// Register-bus contract through which a host reaches the control registers.
pub trait CsrBus {
    /// Reads the register decoded at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CsrError::Unmapped`] when nothing decodes at `offset`.
    fn read_csr(&mut self, offset: u16) -> Result<u64, crate::CsrError>;

    /// Writes the register decoded at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CsrError::Unmapped`] when nothing decodes at `offset`.
    fn write_csr(&mut self, offset: u16, value: u64) -> Result<CsrWriteResult, crate::CsrError>;
}

/// Signals sampled from the memory fabric at the start of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StepInputs {
    /// Write-side `ready`.
    pub write_ready: bool,
    /// Read-side `{valid, data}`.
    pub read: ReadBeat,
}

/// Signals the engine drives during a step, with the transfers that happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepOutputs {
    /// Write-side `{strobe, data}` as offered this step.
    pub write: WriteBeat,
    /// `strobe && ready`: the offered word was transferred.
    pub write_accepted: bool,
    /// Read-side `ready`; always asserted.
    pub read_ready: bool,
    /// Read path state this step.
    pub read_state: ReadState,
    /// A compared word differed from the expected word.
    pub mismatch: bool,
}

impl StepOutputs {
    /// Word accepted by the fabric this step, if any.
    #[must_use]
    pub const fn written_word(&self) -> Option<Word> {
        if self.write_accepted {
            Some(self.write.data)
        } else {
            None
        }
    }
}

/// Streaming boundary to the external memory-access fabric.
pub trait MemoryFabric {
    /// Write-side `ready` for the coming step.
    fn write_ready(&mut self) -> bool;

    /// Read-side beat offered for the coming step.
    fn read_beat(&mut self) -> ReadBeat;

    /// Observes the committed step so the fabric can retire transfers.
    fn complete(&mut self, outputs: &StepOutputs);

    /// Returns `true` when the fabric has no read data left to deliver.
    fn read_idle(&self) -> bool;
}

/// Stop conditions for [`crate::Engine::run_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunBoundary {
    /// Words-remaining reached zero.
    WriteDrained,
    /// The fabric reports no outstanding read data.
    ReadDrained,
    /// A fixed number of steps elapsed.
    Steps(u64),
}

/// Aggregated result of one bounded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RunOutcome {
    /// Steps executed during this run.
    pub steps: u64,
    /// Write-side transfers.
    pub words_written: u64,
    /// Read-side comparisons.
    pub words_compared: u64,
    /// Comparisons that mismatched.
    pub mismatches: u64,
}

impl RunOutcome {
    /// Folds one step into the totals.
    pub const fn record(&mut self, outputs: &StepOutputs) {
        self.steps += 1;
        if outputs.write_accepted {
            self.words_written += 1;
        }
        if matches!(outputs.read_state, ReadState::Compare) {
            self.words_compared += 1;
        }
        if outputs.mismatch {
            self.mismatches += 1;
        }
    }
}

/// Deterministic trace events emitted in commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// `WRITER_SHOOT` loaded words-remaining.
    BurstLoaded {
        /// Step index.
        cycle: u64,
        /// Loaded burst length.
        length: u64,
    },
    /// The write fabric accepted a word.
    WordWritten {
        /// Step index.
        cycle: u64,
        /// Transferred word.
        data: Word,
    },
    /// A returned word was compared.
    WordCompared {
        /// Step index.
        cycle: u64,
        /// Regenerated word.
        expected: Word,
        /// Word read back from memory.
        observed: Word,
    },
    /// `WRITER_RESET` reset the write generator.
    WriterReset {
        /// Step index.
        cycle: u64,
    },
    /// `READER_RESET` reset the read generator and cleared the count.
    ReaderReset {
        /// Step index.
        cycle: u64,
    },
}

/// Sink trait for deterministic trace hooks.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: TraceEvent);
}

impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}
