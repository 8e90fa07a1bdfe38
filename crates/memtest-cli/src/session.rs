//! Host register protocol for a single test run.
//!
//! ## Sequence
//!
//! 1. Pulse writer and reader reset, program `BURST_LENGTH`, pulse shoot.
//! 2. Point the fabric write port at `base` and clock until the burst drains.
//! 3. Start a single-shot fabric read of the same range and clock until the
//!    fabric has streamed every word back.
//! 4. Read `MAGIC` and `ERROR_COUNT`.
//!
//! Both clocking phases share one step budget.

use std::fmt;

use memtest_core::{
    address_mask, BitFlip, ConfigError, CsrBus, CsrError, Engine, EngineConfig, RunBoundary,
    RunError, RunOutcome, SimMemory, Throttle, TraceSink, CSR_BURST_LENGTH_OFFSET,
    CSR_ERROR_COUNT_OFFSET, CSR_MAGIC_OFFSET, CSR_READER_RESET_OFFSET, CSR_WRITER_RESET_OFFSET,
    CSR_WRITER_SHOOT_OFFSET, MEMTEST_MAGIC,
};

/// Words tested when no length is given.
pub const DEFAULT_WORDS: u64 = 1024;

/// Steps allowed across both phases when no budget is given.
pub const DEFAULT_STEP_BUDGET: u64 = 1_000_000;

/// Largest simulated memory a session will allocate, in words.
pub const MAX_FABRIC_WORDS: usize = 1 << 22;

/// Parameters of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Engine parameters.
    pub engine: EngineConfig,
    /// Burst length programmed into the engine.
    pub words: u64,
    /// First fabric address written and read back.
    pub base: usize,
    /// Fabric write backpressure.
    pub write_throttle: Throttle,
    /// Fabric read-valid gaps.
    pub read_throttle: Throttle,
    /// Faults injected into the fabric before the run.
    pub flips: Vec<BitFlip>,
    /// Steps allowed across both phases.
    pub step_budget: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            words: DEFAULT_WORDS,
            base: 0,
            write_throttle: Throttle::NONE,
            read_throttle: Throttle::NONE,
            flips: Vec::new(),
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }
}

/// Register values and transfer counts observed by a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    /// `MAGIC` as read by the host.
    pub magic: u16,
    /// Words the fabric accepted.
    pub words_written: u64,
    /// Words the reader compared.
    pub words_compared: u64,
    /// `ERROR_COUNT` as read by the host.
    pub errors: u64,
    /// Steps spent in the write phase.
    pub write_steps: u64,
    /// Steps spent in the read phase.
    pub read_steps: u64,
}

impl SessionReport {
    /// Returns true when the magic matched and no word mismatched.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.magic == MEMTEST_MAGIC && self.errors == 0
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "magic {:#06x}, {} written, {} compared, {} errors ({} + {} steps): {}",
            self.magic,
            self.words_written,
            self.words_compared,
            self.errors,
            self.write_steps,
            self.read_steps,
            if self.passed() { "PASS" } else { "FAIL" }
        )
    }
}

/// Failure to complete a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Engine parameters were rejected.
    Config(ConfigError),
    /// A protocol register did not decode.
    Csr(CsrError),
    /// A phase did not finish within the step budget.
    Run(RunError),
    /// Burst length does not fit `BURST_LENGTH` at the configured
    /// address width.
    BurstTooLong {
        /// Requested burst length.
        words: u64,
        /// Largest programmable burst length.
        limit: u64,
    },
    /// `base + words` exceeds [`MAX_FABRIC_WORDS`].
    FabricTooLarge {
        /// First tested address.
        base: usize,
        /// Requested burst length.
        words: u64,
    },
    /// An injected flip targets a bit the data path does not have.
    FlipOutOfRange {
        /// Requested bit.
        bit: u8,
        /// Data path width in bits.
        width: u8,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid configuration: {e}"),
            Self::Csr(e) => write!(f, "register access failed: {e}"),
            Self::Run(e) => write!(f, "run did not complete: {e}"),
            Self::BurstTooLong { words, limit } => {
                write!(f, "burst of {words} words exceeds the burst length limit {limit}")
            }
            Self::FabricTooLarge { base, words } => write!(
                f,
                "memory for base {base} + {words} words exceeds {MAX_FABRIC_WORDS} words"
            ),
            Self::FlipOutOfRange { bit, width } => {
                write!(f, "flip bit {bit} is outside the {width}-bit data path")
            }
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Csr(e) => Some(e),
            Self::Run(e) => Some(e),
            Self::BurstTooLong { .. }
            | Self::FabricTooLarge { .. }
            | Self::FlipOutOfRange { .. } => None,
        }
    }
}

impl From<ConfigError> for SessionError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<CsrError> for SessionError {
    fn from(e: CsrError) -> Self {
        Self::Csr(e)
    }
}

impl From<RunError> for SessionError {
    fn from(e: RunError) -> Self {
        Self::Run(e)
    }
}

/// Engine plus the fabric it is wired to.
#[derive(Debug, Clone)]
pub struct Session {
    engine: Engine,
    memory: SimMemory,
    config: SessionConfig,
}

impl Session {
    /// Builds the engine and a fabric large enough for `base + words`.
    ///
    /// Everything is checked before the fabric is allocated.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for invalid engine parameters,
    /// [`SessionError::BurstTooLong`] when `words` does not fit
    /// `BURST_LENGTH`, [`SessionError::FabricTooLarge`] when `base + words`
    /// exceeds [`MAX_FABRIC_WORDS`], and [`SessionError::FlipOutOfRange`]
    /// for a flip beyond the data width.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let engine = Engine::new(config.engine.clone())?;

        let limit = address_mask(config.engine.address_width);
        if config.words > limit {
            return Err(SessionError::BurstTooLong {
                words: config.words,
                limit,
            });
        }
        let capacity = usize::try_from(config.words)
            .ok()
            .and_then(|words| words.checked_add(config.base))
            .filter(|&capacity| capacity <= MAX_FABRIC_WORDS)
            .ok_or(SessionError::FabricTooLarge {
                base: config.base,
                words: config.words,
            })?;
        let width = config.engine.lfsr.output_bits;
        if let Some(flip) = config.flips.iter().find(|flip| flip.bit >= width) {
            return Err(SessionError::FlipOutOfRange {
                bit: flip.bit,
                width,
            });
        }

        let mut memory = SimMemory::new(capacity)
            .with_write_throttle(config.write_throttle)
            .with_read_throttle(config.read_throttle);
        for &flip in &config.flips {
            memory.inject_bit_flip(flip);
        }

        Ok(Self {
            engine,
            memory,
            config,
        })
    }

    /// Engine under test.
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Fabric the engine writes to and reads from.
    #[must_use]
    pub const fn memory(&self) -> &SimMemory {
        &self.memory
    }

    /// Runs the full protocol.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Run`] when either phase exhausts the budget.
    pub fn run(&mut self) -> Result<SessionReport, SessionError> {
        self.run_inner(None)
    }

    /// Runs the full protocol, reporting engine events to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Run`] when either phase exhausts the budget.
    pub fn run_traced(&mut self, sink: &mut dyn TraceSink) -> Result<SessionReport, SessionError> {
        self.run_inner(Some(sink))
    }

    fn run_inner(
        &mut self,
        mut sink: Option<&mut dyn TraceSink>,
    ) -> Result<SessionReport, SessionError> {
        self.engine.write_csr(CSR_WRITER_RESET_OFFSET, 1)?;
        self.engine.write_csr(CSR_READER_RESET_OFFSET, 1)?;
        self.engine
            .write_csr(CSR_BURST_LENGTH_OFFSET, self.config.words)?;
        self.engine.write_csr(CSR_WRITER_SHOOT_OFFSET, 1)?;

        self.memory.start_write(self.config.base);
        let budget = self.config.step_budget;
        let write = self.clock_until(RunBoundary::WriteDrained, budget, sink.as_deref_mut())?;

        let length = usize::try_from(write.words_written).map_err(|_| {
            SessionError::FabricTooLarge {
                base: self.config.base,
                words: write.words_written,
            }
        })?;
        self.memory.start_read(self.config.base, length);
        let read = self.clock_until(
            RunBoundary::ReadDrained,
            budget.saturating_sub(write.steps),
            sink,
        )?;

        let magic = self.engine.read_csr(CSR_MAGIC_OFFSET)?;
        let errors = self.engine.read_csr(CSR_ERROR_COUNT_OFFSET)?;
        Ok(SessionReport {
            magic: u16::try_from(magic).unwrap_or(u16::MAX),
            words_written: write.words_written,
            words_compared: read.words_compared,
            errors,
            write_steps: write.steps,
            read_steps: read.steps,
        })
    }

    fn clock_until(
        &mut self,
        boundary: RunBoundary,
        budget: u64,
        sink: Option<&mut (dyn TraceSink + '_)>,
    ) -> Result<RunOutcome, RunError> {
        match sink {
            Some(sink) => self
                .engine
                .run_until_traced(&mut self.memory, boundary, budget, sink),
            None => self.engine.run_until(&mut self.memory, boundary, budget),
        }
    }
}

/// Builds a [`Session`] from `config` and runs it once.
///
/// # Errors
///
/// Returns a [`SessionError`] when construction or either phase fails.
pub fn run_session(config: SessionConfig) -> Result<SessionReport, SessionError> {
    Session::new(config)?.run()
}
