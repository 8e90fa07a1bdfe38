//! Cycle-stepped engine tying the controllers to the register file.
//!
//! Each step runs in two phases:
//! 1. Take the staged pulses and evaluate both controllers against the
//!    committed state (no controller sees another's next state).
//! 2. Commit writer, reader and error count together.

use crate::api::{
    CsrBus, CsrWriteResult, EngineConfig, MemoryFabric, RunBoundary, RunOutcome, StepInputs,
    StepOutputs, TraceEvent, TraceSink,
};
use crate::{
    ConfigError, ControlRegisters, CsrError, ReadController, ReadPlan, ReadState, RunError,
    WriteController, WritePlan,
};

/// One memtest engine instance: register file plus both controllers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engine {
    config: EngineConfig,
    registers: ControlRegisters,
    writer: WriteController,
    reader: ReadController,
    cycle: u64,
}

impl Engine {
    /// Builds an engine with both generators in their post-reset state.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when `config` fails validation.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            registers: ControlRegisters::new(config.address_width),
            writer: WriteController::new(&config.lfsr)?,
            reader: ReadController::new(&config.lfsr)?,
            config,
            cycle: 0,
        })
    }

    /// Configuration the engine was built from.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register file.
    #[must_use]
    pub const fn registers(&self) -> &ControlRegisters {
        &self.registers
    }

    /// Mutable register file for direct host access.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn registers_mut(&mut self) -> &mut ControlRegisters {
        &mut self.registers
    }

    /// Write-side controller.
    #[must_use]
    pub const fn writer(&self) -> &WriteController {
        &self.writer
    }

    /// Read-side controller.
    #[must_use]
    pub const fn reader(&self) -> &ReadController {
        &self.reader
    }

    /// Steps committed since construction.
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Advances one synchronous step.
    pub fn step(&mut self, inputs: StepInputs) -> StepOutputs {
        let (write, read) = self.evaluate(inputs);
        self.commit(&write, &read)
    }

    /// Advances one step, reporting committed side effects to `sink`.
    pub fn step_traced(&mut self, inputs: StepInputs, sink: &mut dyn TraceSink) -> StepOutputs {
        let cycle = self.cycle;
        let pulses = self.registers.pending_pulses();
        let (write, read) = self.evaluate(inputs);
        let outputs = self.commit(&write, &read);

        if pulses.writer_reset {
            sink.on_event(TraceEvent::WriterReset { cycle });
        }
        if let Some(length) = write.loaded {
            sink.on_event(TraceEvent::BurstLoaded { cycle, length });
        }
        if let Some(data) = outputs.written_word() {
            sink.on_event(TraceEvent::WordWritten { cycle, data });
        }
        if pulses.reader_reset {
            sink.on_event(TraceEvent::ReaderReset { cycle });
        }
        if read.state == ReadState::Compare {
            sink.on_event(TraceEvent::WordCompared {
                cycle,
                expected: read.expected,
                observed: inputs.read.data,
            });
        }
        outputs
    }

    /// Samples the fabric, steps, and hands the committed outputs back.
    pub fn clock(&mut self, fabric: &mut dyn MemoryFabric) -> StepOutputs {
        let inputs = Self::sample(fabric);
        let outputs = self.step(inputs);
        fabric.complete(&outputs);
        outputs
    }

    /// Traced variant of [`Self::clock`].
    pub fn clock_traced(
        &mut self,
        fabric: &mut dyn MemoryFabric,
        sink: &mut dyn TraceSink,
    ) -> StepOutputs {
        let inputs = Self::sample(fabric);
        let outputs = self.step_traced(inputs, sink);
        fabric.complete(&outputs);
        outputs
    }

    /// Clocks against `fabric` until `boundary` holds.
    ///
    /// The boundary is checked before every step, so an already satisfied
    /// boundary returns without stepping. A staged trigger counts as an
    /// undrained write. Handshake stalls never time out on
    /// their own; `max_steps` bounds the run.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::StepBudgetExhausted`] when `max_steps` steps pass
    /// without reaching the boundary.
    pub fn run_until(
        &mut self,
        fabric: &mut dyn MemoryFabric,
        boundary: RunBoundary,
        max_steps: u64,
    ) -> Result<RunOutcome, RunError> {
        self.run_inner(fabric, boundary, max_steps, None)
    }

    /// Traced variant of [`Self::run_until`].
    ///
    /// # Errors
    ///
    /// Returns [`RunError::StepBudgetExhausted`] when `max_steps` steps pass
    /// without reaching the boundary.
    pub fn run_until_traced(
        &mut self,
        fabric: &mut dyn MemoryFabric,
        boundary: RunBoundary,
        max_steps: u64,
        sink: &mut dyn TraceSink,
    ) -> Result<RunOutcome, RunError> {
        self.run_inner(fabric, boundary, max_steps, Some(sink))
    }

    fn run_inner(
        &mut self,
        fabric: &mut dyn MemoryFabric,
        boundary: RunBoundary,
        max_steps: u64,
        mut sink: Option<&mut dyn TraceSink>,
    ) -> Result<RunOutcome, RunError> {
        let mut outcome = RunOutcome::default();
        loop {
            let reached = match boundary {
                RunBoundary::WriteDrained => {
                    self.writer.words_remaining() == 0
                        && !self.registers.pending_pulses().writer_shoot
                }
                RunBoundary::ReadDrained => fabric.read_idle(),
                RunBoundary::Steps(steps) => outcome.steps >= steps,
            };
            if reached {
                return Ok(outcome);
            }
            if outcome.steps >= max_steps {
                return Err(RunError::StepBudgetExhausted {
                    steps: outcome.steps,
                    boundary,
                });
            }
            let outputs = match sink.as_deref_mut() {
                Some(sink) => self.clock_traced(fabric, sink),
                None => self.clock(fabric),
            };
            outcome.record(&outputs);
        }
    }

    fn sample(fabric: &mut dyn MemoryFabric) -> StepInputs {
        StepInputs {
            write_ready: fabric.write_ready(),
            read: fabric.read_beat(),
        }
    }

    fn evaluate(&mut self, inputs: StepInputs) -> (WritePlan, ReadPlan) {
        let pulses = self.registers.take_pulses();
        let write = self.writer.evaluate(
            pulses,
            self.registers.burst_length(),
            inputs.write_ready,
        );
        let read = self.reader.evaluate(
            pulses.reader_reset,
            inputs.read,
            self.registers.error_counter(),
        );
        (write, read)
    }

    fn commit(&mut self, write: &WritePlan, read: &ReadPlan) -> StepOutputs {
        self.writer.commit(write);
        self.reader.commit(read, self.registers.error_counter_mut());
        self.cycle += 1;
        StepOutputs {
            write: write.beat,
            write_accepted: write.accepted,
            read_ready: self.reader.ready(),
            read_state: read.state,
            mismatch: read.mismatch,
        }
    }
}

impl CsrBus for Engine {
    fn read_csr(&mut self, offset: u16) -> Result<u64, CsrError> {
        self.registers.read_csr(offset)
    }

    fn write_csr(&mut self, offset: u16, value: u64) -> Result<CsrWriteResult, CsrError> {
        self.registers.write_csr(offset, value)
    }
}
