//! Write-side controller: streams a bounded burst of generator words.

use crate::{ConfigError, GeneratorUpdate, LfsrConfig, Pulses, SequenceGenerator, Word};

/// Write-side `{strobe, data}` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WriteBeat {
    /// A word is offered this step.
    pub strobe: bool,
    /// Offered word.
    pub data: Word,
}

impl WriteBeat {
    /// Nothing offered.
    pub const IDLE: Self = Self {
        strobe: false,
        data: 0,
    };
}

/// Next-state decision for the write path, computed from committed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WritePlan {
    /// Beat driven this step.
    pub beat: WriteBeat,
    /// Handshake completed.
    pub accepted: bool,
    /// Words-remaining after commit.
    pub words_remaining: u64,
    /// Burst length loaded by a trigger this step.
    pub loaded: Option<u64>,
    /// Pending generator update.
    pub generator: GeneratorUpdate,
}

/// Drives up to `burst_length` generator words per trigger into the fabric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteController {
    generator: SequenceGenerator,
    words_remaining: u64,
}

impl WriteController {
    /// Creates an idle controller with a freshly reset generator.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when `config` fails validation.
    pub fn new(config: &LfsrConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            generator: SequenceGenerator::new(config)?,
            words_remaining: 0,
        })
    }

    /// Words still to be transferred in the current burst.
    #[must_use]
    pub const fn words_remaining(&self) -> u64 {
        self.words_remaining
    }

    /// Owned generator.
    #[must_use]
    pub const fn generator(&self) -> &SequenceGenerator {
        &self.generator
    }

    /// Beat offered from the committed state.
    #[must_use]
    pub const fn offer(&self) -> WriteBeat {
        WriteBeat {
            strobe: self.words_remaining != 0,
            data: self.generator.output(),
        }
    }

    /// Evaluates one step without mutating the controller.
    ///
    /// A trigger reloads words-remaining even mid-burst and wins over the
    /// decrement of a word accepted in the same step. A reset only touches
    /// the generator and wins over its advance.
    #[must_use]
    pub fn evaluate(&self, pulses: Pulses, burst_length: u64, ready: bool) -> WritePlan {
        let beat = self.offer();
        let accepted = beat.strobe && ready;
        let (words_remaining, loaded) = if pulses.writer_shoot {
            (burst_length, Some(burst_length))
        } else if accepted {
            (self.words_remaining - 1, None)
        } else {
            (self.words_remaining, None)
        };
        WritePlan {
            beat,
            accepted,
            words_remaining,
            loaded,
            generator: GeneratorUpdate::plan(&self.generator, pulses.writer_reset, accepted),
        }
    }

    /// Commits a plan produced by [`Self::evaluate`].
    pub fn commit(&mut self, plan: &WritePlan) {
        self.words_remaining = plan.words_remaining;
        plan.generator.apply(&mut self.generator);
    }

    /// Loads words-remaining from `burst_length`.
    pub const fn on_trigger(&mut self, burst_length: u64) {
        self.words_remaining = burst_length;
    }

    /// Runs one step against a fabric `ready` with no pulses raised.
    ///
    /// Returns the plan that was committed.
    pub fn tick(&mut self, ready: bool) -> WritePlan {
        let plan = self.evaluate(Pulses::default(), 0, ready);
        self.commit(&plan);
        plan
    }

    /// Resets the generator; words-remaining is untouched.
    pub const fn reset(&mut self) {
        self.generator.reset();
    }
}
