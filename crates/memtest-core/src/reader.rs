//! Read-side controller: regenerates the sequence and counts mismatches.

use crate::{ConfigError, ErrorCounter, GeneratorUpdate, LfsrConfig, SequenceGenerator, Word};

/// Read-side `{valid, data}` pair offered by the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ReadBeat {
    /// A word is offered this step.
    pub valid: bool,
    /// Offered word.
    pub data: Word,
}

impl ReadBeat {
    /// No word offered.
    pub const IDLE: Self = Self {
        valid: false,
        data: 0,
    };

    /// A valid word.
    #[must_use]
    pub const fn word(data: Word) -> Self {
        Self { valid: true, data }
    }
}

/// Per-step read path state, derived from `valid` alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ReadState {
    /// No incoming word; the generator holds.
    #[default]
    Idle,
    /// Incoming word is compared and the generator advances.
    Compare,
}

/// Pending error counter update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterUpdate {
    /// Count unchanged.
    Hold,
    /// Store the incremented count.
    Load(u64),
    /// Reset pulse: zero the count.
    Clear,
}

/// Next-state decision for the read path, computed from committed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadPlan {
    /// State for this step.
    pub state: ReadState,
    /// Word the generator presented for comparison.
    pub expected: Word,
    /// Compared word differed from `expected`.
    pub mismatch: bool,
    /// Pending generator update.
    pub generator: GeneratorUpdate,
    /// Pending counter update.
    pub counter: CounterUpdate,
}

/// Unconditional sink that checks returned words against the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadController {
    generator: SequenceGenerator,
}

impl ReadController {
    /// Creates a controller with a freshly reset generator.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when `config` fails validation.
    pub fn new(config: &LfsrConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            generator: SequenceGenerator::new(config)?,
        })
    }

    /// The read path never applies backpressure.
    #[must_use]
    pub const fn ready(&self) -> bool {
        true
    }

    /// Owned generator.
    #[must_use]
    pub const fn generator(&self) -> &SequenceGenerator {
        &self.generator
    }

    /// Word the next valid beat is compared against.
    #[must_use]
    pub const fn expected(&self) -> Word {
        self.generator.output()
    }

    /// Evaluates one step without mutating the controller or the counter.
    ///
    /// A reset pulse clears the count and reloads the generator, overriding
    /// any comparison in the same step.
    #[must_use]
    pub fn evaluate(&self, reset: bool, beat: ReadBeat, counter: ErrorCounter) -> ReadPlan {
        let expected = self.expected();
        let state = if beat.valid {
            ReadState::Compare
        } else {
            ReadState::Idle
        };
        let mismatch = beat.valid && beat.data != expected;
        let counter = if reset {
            CounterUpdate::Clear
        } else if mismatch {
            CounterUpdate::Load(counter.incremented())
        } else {
            CounterUpdate::Hold
        };
        ReadPlan {
            state,
            expected,
            mismatch,
            generator: GeneratorUpdate::plan(&self.generator, reset, beat.valid),
            counter,
        }
    }

    /// Commits a plan produced by [`Self::evaluate`].
    pub fn commit(&mut self, plan: &ReadPlan, counter: &mut ErrorCounter) {
        plan.generator.apply(&mut self.generator);
        match plan.counter {
            CounterUpdate::Hold => {}
            CounterUpdate::Load(value) => counter.load(value),
            CounterUpdate::Clear => counter.clear(),
        }
    }

    /// Consumes whatever the read interface presents this step.
    ///
    /// Returns the committed plan.
    pub fn on_word(&mut self, data: Word, valid: bool, counter: &mut ErrorCounter) -> ReadPlan {
        let plan = self.evaluate(false, ReadBeat { valid, data }, *counter);
        self.commit(&plan, counter);
        plan
    }

    /// Resets the generator and zeroes the count.
    pub const fn reset(&mut self, counter: &mut ErrorCounter) {
        self.generator.reset();
        counter.clear();
    }
}
