//! Maximal-length sequence generator shared by the write and read paths.
//!
//! The generator keeps a `state_bits`-wide shift register and a registered
//! output word. Each advance shifts `output_bits` fresh feedback bits into a
//! working vector (the state zero-extended to `max(state_bits, output_bits)`),
//! then latches the low `state_bits` bits as the new state and the low
//! `output_bits` bits as the new output. Feedback is the complement of the
//! XOR over the tap positions.

use crate::ConfigError;

/// Data word carried on the streaming interfaces.
pub type Word = u128;

/// Widest supported state or output vector.
pub const MAX_WORD_BITS: u8 = 128;

/// Default shift-register width.
pub const DEFAULT_STATE_BITS: u8 = 31;

/// Default output word width (memory data-path width).
pub const DEFAULT_OUTPUT_BITS: u8 = 64;

/// Default feedback taps, giving a period of `2^31 - 1` with 31 state bits.
pub const DEFAULT_TAPS: [u8; 2] = [27, 30];

/// Returns a mask with the low `bits` bits set.
#[must_use]
pub const fn word_mask(bits: u8) -> Word {
    if bits >= MAX_WORD_BITS {
        Word::MAX
    } else {
        (1 << bits) - 1
    }
}

/// Generator parameters shared by both controllers of one engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct LfsrConfig {
    /// Shift-register width in bits.
    pub state_bits: u8,
    /// Output word width in bits.
    pub output_bits: u8,
    /// Feedback tap positions into the working vector.
    pub taps: Vec<u8>,
    /// State loaded on reset.
    pub seed: Word,
}

impl Default for LfsrConfig {
    fn default() -> Self {
        Self {
            state_bits: DEFAULT_STATE_BITS,
            output_bits: DEFAULT_OUTPUT_BITS,
            taps: DEFAULT_TAPS.to_vec(),
            seed: 0,
        }
    }
}

impl LfsrConfig {
    /// Default taps and state width with a custom output width.
    #[must_use]
    pub fn with_output_bits(output_bits: u8) -> Self {
        Self {
            output_bits,
            ..Self::default()
        }
    }

    /// Width of the working vector the taps index into.
    #[must_use]
    pub fn working_bits(&self) -> u8 {
        self.state_bits.max(self.output_bits)
    }

    /// Checks widths, tap range and seed.
    ///
    /// Duplicate taps are accepted: they cancel in the XOR and shorten the
    /// period, which is the caller's concern.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.state_bits == 0 || self.state_bits > MAX_WORD_BITS {
            return Err(ConfigError::StateWidth {
                bits: self.state_bits,
            });
        }
        if self.output_bits == 0 || self.output_bits > MAX_WORD_BITS {
            return Err(ConfigError::OutputWidth {
                bits: self.output_bits,
            });
        }
        let width = self.working_bits();
        if let Some(&tap) = self.taps.iter().find(|&&tap| tap >= width) {
            return Err(ConfigError::TapOutOfRange { tap, width });
        }
        if self.seed & !word_mask(self.state_bits) != 0 {
            return Err(ConfigError::SeedOutOfRange {
                seed: self.seed,
                bits: self.state_bits,
            });
        }
        let feedback = Feedback::new(self);
        if feedback.shift(self.seed) & word_mask(self.state_bits) == self.seed {
            return Err(ConfigError::LockupSeed { seed: self.seed });
        }
        Ok(())
    }
}

/// Precomputed feedback function for one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Feedback {
    tap_mask: Word,
    working_mask: Word,
    output_bits: u8,
}

impl Feedback {
    fn new(config: &LfsrConfig) -> Self {
        // XOR-accumulate so a repeated tap cancels like in the reduction.
        let tap_mask = config.taps.iter().fold(0, |mask, &tap| {
            let bit: Word = 1 << tap;
            mask ^ bit
        });
        Self {
            tap_mask,
            working_mask: word_mask(config.working_bits()),
            output_bits: config.output_bits,
        }
    }

    /// Runs `output_bits` shift iterations over the zero-extended state.
    fn shift(self, state: Word) -> Word {
        (0..self.output_bits).fold(state, |working, _| {
            let bit = Word::from((working & self.tap_mask).count_ones() & 1 == 0);
            ((working << 1) | bit) & self.working_mask
        })
    }
}

/// Register contents of a generator: shift state and latched output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct LfsrRegisters {
    /// Shift-register state.
    pub state: Word,
    /// Output word presented to the datapath.
    pub output: Word,
}

/// Deterministic pseudo-random word source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceGenerator {
    feedback: Feedback,
    state_mask: Word,
    output_mask: Word,
    seed: Word,
    registers: LfsrRegisters,
}

impl SequenceGenerator {
    /// Builds a generator in its post-reset state.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when `config` fails validation.
    pub fn new(config: &LfsrConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            feedback: Feedback::new(config),
            state_mask: word_mask(config.state_bits),
            output_mask: word_mask(config.output_bits),
            seed: config.seed,
            registers: LfsrRegisters {
                state: config.seed,
                output: 0,
            },
        })
    }

    /// Word currently presented on the output register.
    #[must_use]
    pub const fn output(&self) -> Word {
        self.registers.output
    }

    /// Raw shift-register state.
    #[must_use]
    pub const fn state(&self) -> Word {
        self.registers.state
    }

    /// Snapshot of both registers.
    #[must_use]
    pub const fn registers(&self) -> LfsrRegisters {
        self.registers
    }

    /// Computes the registers one advance ahead without committing them.
    #[must_use]
    pub fn peek_next(&self) -> LfsrRegisters {
        let working = self.feedback.shift(self.registers.state);
        LfsrRegisters {
            state: working & self.state_mask,
            output: working & self.output_mask,
        }
    }

    /// Commits registers computed by [`Self::peek_next`].
    pub const fn load(&mut self, next: LfsrRegisters) {
        self.registers = next;
    }

    /// Advances one step and returns the new output word.
    pub fn advance(&mut self) -> Word {
        let next = self.peek_next();
        self.load(next);
        next.output
    }

    /// Restores the seed state and clears the output register.
    pub const fn reset(&mut self) {
        self.registers = LfsrRegisters {
            state: self.seed,
            output: 0,
        };
    }
}

/// Deferred generator update decided during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorUpdate {
    /// Clock enable low: registers hold.
    Hold,
    /// Load the precomputed next registers.
    Advance(LfsrRegisters),
    /// Reset pulse: reload the seed.
    Reset,
}

impl GeneratorUpdate {
    /// Applies the update to `generator`.
    pub fn apply(self, generator: &mut SequenceGenerator) {
        match self {
            Self::Hold => {}
            Self::Advance(next) => generator.load(next),
            Self::Reset => generator.reset(),
        }
    }

    /// Reset beats advance, advance beats hold.
    #[must_use]
    pub fn plan(generator: &SequenceGenerator, reset: bool, enable: bool) -> Self {
        if reset {
            Self::Reset
        } else if enable {
            Self::Advance(generator.peek_next())
        } else {
            Self::Hold
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rstest::rstest;

    use super::{
        word_mask, GeneratorUpdate, LfsrConfig, SequenceGenerator, Word, DEFAULT_STATE_BITS,
        DEFAULT_TAPS,
    };
    use crate::ConfigError;

    fn config(output_bits: u8, state_bits: u8, taps: &[u8]) -> LfsrConfig {
        LfsrConfig {
            state_bits,
            output_bits,
            taps: taps.to_vec(),
            seed: 0,
        }
    }

    fn words(config: &LfsrConfig, count: usize) -> Vec<Word> {
        let mut generator = SequenceGenerator::new(config).expect("valid config");
        let mut out = vec![generator.output()];
        out.extend((1..count).map(|_| generator.advance()));
        out
    }

    #[test]
    fn tiny_generator_matches_reference_sequence() {
        let seq = words(&config(3, 4, &[3, 2]), 12);
        assert_eq!(seq, vec![0, 7, 3, 1, 2, 0, 7, 3, 1, 2, 0, 7]);
    }

    #[rstest]
    #[case::narrow(16, &[0x0, 0xffff, 0xfff1, 0xffff, 0xff03])]
    #[case::data_path(
        64,
        &[
            0x0,
            0xffff_fff1_ffff_ff03,
            0xffff_f1c7_ffff_000f,
            0xfff1_ff1f_ff03_f03f,
            0xf1c7_1c7f_0000_00f1,
        ]
    )]
    #[case::wide(
        128,
        &[
            0x0,
            0xffff_fff1_ffff_ff03_ffff_f1c7_ffff_000f,
            0xfff1_ff1f_ff03_f03f_f1c7_1c7f_0000_00f1,
            0xffff_f103_ffff_0dc7_fff1_380f_ff0e_0f1f,
        ]
    )]
    fn default_taps_match_reference_words(#[case] output_bits: u8, #[case] expected: &[Word]) {
        let seq = words(&LfsrConfig::with_output_bits(output_bits), expected.len());
        assert_eq!(seq, expected);
    }

    #[test]
    fn output_keeps_state_in_low_bits() {
        let mut generator = SequenceGenerator::new(&LfsrConfig::default()).expect("valid config");
        for _ in 0..32 {
            let out = generator.advance();
            assert_eq!(out & word_mask(DEFAULT_STATE_BITS), generator.state());
        }
    }

    #[test]
    fn no_repeat_within_sixteen_bit_window() {
        let mut generator = SequenceGenerator::new(&LfsrConfig::default()).expect("valid config");
        let seen: HashSet<Word> = (0..1 << 16).map(|_| generator.advance()).collect();
        assert_eq!(seen.len(), 1 << 16);
    }

    #[test]
    fn peek_does_not_commit() {
        let generator = SequenceGenerator::new(&LfsrConfig::default()).expect("valid config");
        let before = generator.registers();
        let next = generator.peek_next();
        assert_ne!(next, before);
        assert_eq!(generator.registers(), before);
    }

    #[test]
    fn reset_returns_to_seed_and_clears_output() {
        let cfg = LfsrConfig {
            seed: 0x1234,
            ..LfsrConfig::default()
        };
        let mut generator = SequenceGenerator::new(&cfg).expect("valid config");
        generator.advance();
        generator.advance();
        generator.reset();
        assert_eq!(generator.state(), 0x1234);
        assert_eq!(generator.output(), 0);
    }

    #[rstest]
    #[case::default_seed(LfsrConfig::default())]
    #[case::seeded(LfsrConfig { seed: 0x1234, ..LfsrConfig::default() })]
    #[case::wide(LfsrConfig::with_output_bits(128))]
    #[case::tiny(config(3, 4, &[3, 2]))]
    fn reset_replays_the_identical_sequence(#[case] cfg: LfsrConfig) {
        let mut generator = SequenceGenerator::new(&cfg).expect("valid config");
        for _ in 0..17 {
            generator.advance();
        }

        generator.reset();
        let first: Vec<Word> = (0..500).map(|_| generator.advance()).collect();
        generator.reset();
        let second: Vec<Word> = (0..500).map(|_| generator.advance()).collect();
        assert_eq!(first, second);

        let mut fresh = SequenceGenerator::new(&cfg).expect("valid config");
        let third: Vec<Word> = (0..500).map(|_| fresh.advance()).collect();
        assert_eq!(first, third);
    }

    #[test]
    fn update_priority_is_reset_then_advance() {
        let mut generator = SequenceGenerator::new(&LfsrConfig::default()).expect("valid config");
        generator.advance();
        let advanced = generator.registers();

        assert_eq!(
            GeneratorUpdate::plan(&generator, true, true),
            GeneratorUpdate::Reset
        );
        assert_eq!(
            GeneratorUpdate::plan(&generator, false, false),
            GeneratorUpdate::Hold
        );

        GeneratorUpdate::plan(&generator, false, false).apply(&mut generator);
        assert_eq!(generator.registers(), advanced);

        GeneratorUpdate::plan(&generator, true, true).apply(&mut generator);
        assert_eq!(generator.state(), 0);
    }

    #[rstest]
    #[case::zero_state(config(64, 0, &[1]), ConfigError::StateWidth { bits: 0 })]
    #[case::oversized_state(config(64, 129, &[1]), ConfigError::StateWidth { bits: 129 })]
    #[case::zero_output(config(0, 31, &[1]), ConfigError::OutputWidth { bits: 0 })]
    #[case::tap_past_working_vector(
        config(16, 31, &[27, 31]),
        ConfigError::TapOutOfRange { tap: 31, width: 31 }
    )]
    fn invalid_configs_are_rejected(#[case] cfg: LfsrConfig, #[case] expected: ConfigError) {
        assert_eq!(cfg.validate(), Err(expected));
        assert_eq!(SequenceGenerator::new(&cfg), Err(expected));
    }

    #[test]
    fn seed_must_fit_state_width() {
        let cfg = LfsrConfig {
            seed: 1 << DEFAULT_STATE_BITS,
            ..LfsrConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::SeedOutOfRange { bits: 31, .. })
        ));
    }

    #[test]
    fn all_ones_seed_locks_up_with_two_taps() {
        let cfg = LfsrConfig {
            seed: word_mask(DEFAULT_STATE_BITS),
            ..LfsrConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::LockupSeed {
                seed: word_mask(DEFAULT_STATE_BITS)
            })
        );
    }

    #[test]
    fn duplicate_taps_are_accepted_but_degenerate() {
        let cfg = config(8, 8, &[3, 3]);
        assert!(cfg.validate().is_ok());
        // Cancelled feedback shifts in ones every iteration.
        assert_eq!(words(&cfg, 3), vec![0, 0xff, 0xff]);
    }

    #[test]
    fn tap_in_zero_padding_is_allowed() {
        let cfg = config(64, DEFAULT_STATE_BITS, &[DEFAULT_TAPS[0], 40]);
        assert!(SequenceGenerator::new(&cfg).is_ok());
    }
}
