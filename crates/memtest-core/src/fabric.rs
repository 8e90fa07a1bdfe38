//! Reference memory fabric for driving the engine without real hardware.
//!
//! Models a word-addressed store behind an external-mode write DMA (accepted
//! words land at consecutive addresses from a base) and a single-shot read
//! DMA (`start_read` streams a range back). Backpressure and read gaps follow
//! fixed [`Throttle`] patterns; injected bit flips corrupt words on read-back.

use std::collections::VecDeque;

use crate::api::{MemoryFabric, StepOutputs};
use crate::{ReadBeat, ReadState, Word};

/// Periodic stall pattern: the first `stalled` cycles of every `period` are
/// blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Throttle {
    /// Pattern length in cycles; zero disables throttling.
    pub period: u32,
    /// Blocked cycles at the start of each period.
    pub stalled: u32,
}

impl Throttle {
    /// Never blocks.
    pub const NONE: Self = Self {
        period: 0,
        stalled: 0,
    };

    /// Returns `true` when `cycle` falls in a blocked slot.
    #[must_use]
    pub const fn blocks(self, cycle: u64) -> bool {
        if self.period == 0 {
            return false;
        }
        let period = self.period as u64;
        let stalled = self.stalled as u64;
        cycle % period < stalled
    }
}

/// Single-bit fault applied when a word is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BitFlip {
    /// Word address.
    pub address: usize,
    /// Bit index within the word.
    pub bit: u8,
}

/// Word-addressed memory with streaming write and read ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimMemory {
    words: Vec<Word>,
    write_cursor: usize,
    pending_reads: VecDeque<usize>,
    write_throttle: Throttle,
    read_throttle: Throttle,
    flips: Vec<BitFlip>,
    cycle: u64,
    presented: bool,
}

impl SimMemory {
    /// Creates a zeroed memory of `capacity` words (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.max(1)],
            write_cursor: 0,
            pending_reads: VecDeque::new(),
            write_throttle: Throttle::NONE,
            read_throttle: Throttle::NONE,
            flips: Vec::new(),
            cycle: 0,
            presented: false,
        }
    }

    /// Sets the write-side backpressure pattern.
    #[must_use]
    pub const fn with_write_throttle(mut self, throttle: Throttle) -> Self {
        self.write_throttle = throttle;
        self
    }

    /// Sets the read-side gap pattern.
    #[must_use]
    pub const fn with_read_throttle(mut self, throttle: Throttle) -> Self {
        self.read_throttle = throttle;
        self
    }

    /// Capacity in words.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    /// Stored words, without injected faults.
    #[must_use]
    pub fn contents(&self) -> &[Word] {
        &self.words
    }

    /// Cycles observed through [`MemoryFabric::complete`].
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Points the write port at `base`; accepted words fill upward from it.
    pub fn start_write(&mut self, base: usize) {
        self.write_cursor = base % self.words.len();
    }

    /// Queues a single-shot read of `length` words starting at `base`.
    pub fn start_read(&mut self, base: usize, length: usize) {
        let capacity = self.words.len();
        self.pending_reads
            .extend((0..length).map(|offset| (base + offset) % capacity));
    }

    /// Corrupts `bit` of the word at `address` whenever it is read back.
    pub fn inject_bit_flip(&mut self, flip: BitFlip) {
        self.flips.push(flip);
    }

    /// Word at `address` as the read port returns it.
    ///
    /// Flips at bit 128 or above fall outside every word and have no effect.
    #[must_use]
    pub fn read_back(&self, address: usize) -> Word {
        let address = address % self.words.len();
        self.flips
            .iter()
            .filter(|flip| flip.address % self.words.len() == address)
            .fold(self.words[address], |word, flip| {
                let mask = Word::checked_shl(1, u32::from(flip.bit)).unwrap_or(0);
                word ^ mask
            })
    }
}

impl MemoryFabric for SimMemory {
    fn write_ready(&mut self) -> bool {
        !self.write_throttle.blocks(self.cycle)
    }

    fn read_beat(&mut self) -> ReadBeat {
        self.presented = false;
        if self.read_throttle.blocks(self.cycle) {
            return ReadBeat::IDLE;
        }
        match self.pending_reads.front() {
            Some(&address) => {
                self.presented = true;
                ReadBeat::word(self.read_back(address))
            }
            None => ReadBeat::IDLE,
        }
    }

    fn complete(&mut self, outputs: &StepOutputs) {
        if let Some(word) = outputs.written_word() {
            self.words[self.write_cursor] = word;
            self.write_cursor = (self.write_cursor + 1) % self.words.len();
        }
        if self.presented && outputs.read_ready && outputs.read_state == ReadState::Compare {
            self.pending_reads.pop_front();
        }
        self.presented = false;
        self.cycle += 1;
    }

    fn read_idle(&self) -> bool {
        self.pending_reads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{BitFlip, SimMemory, Throttle};
    use crate::api::{MemoryFabric, StepOutputs};
    use crate::{ReadState, WriteBeat};

    fn write_step(data: u128, accepted: bool) -> StepOutputs {
        StepOutputs {
            write: WriteBeat { strobe: true, data },
            write_accepted: accepted,
            read_ready: true,
            read_state: ReadState::Idle,
            mismatch: false,
        }
    }

    #[test]
    fn throttle_blocks_leading_slots_of_each_period() {
        let throttle = Throttle {
            period: 4,
            stalled: 1,
        };
        let pattern: Vec<bool> = (0..8).map(|cycle| throttle.blocks(cycle)).collect();
        assert_eq!(
            pattern,
            vec![true, false, false, false, true, false, false, false]
        );
        assert!(!Throttle::NONE.blocks(0));
    }

    #[test]
    fn accepted_words_fill_from_base_and_wrap() {
        let mut memory = SimMemory::new(4);
        memory.start_write(2);
        for (data, accepted) in [(1, true), (2, false), (3, true), (4, true)] {
            memory.complete(&write_step(data, accepted));
        }
        assert_eq!(memory.contents(), &[4, 0, 1, 3][..]);
        assert_eq!(memory.cycle(), 4);
    }

    #[test]
    fn read_back_applies_flips() {
        let mut memory = SimMemory::new(8);
        memory.start_write(0);
        memory.complete(&write_step(0b1000, true));
        memory.inject_bit_flip(BitFlip { address: 0, bit: 0 });
        memory.inject_bit_flip(BitFlip { address: 8, bit: 3 });
        assert_eq!(memory.read_back(0), 0b0001);
        assert_eq!(memory.contents()[0], 0b1000);
    }

    #[test]
    fn flips_beyond_the_word_do_not_wrap() {
        let mut memory = SimMemory::new(2);
        memory.inject_bit_flip(BitFlip {
            address: 1,
            bit: 128,
        });
        memory.inject_bit_flip(BitFlip {
            address: 1,
            bit: 200,
        });
        assert_eq!(memory.read_back(1), 0);

        memory.inject_bit_flip(BitFlip {
            address: 1,
            bit: 127,
        });
        assert_eq!(memory.read_back(1), 1 << 127);
    }

    #[test]
    fn read_port_streams_range_then_goes_idle() {
        let mut memory = SimMemory::new(4);
        memory.start_write(0);
        for data in [10, 11, 12] {
            memory.complete(&write_step(data, true));
        }
        memory.start_read(1, 2);
        assert!(!memory.read_idle());

        let mut seen = Vec::new();
        while !memory.read_idle() {
            let beat = memory.read_beat();
            assert!(beat.valid);
            seen.push(beat.data);
            memory.complete(&StepOutputs {
                write: WriteBeat::IDLE,
                write_accepted: false,
                read_ready: true,
                read_state: ReadState::Compare,
                mismatch: false,
            });
        }
        assert_eq!(seen, vec![11, 12]);
        assert!(!memory.read_beat().valid);
    }

    #[test]
    fn read_gaps_withhold_valid() {
        let mut memory = SimMemory::new(2).with_read_throttle(Throttle {
            period: 2,
            stalled: 1,
        });
        memory.start_read(0, 1);
        assert!(!memory.read_beat().valid);
        memory.complete(&write_step(0, false));
        assert!(memory.read_beat().valid);
    }
}
