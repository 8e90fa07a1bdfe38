use thiserror::Error;

use crate::RunBoundary;

/// Configuration rejected at engine or generator construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ConfigError {
    /// Shift-register width outside `1..=128`.
    #[error("generator state width {bits} is outside 1..=128")]
    StateWidth {
        /// Rejected width in bits.
        bits: u8,
    },
    /// Output word width outside `1..=128`.
    #[error("generator output width {bits} is outside 1..=128")]
    OutputWidth {
        /// Rejected width in bits.
        bits: u8,
    },
    /// Feedback tap does not index into the working vector.
    #[error("tap {tap} is outside the {width}-bit working vector")]
    TapOutOfRange {
        /// Offending tap position.
        tap: u8,
        /// Working vector width (`max(state_bits, output_bits)`).
        width: u8,
    },
    /// Seed has bits set above the shift-register width.
    #[error("seed {seed:#x} does not fit in {bits} state bits")]
    SeedOutOfRange {
        /// Rejected seed value.
        seed: u128,
        /// Configured state width.
        bits: u8,
    },
    /// Seed maps onto itself under the feedback function.
    #[error("seed {seed:#x} is a lock-up state for the configured taps")]
    LockupSeed {
        /// Rejected seed value.
        seed: u128,
    },
    /// Register address width outside `1..=64`.
    #[error("address width {bits} is outside 1..=64")]
    AddressWidth {
        /// Rejected width in bits.
        bits: u8,
    },
}

/// Register-bus transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum CsrError {
    /// No register is decoded at the offset.
    #[error("no control register mapped at offset {offset:#04x}")]
    Unmapped {
        /// Offset presented on the bus.
        offset: u16,
    },
}

/// Failure of a bounded run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum RunError {
    /// The step budget ran out before the boundary was observed.
    #[error("step budget of {steps} exhausted before reaching {boundary:?}")]
    StepBudgetExhausted {
        /// Steps executed before giving up.
        steps: u64,
        /// Boundary that was never reached.
        boundary: RunBoundary,
    },
}
