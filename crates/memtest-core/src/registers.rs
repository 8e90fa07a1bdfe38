//! Host-visible control/status register file.

use crate::api::{CsrBus, CsrWriteResult};
use crate::CsrError;

/// Identifier reported by `MAGIC` so a host can confirm the engine mapping.
pub const MEMTEST_MAGIC: u16 = 0x361f;

/// Default width of the burst-length and error-count registers.
pub const DEFAULT_ADDRESS_WIDTH: u8 = 24;

/// Widest supported address-sized register.
pub const MAX_ADDRESS_WIDTH: u8 = 64;

/// Offset of the read-only `MAGIC` register.
pub const CSR_MAGIC_OFFSET: u16 = 0x00;
/// Offset of the write-pulse `WRITER_RESET` register.
pub const CSR_WRITER_RESET_OFFSET: u16 = 0x01;
/// Offset of the write-pulse `WRITER_SHOOT` register.
pub const CSR_WRITER_SHOOT_OFFSET: u16 = 0x02;
/// Offset of the read/write `BURST_LENGTH` register.
pub const CSR_BURST_LENGTH_OFFSET: u16 = 0x03;
/// Offset of the write-pulse `READER_RESET` register.
pub const CSR_READER_RESET_OFFSET: u16 = 0x04;
/// Offset of the read-only `ERROR_COUNT` register.
pub const CSR_ERROR_COUNT_OFFSET: u16 = 0x05;

/// Returns a mask with the low `bits` bits set, for address-sized registers.
#[must_use]
pub const fn address_mask(bits: u8) -> u64 {
    if bits >= MAX_ADDRESS_WIDTH {
        u64::MAX
    } else {
        (1 << bits) - 1
    }
}

/// Host access class of a control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CsrAccess {
    /// Reads return engine state; writes are suppressed.
    ReadOnly,
    /// Writes raise a one-step pulse; reads return zero.
    WritePulse,
    /// Plain storage.
    ReadWrite,
}

/// Control register identifiers in address order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CsrRegister {
    /// Engine identifier, always [`MEMTEST_MAGIC`].
    Magic,
    /// Resets the write-side generator.
    WriterReset,
    /// Loads words-remaining from `BURST_LENGTH`.
    WriterShoot,
    /// Words per triggered burst.
    BurstLength,
    /// Resets the read-side generator and clears `ERROR_COUNT`.
    ReaderReset,
    /// Cumulative read-back mismatches.
    ErrorCount,
}

impl CsrRegister {
    /// Every register in ascending offset order.
    pub const ALL: [Self; 6] = [
        Self::Magic,
        Self::WriterReset,
        Self::WriterShoot,
        Self::BurstLength,
        Self::ReaderReset,
        Self::ErrorCount,
    ];

    /// Bus offset of the register.
    #[must_use]
    pub const fn offset(self) -> u16 {
        match self {
            Self::Magic => CSR_MAGIC_OFFSET,
            Self::WriterReset => CSR_WRITER_RESET_OFFSET,
            Self::WriterShoot => CSR_WRITER_SHOOT_OFFSET,
            Self::BurstLength => CSR_BURST_LENGTH_OFFSET,
            Self::ReaderReset => CSR_READER_RESET_OFFSET,
            Self::ErrorCount => CSR_ERROR_COUNT_OFFSET,
        }
    }

    /// Decodes a bus offset.
    #[must_use]
    pub const fn from_offset(offset: u16) -> Option<Self> {
        match offset {
            CSR_MAGIC_OFFSET => Some(Self::Magic),
            CSR_WRITER_RESET_OFFSET => Some(Self::WriterReset),
            CSR_WRITER_SHOOT_OFFSET => Some(Self::WriterShoot),
            CSR_BURST_LENGTH_OFFSET => Some(Self::BurstLength),
            CSR_READER_RESET_OFFSET => Some(Self::ReaderReset),
            CSR_ERROR_COUNT_OFFSET => Some(Self::ErrorCount),
            _ => None,
        }
    }

    /// Host access class.
    #[must_use]
    pub const fn access(self) -> CsrAccess {
        match self {
            Self::Magic | Self::ErrorCount => CsrAccess::ReadOnly,
            Self::WriterReset | Self::WriterShoot | Self::ReaderReset => CsrAccess::WritePulse,
            Self::BurstLength => CsrAccess::ReadWrite,
        }
    }

    /// Register width in bits for a given address width.
    #[must_use]
    pub const fn width(self, address_width: u8) -> u8 {
        match self {
            Self::Magic => 16,
            Self::WriterReset | Self::WriterShoot | Self::ReaderReset => 1,
            Self::BurstLength | Self::ErrorCount => address_width,
        }
    }
}

/// Write pulses raised for exactly one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Pulses {
    /// `WRITER_RESET` was written.
    pub writer_reset: bool,
    /// `WRITER_SHOOT` was written.
    pub writer_shoot: bool,
    /// `READER_RESET` was written.
    pub reader_reset: bool,
}

impl Pulses {
    /// Returns `true` when no pulse is raised.
    #[must_use]
    pub const fn is_idle(self) -> bool {
        !(self.writer_reset || self.writer_shoot || self.reader_reset)
    }
}

/// Address-width mismatch counter that wraps like the hardware register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ErrorCounter {
    value: u64,
    mask: u64,
}

impl ErrorCounter {
    /// Creates a zeroed counter `width` bits wide.
    #[must_use]
    pub const fn new(width: u8) -> Self {
        Self {
            value: 0,
            mask: address_mask(width),
        }
    }

    /// Current count.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.value
    }

    /// Count after one more mismatch, wrapping at the register width.
    #[must_use]
    pub const fn incremented(self) -> u64 {
        self.value.wrapping_add(1) & self.mask
    }

    /// Stores a count computed during evaluation.
    pub const fn load(&mut self, value: u64) {
        self.value = value & self.mask;
    }

    /// Records one mismatch.
    pub const fn increment(&mut self) {
        self.value = self.incremented();
    }

    /// Zeroes the count.
    pub const fn clear(&mut self) {
        self.value = 0;
    }
}

/// Control/status registers owned by one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRegisters {
    address_width: u8,
    burst_length: u64,
    error_count: ErrorCounter,
    pending: Pulses,
}

impl ControlRegisters {
    /// Creates the register file for `address_width`-bit address registers.
    #[must_use]
    pub const fn new(address_width: u8) -> Self {
        Self {
            address_width,
            burst_length: 0,
            error_count: ErrorCounter::new(address_width),
            pending: Pulses {
                writer_reset: false,
                writer_shoot: false,
                reader_reset: false,
            },
        }
    }

    /// Width of `BURST_LENGTH` and `ERROR_COUNT`.
    #[must_use]
    pub const fn address_width(&self) -> u8 {
        self.address_width
    }

    /// Engine identifier.
    #[must_use]
    pub const fn magic(&self) -> u16 {
        MEMTEST_MAGIC
    }

    /// Words loaded by the next trigger.
    #[must_use]
    pub const fn burst_length(&self) -> u64 {
        self.burst_length
    }

    /// Stores a burst length, truncated to the address width.
    pub const fn set_burst_length(&mut self, value: u64) {
        self.burst_length = value & address_mask(self.address_width);
    }

    /// Cumulative mismatch count.
    #[must_use]
    pub const fn error_count(&self) -> u64 {
        self.error_count.value()
    }

    /// Counter handle for the read controller.
    #[must_use]
    pub const fn error_counter(&self) -> ErrorCounter {
        self.error_count
    }

    pub(crate) const fn error_counter_mut(&mut self) -> &mut ErrorCounter {
        &mut self.error_count
    }

    /// Pulses that the next step will observe.
    #[must_use]
    pub const fn pending_pulses(&self) -> Pulses {
        self.pending
    }

    /// Stages a write-side generator reset for the next step.
    pub const fn pulse_writer_reset(&mut self) {
        self.pending.writer_reset = true;
    }

    /// Stages a trigger for the next step.
    pub const fn pulse_writer_shoot(&mut self) {
        self.pending.writer_shoot = true;
    }

    /// Stages a read-side reset for the next step.
    pub const fn pulse_reader_reset(&mut self) {
        self.pending.reader_reset = true;
    }

    /// Hands the staged pulses to the current step, leaving none behind.
    pub fn take_pulses(&mut self) -> Pulses {
        std::mem::take(&mut self.pending)
    }

    /// Reads a register by identifier.
    #[must_use]
    pub const fn read(&self, register: CsrRegister) -> u64 {
        match register {
            CsrRegister::Magic => MEMTEST_MAGIC as u64,
            CsrRegister::BurstLength => self.burst_length,
            CsrRegister::ErrorCount => self.error_count.value(),
            CsrRegister::WriterReset | CsrRegister::WriterShoot | CsrRegister::ReaderReset => 0,
        }
    }

    /// Writes a register by identifier.
    pub const fn write(&mut self, register: CsrRegister, value: u64) -> CsrWriteResult {
        match register {
            CsrRegister::Magic | CsrRegister::ErrorCount => {
                return CsrWriteResult::DeniedSuppressed;
            }
            CsrRegister::WriterReset => self.pulse_writer_reset(),
            CsrRegister::WriterShoot => self.pulse_writer_shoot(),
            CsrRegister::ReaderReset => self.pulse_reader_reset(),
            CsrRegister::BurstLength => self.set_burst_length(value),
        }
        CsrWriteResult::Applied
    }
}

impl CsrBus for ControlRegisters {
    fn read_csr(&mut self, offset: u16) -> Result<u64, CsrError> {
        CsrRegister::from_offset(offset)
            .map(|register| self.read(register))
            .ok_or(CsrError::Unmapped { offset })
    }

    fn write_csr(&mut self, offset: u16, value: u64) -> Result<CsrWriteResult, CsrError> {
        let register = CsrRegister::from_offset(offset).ok_or(CsrError::Unmapped { offset })?;
        Ok(self.write(register, value))
    }
}
