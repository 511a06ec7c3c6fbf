//! TWAI register file
//!
//! Every register of the controller is 32 bits wide, only the low byte (or
//! the low bits listed in [`fields`]) is implemented. Register access goes
//! through the [`Registers`] trait so that the protocol logic in
//! [`crate::controller`] does not depend on memory mapped I/O.

pub mod fields;

#[cfg(test)]
pub(crate) mod fake;

use core::marker::PhantomData;
use twai_core::TwaiId;
use vcell::VolatileCell;

/// Number of bytes in the transmit/receive buffer window
pub const BUFFER_LEN: usize = 13;

/// Registers of the TWAI controller
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Mode
    Mode,
    /// Command, write only
    Command,
    /// Status, read only
    Status,
    /// Interrupt status, cleared on read (except the receive interrupt)
    InterruptStatus,
    /// Interrupt enable
    InterruptEnable,
    /// Bus timing 0: prescaler and sync jump width
    BusTiming0,
    /// Bus timing 1: time segments and sampling
    BusTiming1,
    /// Arbitration lost capture
    ArbitrationLostCapture,
    /// Error code capture
    ErrorCodeCapture,
    /// Error warning limit
    ErrorWarningLimit,
    /// Receive error counter
    RxErrorCount,
    /// Transmit error counter
    TxErrorCount,
    /// Byte `n` (0..13) of the transmit/receive buffer window.
    ///
    /// Writes go to the transmit buffer, reads come from the receive buffer.
    Buffer(u8),
    /// Acceptance code byte `n` (0..4). Aliases [`Self::Buffer`] in reset
    /// mode.
    AcceptanceCode(u8),
    /// Acceptance mask byte `n` (0..4). Aliases [`Self::Buffer`] in reset
    /// mode.
    AcceptanceMask(u8),
    /// Receive message counter
    RxMessageCount,
    /// Clock divider (CLKOUT)
    ClockDivider,
}

impl Register {
    /// Byte offset of the register from the start of the register block
    pub const fn offset(self) -> usize {
        match self {
            Register::Mode => 0x00,
            Register::Command => 0x04,
            Register::Status => 0x08,
            Register::InterruptStatus => 0x0c,
            Register::InterruptEnable => 0x10,
            Register::BusTiming0 => 0x18,
            Register::BusTiming1 => 0x1c,
            Register::ArbitrationLostCapture => 0x2c,
            Register::ErrorCodeCapture => 0x30,
            Register::ErrorWarningLimit => 0x34,
            Register::RxErrorCount => 0x38,
            Register::TxErrorCount => 0x3c,
            Register::Buffer(n) => 0x40 + 4 * n as usize,
            Register::AcceptanceCode(n) => 0x40 + 4 * n as usize,
            Register::AcceptanceMask(n) => 0x50 + 4 * n as usize,
            Register::RxMessageCount => 0x74,
            Register::ClockDivider => 0x7c,
        }
    }
}

/// Access to the registers of one TWAI instance.
///
/// Reads may have side effects (interrupt status, error code capture and
/// arbitration lost capture are cleared or re-armed by reading), hence the
/// protocol code reads each register exactly as often as the hardware
/// contract requires.
pub trait Registers {
    /// Peripheral instance the registers belong to
    type Id: TwaiId;

    /// Read the raw value of `reg`
    fn read(&self, reg: Register) -> u32;

    /// Write the raw `value` to `reg` in a single access
    fn write(&self, reg: Register, value: u32);

    /// Read-modify-write `reg`
    fn modify<F: FnOnce(u32) -> u32>(&self, reg: Register, f: F) {
        let value = self.read(reg);
        self.write(reg, f(value));
    }
}

impl<T: Registers> Registers for &T {
    type Id = T::Id;

    fn read(&self, reg: Register) -> u32 {
        T::read(self, reg)
    }

    fn write(&self, reg: Register, value: u32) {
        T::write(self, reg, value)
    }
}

/// Memory layout of the TWAI register block
#[repr(C)]
pub struct RegisterBlock {
    /// 0x00
    pub mode: VolatileCell<u32>,
    /// 0x04
    pub cmd: VolatileCell<u32>,
    /// 0x08
    pub status: VolatileCell<u32>,
    /// 0x0c
    pub interrupt_st: VolatileCell<u32>,
    /// 0x10
    pub interrupt_ena: VolatileCell<u32>,
    _reserved_14: VolatileCell<u32>,
    /// 0x18
    pub bus_timing_0: VolatileCell<u32>,
    /// 0x1c
    pub bus_timing_1: VolatileCell<u32>,
    _reserved_20: [VolatileCell<u32>; 3],
    /// 0x2c
    pub arb_lost_cap: VolatileCell<u32>,
    /// 0x30
    pub err_code_cap: VolatileCell<u32>,
    /// 0x34
    pub err_warning_limit: VolatileCell<u32>,
    /// 0x38
    pub rx_err_cnt: VolatileCell<u32>,
    /// 0x3c
    pub tx_err_cnt: VolatileCell<u32>,
    /// Transmit/receive buffer in operating mode, acceptance filter
    /// (4 code bytes followed by 4 mask bytes) in reset mode.
    pub tx_rx_buffer: [VolatileCell<u32>; BUFFER_LEN],
    /// 0x74
    pub rx_message_counter: VolatileCell<u32>,
    _reserved_78: VolatileCell<u32>,
    /// 0x7c
    pub clock_divider: VolatileCell<u32>,
}

impl RegisterBlock {
    fn cell(&self, reg: Register) -> &VolatileCell<u32> {
        match reg {
            Register::Mode => &self.mode,
            Register::Command => &self.cmd,
            Register::Status => &self.status,
            Register::InterruptStatus => &self.interrupt_st,
            Register::InterruptEnable => &self.interrupt_ena,
            Register::BusTiming0 => &self.bus_timing_0,
            Register::BusTiming1 => &self.bus_timing_1,
            Register::ArbitrationLostCapture => &self.arb_lost_cap,
            Register::ErrorCodeCapture => &self.err_code_cap,
            Register::ErrorWarningLimit => &self.err_warning_limit,
            Register::RxErrorCount => &self.rx_err_cnt,
            Register::TxErrorCount => &self.tx_err_cnt,
            Register::Buffer(n) | Register::AcceptanceCode(n) => &self.tx_rx_buffer[n as usize],
            Register::AcceptanceMask(n) => &self.tx_rx_buffer[4 + n as usize],
            Register::RxMessageCount => &self.rx_message_counter,
            Register::ClockDivider => &self.clock_divider,
        }
    }
}

/// Memory mapped registers of the peripheral identified by `Id`
pub struct Mmio<Id> {
    _id: PhantomData<Id>,
}

impl<Id: TwaiId> Mmio<Id> {
    /// # Safety
    /// The caller must be the sole owner of the register block of `Id`. Do
    /// not keep multiple instances for the same peripheral.
    pub unsafe fn new() -> Self {
        Self { _id: PhantomData }
    }

    fn block(&self) -> &RegisterBlock {
        // Safety: `TwaiId::ADDRESS` points to a valid register block and
        // `Self` owns it.
        unsafe { &*(Id::ADDRESS as *const RegisterBlock) }
    }
}

impl<Id: TwaiId> Registers for Mmio<Id> {
    type Id = Id;

    fn read(&self, reg: Register) -> u32 {
        self.block().cell(reg).get()
    }

    fn write(&self, reg: Register, value: u32) {
        self.block().cell(reg).set(value)
    }
}
