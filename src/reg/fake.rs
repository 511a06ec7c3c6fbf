//! Recording stand-in for the TWAI register block, used by unit tests.
//!
//! Emulates the side effects the driver relies on: read-to-clear interrupt
//! flags (except the receive interrupt), the receive FIFO rotating on buffer
//! release, re-arming captures on read and the reset-mode aliasing of the
//! acceptance filter onto the buffer window.
#![allow(dead_code)]
extern crate std;

use super::{Register, Registers, BUFFER_LEN};
use core::cell::RefCell;
use std::collections::VecDeque;
use std::vec::Vec;

pub(crate) enum FakeId {}

// Safety: never dereferenced, `FakeTwai` stands in for the register block.
unsafe impl twai_core::TwaiId for FakeId {
    const ADDRESS: *const () = 0xdead_0000 as *const _;
}

pub(crate) struct FakeDependencies;

// Safety: no real peripheral behind `FakeId`.
unsafe impl twai_core::Dependencies<FakeId> for FakeDependencies {
    fn source_clock(&self) -> fugit::HertzU32 {
        fugit::HertzU32::MHz(40)
    }
}

const RI: u32 = 1 << 0;
const RBS: u32 = 1 << 0;
const DOS: u32 = 1 << 1;
const TBS: u32 = 1 << 2;
const ES: u32 = 1 << 6;
const BS: u32 = 1 << 7;

#[derive(Default)]
pub(crate) struct State {
    regs: [u32; 32],
    /// Every write, in order
    pub writes: Vec<(Register, u32)>,
    /// Frames waiting in the receive FIFO
    pub rx_fifo: VecDeque<[u8; BUFFER_LEN]>,
    /// Contents of the transmit buffer at each transmit-family command
    pub transmitted: Vec<[u8; BUFFER_LEN]>,
    /// Latched interrupt flags
    pub pending: u32,
    pub error_capture_reads: usize,
    pub arbitration_lost_reads: usize,
}

pub(crate) struct FakeTwai {
    pub state: RefCell<State>,
}

impl FakeTwai {
    /// Controller right after reset: in reset mode, transmit buffer free.
    pub fn new() -> Self {
        let mut state = State::default();
        state.regs[Register::Mode.offset() / 4] = 0x1;
        state.regs[Register::Status.offset() / 4] = TBS;
        Self {
            state: RefCell::new(state),
        }
    }

    pub fn raw(&self, reg: Register) -> u32 {
        self.state.borrow().regs[reg.offset() / 4]
    }

    pub fn set_raw(&self, reg: Register, value: u32) {
        self.state.borrow_mut().regs[reg.offset() / 4] = value;
    }

    pub fn writes(&self) -> Vec<(Register, u32)> {
        self.state.borrow().writes.clone()
    }

    pub fn writes_to(&self, reg: Register) -> Vec<u32> {
        self.state
            .borrow()
            .writes
            .iter()
            .filter(|(r, _)| *r == reg)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn clear_writes(&self) {
        self.state.borrow_mut().writes.clear();
    }

    pub fn transmitted(&self) -> Vec<[u8; BUFFER_LEN]> {
        self.state.borrow().transmitted.clone()
    }

    /// A frame arrives and raises the receive interrupt.
    pub fn push_rx(&self, frame: [u8; BUFFER_LEN]) {
        let mut state = self.state.borrow_mut();
        state.rx_fifo.push_back(frame);
        state.pending |= RI;
    }

    /// Latch interrupt flags.
    pub fn raise(&self, interrupts: u32) {
        self.state.borrow_mut().pending |= interrupts;
    }

    pub fn set_status_bits(&self, bits: u32) {
        let mut state = self.state.borrow_mut();
        state.regs[Register::Status.offset() / 4] |= bits;
    }

    pub fn clear_status_bits(&self, bits: u32) {
        let mut state = self.state.borrow_mut();
        state.regs[Register::Status.offset() / 4] &= !bits;
    }

    /// Hardware reaction to bus-off: reset mode, counters forced.
    pub fn bus_off(&self) {
        let mut state = self.state.borrow_mut();
        state.regs[Register::Mode.offset() / 4] |= 0x1;
        state.regs[Register::Status.offset() / 4] |= BS | ES;
        state.regs[Register::TxErrorCount.offset() / 4] = 128;
        state.regs[Register::RxErrorCount.offset() / 4] = 0;
    }

    fn in_reset_mode(state: &State) -> bool {
        state.regs[Register::Mode.offset() / 4] & 0x1 != 0
    }
}

impl Registers for FakeTwai {
    type Id = FakeId;

    fn read(&self, reg: Register) -> u32 {
        let mut state = self.state.borrow_mut();
        match reg {
            Register::Command => 0,
            Register::Status => {
                let status = state.regs[reg.offset() / 4] & !RBS;
                if state.rx_fifo.is_empty() {
                    status
                } else {
                    status | RBS
                }
            }
            Register::InterruptStatus => {
                let flags = state.pending;
                state.pending &= RI;
                flags
            }
            Register::ErrorCodeCapture => {
                state.error_capture_reads += 1;
                state.regs[reg.offset() / 4]
            }
            Register::ArbitrationLostCapture => {
                state.arbitration_lost_reads += 1;
                state.regs[reg.offset() / 4]
            }
            Register::Buffer(n) if !Self::in_reset_mode(&state) => state
                .rx_fifo
                .front()
                .map(|frame| frame[n as usize] as u32)
                .unwrap_or(0),
            Register::RxMessageCount => state.rx_fifo.len() as u32,
            _ => state.regs[reg.offset() / 4],
        }
    }

    fn write(&self, reg: Register, value: u32) {
        let mut state = self.state.borrow_mut();
        state.writes.push((reg, value));
        match reg {
            Register::Command => {
                if value & (1 << 2) != 0 {
                    state.rx_fifo.pop_front();
                    if state.rx_fifo.is_empty() {
                        state.pending &= !RI;
                    }
                }
                if value & (1 << 3) != 0 {
                    state.regs[Register::Status.offset() / 4] &= !DOS;
                }
                if value & ((1 << 0) | (1 << 4)) != 0 {
                    let mut frame = [0; BUFFER_LEN];
                    for (i, byte) in frame.iter_mut().enumerate() {
                        *byte = state.regs[Register::Buffer(i as u8).offset() / 4] as u8;
                    }
                    state.transmitted.push(frame);
                }
            }
            Register::Status | Register::InterruptStatus => {}
            _ => state.regs[reg.offset() / 4] = value,
        }
    }
}
