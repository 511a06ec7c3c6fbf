//! Register-level operations of the TWAI controller
//!
//! [`Controller`] is a thin layer over [`Registers`]: every method maps to a
//! documented register access pattern and nothing is cached. Operations that
//! the hardware only accepts in reset mode are marked as such; calling them
//! in operating mode trips a debug assertion and is otherwise ignored by the
//! hardware. The typestate in [`crate::bus`] upholds these preconditions.

use crate::filter::{AcceptanceFilter, FilterMode};
use crate::interrupt::InterruptSet;
use crate::message::{FrameBuffer, FrameFlags};
use crate::reg::fields::{BusTiming0Reg, BusTiming1Reg, ByteReg, ClockDividerReg, CommandReg, ModeReg};
use crate::reg::{Register, Registers, BUFFER_LEN};
use crate::status::{ErrorCapture, ErrorCounters, StatusSet};

/// One of the transmit-family commands
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransmitCommand {
    /// Transmit, retransmitting on errors or lost arbitration
    Transmit,
    /// Transmit once
    SingleShot,
    /// Transmit and receive the frame simultaneously
    SelfReception,
    /// Transmit once and receive the frame simultaneously
    SelfReceptionSingleShot,
}

impl TransmitCommand {
    /// Command implied by the transmit flags of a frame
    pub fn for_flags(flags: FrameFlags) -> Self {
        match (flags.self_reception(), flags.single_shot()) {
            (false, false) => Self::Transmit,
            (false, true) => Self::SingleShot,
            (true, false) => Self::SelfReception,
            (true, true) => Self::SelfReceptionSingleShot,
        }
    }

    fn reg(self) -> CommandReg {
        let mut cmd = CommandReg::default();
        match self {
            Self::Transmit => cmd.set_tx_request(true),
            Self::SingleShot => {
                // Single shot is a transmission request with an abort queued
                // behind it
                cmd.set_tx_request(true);
                cmd.set_abort_tx(true);
            }
            Self::SelfReception => cmd.set_self_rx_request(true),
            Self::SelfReceptionSingleShot => {
                cmd.set_self_rx_request(true);
                cmd.set_abort_tx(true);
            }
        }
        cmd
    }
}

/// Commands to issue together
///
/// [`Controller::issue`] writes the buffer and abort commands in one access
/// and the transmit command in a second access after it.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Commands {
    /// Abort a pending transmission
    pub abort_transmit: bool,
    /// Release the receive buffer
    pub release_receive_buffer: bool,
    /// Clear the data overrun status
    pub clear_data_overrun: bool,
    /// Start a transmission
    pub transmit: Option<TransmitCommand>,
}

impl Commands {
    fn non_transmit_reg(&self) -> CommandReg {
        let mut cmd = CommandReg::default();
        cmd.set_abort_tx(self.abort_transmit);
        cmd.set_release_buffer(self.release_receive_buffer);
        cmd.set_clear_data_overrun(self.clear_data_overrun);
        cmd
    }
}

/// Register-level driver of one TWAI controller
pub struct Controller<R> {
    regs: R,
}

impl<R: Registers> Controller<R> {
    /// Take control of the registers
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Give up control of the registers
    pub fn free(self) -> R {
        self.regs
    }

    /// Raw access to the registers
    pub fn registers(&self) -> &R {
        &self.regs
    }

    fn mode(&self) -> ModeReg {
        self.regs.read(Register::Mode).into()
    }

    fn debug_assert_reset_mode(&self) {
        debug_assert!(
            self.is_in_reset_mode(),
            "register is only writable in reset mode"
        );
    }

    // Mode

    /// Disconnect from the bus. Always allowed.
    pub fn enter_reset_mode(&mut self) {
        self.regs.modify(Register::Mode, |v| {
            let mut mode = ModeReg::from(v);
            mode.set_reset_mode(true);
            mode.into()
        });
    }

    /// Connect to the bus with the current configuration.
    ///
    /// After a bus-off, the controller starts the recovery sequence instead
    /// and only joins the bus after 128 occurrences of 11 recessive bits.
    pub fn exit_reset_mode(&mut self) {
        self.regs.modify(Register::Mode, |v| {
            let mut mode = ModeReg::from(v);
            mode.set_reset_mode(false);
            mode.into()
        });
    }

    /// The controller is in reset mode, either requested or forced by bus-off
    pub fn is_in_reset_mode(&self) -> bool {
        self.mode().reset_mode()
    }

    /// Select the operating sub-mode. Reset mode only.
    pub fn set_mode(&mut self, listen_only: bool, no_ack: bool) {
        self.debug_assert_reset_mode();
        self.regs.modify(Register::Mode, |v| {
            let mut mode = ModeReg::from(v);
            mode.set_listen_only_mode(listen_only);
            mode.set_self_test_mode(no_ack);
            mode.into()
        });
    }

    // Timing

    /// Program the bus timing registers. Reset mode only.
    ///
    /// Values are encoded without validation: out of range values wrap and
    /// are truncated to the width of their register field. Use
    /// [`TimingConfig::check`](crate::config::TimingConfig::check) first.
    pub fn set_bus_timing(
        &mut self,
        prescaler: u32,
        sjw: u8,
        tseg_1: u8,
        tseg_2: u8,
        triple_sampling: bool,
    ) {
        self.debug_assert_reset_mode();
        let mut bt0 = BusTiming0Reg::default();
        bt0.set_baud_presc((prescaler / 2).wrapping_sub(1) as u16);
        bt0.set_sync_jump_width(sjw.wrapping_sub(1));
        let mut bt1 = BusTiming1Reg::default();
        bt1.set_time_segment1(tseg_1.wrapping_sub(1));
        bt1.set_time_segment2(tseg_2.wrapping_sub(1));
        bt1.set_time_sampling(triple_sampling);
        self.regs.write(Register::BusTiming0, bt0.into());
        self.regs.write(Register::BusTiming1, bt1.into());
    }

    // Filter

    /// Program the acceptance filter. Reset mode only.
    ///
    /// Code and mask are given MSB first, see [`AcceptanceFilter`].
    pub fn set_acceptance_filter(&mut self, code: u32, mask: u32, single_filter_mode: bool) {
        self.set_filter(&AcceptanceFilter {
            code,
            mask,
            mode: if single_filter_mode {
                FilterMode::Single
            } else {
                FilterMode::Dual
            },
        });
    }

    /// Program the acceptance filter. Reset mode only.
    pub fn set_filter(&mut self, filter: &AcceptanceFilter) {
        self.debug_assert_reset_mode();
        let (code, mask) = filter.to_registers();
        for (i, (code, mask)) in code.into_iter().zip(mask).enumerate() {
            self.regs
                .write(Register::AcceptanceCode(i as u8), u32::from(code));
            self.regs
                .write(Register::AcceptanceMask(i as u8), u32::from(mask));
        }
        self.regs.modify(Register::Mode, |v| {
            let mut mode = ModeReg::from(v);
            mode.set_acceptance_filter_mode(filter.mode == FilterMode::Single);
            mode.into()
        });
    }

    // Interrupts

    /// Enable exactly the `interrupts`
    pub fn set_enabled_interrupts(&mut self, interrupts: InterruptSet) {
        self.regs.write(Register::InterruptEnable, interrupts.bits());
    }

    /// Currently enabled interrupts
    pub fn enabled_interrupts(&self) -> InterruptSet {
        self.regs.read(Register::InterruptEnable).into()
    }

    /// Read the latched interrupt flags.
    ///
    /// Clears every returned flag except [`InterruptSet::ri`], which stays
    /// set until the receive FIFO is empty.
    pub fn read_and_clear_interrupts(&mut self) -> InterruptSet {
        self.regs.read(Register::InterruptStatus).into()
    }

    // Commands

    fn command(&mut self, cmd: CommandReg) {
        self.regs.write(Register::Command, cmd.into());
    }

    /// Request a transmission of the transmit buffer
    pub fn transmit(&mut self) {
        self.command(TransmitCommand::Transmit.reg());
    }

    /// Request a transmission without retransmission, as a single write
    pub fn transmit_single_shot(&mut self) {
        self.command(TransmitCommand::SingleShot.reg());
    }

    /// Abort a pending transmission that has not started yet
    pub fn abort_transmit(&mut self) {
        let mut cmd = CommandReg::default();
        cmd.set_abort_tx(true);
        self.command(cmd);
    }

    /// Free the receive buffer for the next frame of the FIFO
    pub fn release_receive_buffer(&mut self) {
        let mut cmd = CommandReg::default();
        cmd.set_release_buffer(true);
        self.command(cmd);
    }

    /// Clear the data overrun status
    pub fn clear_data_overrun(&mut self) {
        let mut cmd = CommandReg::default();
        cmd.set_clear_data_overrun(true);
        self.command(cmd);
    }

    /// Request a simultaneous transmission and reception
    pub fn self_reception_request(&mut self) {
        self.command(TransmitCommand::SelfReception.reg());
    }

    /// Request a simultaneous single-shot transmission and reception
    pub fn self_reception_single_shot(&mut self) {
        self.command(TransmitCommand::SelfReceptionSingleShot.reg());
    }

    /// Issue a transmit-family command
    pub fn transmit_with(&mut self, command: TransmitCommand) {
        self.command(command.reg());
    }

    /// Issue several commands: abort/release/overrun in one write, then the
    /// transmit command in a second write. Empty groups are not written.
    pub fn issue(&mut self, commands: Commands) {
        let cmd = commands.non_transmit_reg();
        if u32::from(cmd) != 0 {
            self.command(cmd);
        }
        if let Some(transmit) = commands.transmit {
            self.command(transmit.reg());
        }
    }

    // Status

    /// Snapshot of the status register
    pub fn read_status(&self) -> StatusSet {
        self.regs.read(Register::Status).into()
    }

    /// Read the error code capture register.
    ///
    /// Reading re-arms the capture and the bus error interrupt, two calls
    /// after one bus error do not return the same information.
    pub fn decode_error_capture(&mut self) -> ErrorCapture {
        ErrorCapture::from_bits(self.regs.read(Register::ErrorCodeCapture))
    }

    /// Re-arm the arbitration lost capture. Returns the bit position at which
    /// arbitration was lost.
    pub fn clear_arbitration_lost_capture(&mut self) -> u8 {
        (self.regs.read(Register::ArbitrationLostCapture) & 0x1f) as u8
    }

    // Error counters

    fn read_byte(&self, reg: Register) -> u8 {
        ByteReg::from(self.regs.read(reg)).byte()
    }

    fn write_byte(&mut self, reg: Register, value: u8) {
        let mut byte = ByteReg::default();
        byte.set_byte(value);
        self.regs.write(reg, byte.into());
    }

    /// Transmit and receive error counters
    pub fn error_counters(&self) -> ErrorCounters {
        ErrorCounters {
            tec: self.tx_error_count(),
            rec: self.rx_error_count(),
        }
    }

    /// Transmit error counter
    pub fn tx_error_count(&self) -> u8 {
        self.read_byte(Register::TxErrorCount)
    }

    /// Set the transmit error counter. Reset mode only.
    pub fn set_tx_error_count(&mut self, tec: u8) {
        self.debug_assert_reset_mode();
        self.write_byte(Register::TxErrorCount, tec);
    }

    /// Receive error counter
    pub fn rx_error_count(&self) -> u8 {
        self.read_byte(Register::RxErrorCount)
    }

    /// Set the receive error counter. Reset mode only.
    pub fn set_rx_error_count(&mut self, rec: u8) {
        self.debug_assert_reset_mode();
        self.write_byte(Register::RxErrorCount, rec);
    }

    /// Error counter value raising the error warning status
    pub fn error_warning_limit(&self) -> u8 {
        self.read_byte(Register::ErrorWarningLimit)
    }

    /// Set the error warning limit. Reset mode only.
    pub fn set_error_warning_limit(&mut self, limit: u8) {
        self.debug_assert_reset_mode();
        self.write_byte(Register::ErrorWarningLimit, limit);
    }

    /// Number of frames in the receive FIFO
    pub fn rx_message_count(&self) -> u8 {
        self.read_byte(Register::RxMessageCount)
    }

    // CLKOUT

    /// Output the source clock divided by `divider` on the CLKOUT pin.
    ///
    /// Valid dividers are 1 and the even numbers from 2 to 490; any other
    /// value turns the output off.
    pub fn set_clkout(&mut self, divider: u32) {
        let mut reg = ClockDividerReg::default();
        match divider {
            1 => reg.set_cd(0xff),
            2..=490 if divider % 2 == 0 => reg.set_cd((divider / 2 - 1) as u8),
            _ => reg.set_clock_off(true),
        }
        self.regs.write(Register::ClockDivider, reg.into());
    }

    /// Turn the CLKOUT pin off
    pub fn disable_clkout(&mut self) {
        self.set_clkout(0);
    }

    // Buffers

    /// Write the transmit buffer. Operating mode only, in reset mode the
    /// window maps the acceptance filter.
    pub fn write_tx_buffer(&mut self, buffer: &FrameBuffer) {
        for (i, byte) in buffer.0.iter().enumerate() {
            self.regs.write(Register::Buffer(i as u8), u32::from(*byte));
        }
    }

    /// Read the frame at the front of the receive FIFO
    pub fn read_rx_buffer(&self) -> FrameBuffer {
        let mut buffer = [0; BUFFER_LEN];
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = self.read_byte(Register::Buffer(i as u8));
        }
        FrameBuffer(buffer)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reg::fake::FakeTwai;

    fn controller() -> Controller<FakeTwai> {
        Controller::new(FakeTwai::new())
    }

    #[test]
    fn command_values() {
        let cases: [(fn(&mut Controller<FakeTwai>), u32); 7] = [
            (Controller::transmit, 0x01),
            (Controller::transmit_single_shot, 0x03),
            (Controller::abort_transmit, 0x02),
            (Controller::release_receive_buffer, 0x04),
            (Controller::clear_data_overrun, 0x08),
            (Controller::self_reception_request, 0x10),
            (Controller::self_reception_single_shot, 0x12),
        ];
        for (command, value) in cases {
            let mut twai = controller();
            command(&mut twai);
            assert_eq!(twai.registers().writes(), [(Register::Command, value)]);
        }
    }

    #[test]
    fn issue_writes_transmit_last() {
        let mut twai = controller();
        twai.issue(Commands {
            release_receive_buffer: true,
            clear_data_overrun: true,
            transmit: Some(TransmitCommand::SingleShot),
            ..Default::default()
        });
        assert_eq!(twai.registers().writes_to(Register::Command), [0x0c, 0x03]);

        let mut twai = controller();
        twai.issue(Commands {
            transmit: Some(TransmitCommand::Transmit),
            ..Default::default()
        });
        assert_eq!(twai.registers().writes_to(Register::Command), [0x01]);

        let mut twai = controller();
        twai.issue(Commands::default());
        assert!(twai.registers().writes().is_empty());
    }

    #[test]
    fn transmit_command_for_flags() {
        let mut flags = FrameFlags::default();
        assert_eq!(TransmitCommand::for_flags(flags), TransmitCommand::Transmit);
        flags.set_single_shot(true);
        assert_eq!(TransmitCommand::for_flags(flags), TransmitCommand::SingleShot);
        flags.set_self_reception(true);
        assert_eq!(
            TransmitCommand::for_flags(flags),
            TransmitCommand::SelfReceptionSingleShot
        );
    }

    #[test]
    fn reset_mode_transitions() {
        let mut twai = controller();
        assert!(twai.is_in_reset_mode());
        twai.set_mode(true, false);
        twai.exit_reset_mode();
        assert!(!twai.is_in_reset_mode());
        assert_eq!(twai.registers().raw(Register::Mode), 0x2);
        twai.enter_reset_mode();
        assert!(twai.is_in_reset_mode());
        assert_eq!(twai.registers().raw(Register::Mode), 0x3);
    }

    #[test]
    fn bus_timing_packing() {
        let mut twai = controller();
        twai.set_bus_timing(8, 3, 15, 4, false);
        assert_eq!(twai.registers().raw(Register::BusTiming0), (2 << 14) | 3);
        assert_eq!(twai.registers().raw(Register::BusTiming1), (3 << 4) | 14);

        twai.set_bus_timing(32768, 4, 16, 8, true);
        assert_eq!(twai.registers().raw(Register::BusTiming0), 0xffff);
        assert_eq!(twai.registers().raw(Register::BusTiming1), 0xff);
    }

    #[test]
    fn bus_timing_wraps_out_of_range_values() {
        let mut twai = controller();
        // prescaler 0 and zero-length segments wrap to all ones
        twai.set_bus_timing(0, 0, 0, 0, false);
        assert_eq!(twai.registers().raw(Register::BusTiming0), 0xffff);
        assert_eq!(twai.registers().raw(Register::BusTiming1), 0x7f);
        // oversized values are truncated to the field width
        twai.set_bus_timing(0x1_0002, 5, 17, 9, false);
        assert_eq!(twai.registers().raw(Register::BusTiming0), 0);
        assert_eq!(twai.registers().raw(Register::BusTiming1), 0);
    }

    #[test]
    fn acceptance_filter_bytes() {
        let mut twai = controller();
        twai.set_acceptance_filter(0x1234_5678, 0x0000_00ff, true);
        let regs = twai.registers();
        for (i, byte) in [0x12, 0x34, 0x56, 0x78].into_iter().enumerate() {
            assert_eq!(regs.raw(Register::AcceptanceCode(i as u8)), byte);
        }
        for (i, byte) in [0, 0, 0, 0xff].into_iter().enumerate() {
            assert_eq!(regs.raw(Register::AcceptanceMask(i as u8)), byte);
        }
        assert_eq!(regs.raw(Register::Mode), 0x9);

        twai.set_acceptance_filter(0, 0, false);
        assert_eq!(twai.registers().raw(Register::Mode), 0x1);
    }

    #[test]
    fn interrupt_read_keeps_receive_flag() {
        let mut twai = controller();
        twai.exit_reset_mode();
        twai.registers().push_rx(FrameBuffer::default().0);
        twai.registers().raise((1 << 1) | (1 << 7));

        let first = twai.read_and_clear_interrupts();
        assert!(first.ri() && first.ti() && first.bei());
        let second = twai.read_and_clear_interrupts();
        assert!(second.ri());
        assert!(!second.ti() && !second.bei());

        twai.release_receive_buffer();
        assert!(twai.read_and_clear_interrupts().is_empty());
    }

    #[test]
    fn error_capture_is_read_once_per_call() {
        let mut twai = controller();
        twai.registers()
            .set_raw(Register::ErrorCodeCapture, (1 << 6) | 11);
        let capture = twai.decode_error_capture();
        assert_eq!(capture.kind(), crate::status::ErrorKind::Form);
        assert_eq!(twai.registers().state.borrow().error_capture_reads, 1);

        twai.registers().set_raw(Register::ArbitrationLostCapture, 0x4a);
        assert_eq!(twai.clear_arbitration_lost_capture(), 0x0a);
        assert_eq!(twai.registers().state.borrow().arbitration_lost_reads, 1);
    }

    #[test]
    fn error_counters_are_not_cached() {
        let mut twai = controller();
        twai.set_tx_error_count(10);
        twai.set_rx_error_count(20);
        assert_eq!(twai.error_counters(), ErrorCounters { tec: 10, rec: 20 });
        twai.registers().bus_off();
        assert_eq!(twai.error_counters(), ErrorCounters { tec: 128, rec: 0 });
    }

    #[test]
    fn error_warning_limit() {
        let mut twai = controller();
        twai.set_error_warning_limit(100);
        assert_eq!(twai.error_warning_limit(), 100);
    }

    #[test]
    fn clkout_divider() {
        let mut twai = controller();
        for (divider, value) in [
            (1, 0xff),
            (2, 0x00),
            (4, 0x01),
            (490, 244),
            (0, 0x100),
            (3, 0x100),
            (492, 0x100),
        ] {
            twai.set_clkout(divider);
            assert_eq!(
                twai.registers().raw(Register::ClockDivider),
                value,
                "{}",
                divider
            );
        }
    }

    #[test]
    fn buffers() {
        let mut twai = controller();
        let frame = FrameBuffer([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13]);
        twai.exit_reset_mode();
        twai.write_tx_buffer(&frame);
        twai.transmit();
        assert_eq!(twai.registers().transmitted(), [frame.0]);

        twai.registers().push_rx(frame.0);
        assert_eq!(twai.rx_message_count(), 1);
        assert_eq!(twai.read_rx_buffer(), frame);
    }
}
