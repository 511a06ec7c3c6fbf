//! Bit-level views of register values
//!
//! Status, interrupt and error capture registers have their own types in
//! [`crate::status`] and [`crate::interrupt`].

use bitfield::bitfield;

bitfield! {
    /// Mode register
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct ModeReg(u32);
    impl Debug;
    /// Controller is disconnected from the bus, configuration is writable
    pub reset_mode, set_reset_mode: 0;
    /// Receive only, never acknowledge or transmit
    pub listen_only_mode, set_listen_only_mode: 1;
    /// Transmission succeeds without acknowledgement
    pub self_test_mode, set_self_test_mode: 2;
    /// Single (1) or dual (0) acceptance filter
    pub acceptance_filter_mode, set_acceptance_filter_mode: 3;
}

bitfield! {
    /// Command register
    ///
    /// Every bit is a one-shot trigger; the register always reads as zero.
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct CommandReg(u32);
    impl Debug;
    /// Transmission request
    pub tx_request, set_tx_request: 0;
    /// Abort transmission
    pub abort_tx, set_abort_tx: 1;
    /// Release receive buffer
    pub release_buffer, set_release_buffer: 2;
    /// Clear data overrun
    pub clear_data_overrun, set_clear_data_overrun: 3;
    /// Self reception request
    pub self_rx_request, set_self_rx_request: 4;
}

bitfield! {
    /// Bus timing register 0
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct BusTiming0Reg(u32);
    impl Debug;
    /// `prescaler / 2 - 1`
    pub u16, baud_presc, set_baud_presc: 13, 0;
    /// `sjw - 1`
    pub u8, sync_jump_width, set_sync_jump_width: 15, 14;
}

bitfield! {
    /// Bus timing register 1
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct BusTiming1Reg(u32);
    impl Debug;
    /// `tseg_1 - 1`
    pub u8, time_segment1, set_time_segment1: 3, 0;
    /// `tseg_2 - 1`
    pub u8, time_segment2, set_time_segment2: 6, 4;
    /// Sample the bus three times per bit
    pub time_sampling, set_time_sampling: 7;
}

bitfield! {
    /// Clock divider register
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct ClockDividerReg(u32);
    impl Debug;
    /// Divider code, `divider / 2 - 1`; 255 selects a divider of 1
    pub u8, cd, set_cd: 7, 0;
    /// CLKOUT pin disabled
    pub clock_off, set_clock_off: 8;
}

bitfield! {
    /// Register holding a single byte in its low bits (buffer window,
    /// acceptance filter, counters, error warning limit)
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct ByteReg(u32);
    impl Debug;
    /// Register content
    pub u8, byte, set_byte: 7, 0;
}

macro_rules! impl_to_from_u32 {
    ($($ident:ident),*) => {
        $(
            impl From<$ident> for u32 {
                fn from(reg: $ident) -> Self {
                    reg.0
                }
            }

            impl From<u32> for $ident {
                fn from(int: u32) -> Self {
                    Self(int)
                }
            }
        )*
    };
}

impl_to_from_u32!(
    ModeReg,
    CommandReg,
    BusTiming0Reg,
    BusTiming1Reg,
    ClockDividerReg,
    ByteReg
);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fields_are_truncated_to_their_width() {
        let mut bt0 = BusTiming0Reg(0);
        bt0.set_baud_presc(0xffff);
        bt0.set_sync_jump_width(0x7);
        assert_eq!(bt0.0, 0xffff);
        assert_eq!(bt0.baud_presc(), 0x3fff);
        assert_eq!(bt0.sync_jump_width(), 0x3);

        let mut bt1 = BusTiming1Reg(0);
        bt1.set_time_segment2(0xff);
        assert_eq!(bt1.0, 0x70);
        assert_eq!(bt1.time_segment1(), 0);
    }

    #[test]
    fn command_bits() {
        let mut cmd = CommandReg::default();
        cmd.set_tx_request(true);
        cmd.set_abort_tx(true);
        assert_eq!(u32::from(cmd), 0x03);

        let mut cmd = CommandReg::default();
        cmd.set_self_rx_request(true);
        cmd.set_abort_tx(true);
        assert_eq!(u32::from(cmd), 0x12);
    }
}
