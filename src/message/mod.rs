//! Handling of messages/frames

mod buffer;

pub use buffer::{DecodedHeader, FrameBuffer, MAX_DATA_LEN};

use bitfield::bitfield;
use core::cmp::min;
use embedded_can::Id;

bitfield! {
    /// Flags describing a frame
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct FrameFlags(u8);
    impl Debug;
    /// 29-bit identifier
    pub extended, set_extended: 0;
    /// Remote transmission request
    pub remote, set_remote: 1;
    /// Transmit without retransmission on error or lost arbitration.
    /// Transmit only.
    pub single_shot, set_single_shot: 2;
    /// Receive the frame back while transmitting it. Transmit only.
    pub self_reception, set_self_reception: 3;
    /// The data length code is above 8. Receive only.
    pub dlc_non_compliant, set_dlc_non_compliant: 4;
}

impl FrameFlags {
    /// Raw flag bits
    pub fn bits(&self) -> u8 {
        self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FrameFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "FrameFlags({=u8:#x})", self.0)
    }
}

/// Classic CAN frame
///
/// The data length code is kept as transmitted on the bus and may exceed 8
/// for received frames, see [`FrameFlags::dlc_non_compliant`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Frame {
    pub(crate) id: Id,
    pub(crate) dlc: u8,
    pub(crate) data: [u8; MAX_DATA_LEN],
    pub(crate) flags: FrameFlags,
}

impl Frame {
    /// Frame with a raw data length code. `dlc` is truncated to 4 bits and
    /// at most 8 bytes of `data` are kept.
    pub fn with_dlc(id: impl Into<Id>, dlc: u8, data: &[u8], remote: bool) -> Self {
        let id = id.into();
        let mut flags = FrameFlags::default();
        flags.set_extended(matches!(id, Id::Extended(_)));
        flags.set_remote(remote);
        let dlc = dlc & 0xf;
        flags.set_dlc_non_compliant(dlc as usize > MAX_DATA_LEN);

        let mut buf = [0; MAX_DATA_LEN];
        if !remote {
            let len = min(data.len(), MAX_DATA_LEN);
            buf[..len].copy_from_slice(&data[..len]);
        }
        Self {
            id,
            dlc,
            data: buf,
            flags,
        }
    }

    /// Transmit without automatic retransmission
    pub fn with_single_shot(mut self) -> Self {
        self.flags.set_single_shot(true);
        self
    }

    /// Receive the frame back while transmitting it
    pub fn with_self_reception(mut self) -> Self {
        self.flags.set_self_reception(true);
        self
    }

    /// Frame flags
    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    /// Transmission is single-shot
    pub fn is_single_shot(&self) -> bool {
        self.flags.single_shot()
    }

    /// Transmission requests self-reception
    pub fn is_self_reception(&self) -> bool {
        self.flags.self_reception()
    }

    /// The data length code is above 8
    pub fn is_dlc_non_compliant(&self) -> bool {
        self.flags.dlc_non_compliant()
    }
}

impl embedded_can::Frame for Frame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_DATA_LEN {
            return None;
        }
        Some(Self::with_dlc(id, data.len() as u8, data, false))
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > MAX_DATA_LEN {
            return None;
        }
        Some(Self::with_dlc(id, dlc as u8, &[], true))
    }

    fn is_extended(&self) -> bool {
        self.flags.extended()
    }

    fn is_remote_frame(&self) -> bool {
        self.flags.remote()
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc.into()
    }

    fn data(&self) -> &[u8] {
        if self.flags.remote() {
            &[]
        } else {
            &self.data[..min(self.dlc as usize, MAX_DATA_LEN)]
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Frame {
    fn format(&self, f: defmt::Formatter) {
        use embedded_can::Frame as _;
        match self.id {
            Id::Standard(id) => defmt::write!(f, "Frame {{ id: {=u16:#x}, ", id.as_raw()),
            Id::Extended(id) => defmt::write!(f, "Frame {{ id: {=u32:#x}, ", id.as_raw()),
        }
        defmt::write!(
            f,
            "dlc: {=u8}, data: {=[u8]:x}, flags: {} }}",
            self.dlc,
            self.data(),
            self.flags
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use embedded_can::{ExtendedId, Frame as _, StandardId};

    fn standard(raw: u16) -> StandardId {
        StandardId::new(raw).unwrap()
    }

    fn extended(raw: u32) -> ExtendedId {
        ExtendedId::new(raw).unwrap()
    }

    #[test]
    fn data_frame() {
        let frame = Frame::new(standard(0x321), &[1, 2, 3]).unwrap();
        assert!(!frame.is_extended());
        assert!(!frame.is_remote_frame());
        assert_eq!(frame.dlc(), 3);
        assert_eq!(frame.data(), &[1, 2, 3]);
        assert!(Frame::new(standard(0x321), &[0; 9]).is_none());
    }

    #[test]
    fn remote_frame() {
        let frame = Frame::new_remote(extended(0x1234_5678), 6).unwrap();
        assert!(frame.is_extended());
        assert!(frame.is_remote_frame());
        assert_eq!(frame.dlc(), 6);
        assert!(frame.data().is_empty());
        assert!(Frame::new_remote(extended(0x1234_5678), 9).is_none());
    }

    #[test]
    fn buffer_round_trip() {
        let frames = [
            Frame::new(standard(0), &[]).unwrap(),
            Frame::new(standard(0x7ff), &[0xff; 8]).unwrap(),
            Frame::new(extended(0x1abc_de12), &[1, 2, 3, 4, 5]).unwrap(),
            Frame::new_remote(standard(0x100), 2).unwrap(),
            Frame::new_remote(extended(0x1fff_ffff), 8).unwrap(),
        ];
        for frame in frames {
            let decoded = FrameBuffer::from_frame(&frame).to_frame();
            assert_eq!(decoded.id(), frame.id());
            assert_eq!(decoded.dlc(), frame.dlc());
            assert_eq!(decoded.data(), frame.data());
            assert_eq!(decoded.is_extended(), frame.is_extended());
            assert_eq!(decoded.is_remote_frame(), frame.is_remote_frame());
        }
    }

    #[test]
    fn raw_dlc_above_eight() {
        let frame = Frame::with_dlc(standard(0x1), 12, &[7; 8], false);
        assert!(frame.is_dlc_non_compliant());
        assert_eq!(frame.dlc(), 12);
        assert_eq!(frame.data(), &[7; 8]);

        let decoded = FrameBuffer::from_frame(&frame).to_frame();
        assert_eq!(decoded.dlc(), 12);
        assert!(decoded.is_dlc_non_compliant());
    }

    #[test]
    fn transmit_flags() {
        let frame = Frame::new(standard(0x1), &[])
            .unwrap()
            .with_single_shot()
            .with_self_reception();
        assert!(frame.is_single_shot());
        assert!(frame.is_self_reception());
        assert_eq!(frame.flags().bits(), 0x0c);
    }
}
