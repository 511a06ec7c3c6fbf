//! 13-byte transmit/receive buffer layout

use super::{Frame, FrameFlags};
use crate::reg::BUFFER_LEN;
use bitfield::bitfield;
use core::cmp::min;
use embedded_can::{ExtendedId, Id, StandardId};

/// Maximum number of payload bytes of a classic frame
pub const MAX_DATA_LEN: usize = 8;

bitfield! {
    /// Frame information, byte 0 of the buffer
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    struct FrameInfo(u8);
    impl Debug;
    u8, dlc, set_dlc: 3, 0;
    self_reception, set_self_reception: 4;
    single_shot, set_single_shot: 5;
    rtr, set_rtr: 6;
    extended, set_extended: 7;
}

/// Placement of identifier and payload for one frame format
struct IdLayout {
    mask: u32,
    shift: u32,
    id_start: usize,
    id_len: usize,
    data_start: usize,
}

impl IdLayout {
    /// Bytes 1-2 identifier, 3-10 payload, 11-12 unused
    const STANDARD: Self = Self {
        mask: 0x7ff,
        shift: 5,
        id_start: 1,
        id_len: 2,
        data_start: 3,
    };

    /// Bytes 1-4 identifier, 5-12 payload
    const EXTENDED: Self = Self {
        mask: 0x1fff_ffff,
        shift: 3,
        id_start: 1,
        id_len: 4,
        data_start: 5,
    };

    fn of(extended: bool) -> &'static Self {
        if extended {
            &Self::EXTENDED
        } else {
            &Self::STANDARD
        }
    }

    fn id_bytes<'a>(&self, buf: &'a [u8; BUFFER_LEN]) -> &'a [u8] {
        &buf[self.id_start..self.id_start + self.id_len]
    }

    fn id_bytes_mut<'a>(&self, buf: &'a mut [u8; BUFFER_LEN]) -> &'a mut [u8] {
        &mut buf[self.id_start..self.id_start + self.id_len]
    }

    fn data_bytes<'a>(&self, buf: &'a [u8; BUFFER_LEN]) -> &'a [u8] {
        &buf[self.data_start..self.data_start + MAX_DATA_LEN]
    }

    fn data_bytes_mut<'a>(&self, buf: &'a mut [u8; BUFFER_LEN]) -> &'a mut [u8] {
        &mut buf[self.data_start..self.data_start + MAX_DATA_LEN]
    }
}

/// Frame header decoded from a buffer
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecodedHeader {
    /// Raw identifier, 11 or 29 bits wide depending on `flags.extended()`
    pub id: u32,
    /// Raw data length code, 0 to 15
    pub dlc: u8,
    /// Extended, remote and DLC non-compliance flags
    pub flags: FrameFlags,
}

/// Contents of the controller's transmit/receive buffer window
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct FrameBuffer(pub [u8; BUFFER_LEN]);

impl Default for FrameBuffer {
    fn default() -> Self {
        Self([0; BUFFER_LEN])
    }
}

impl core::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "FrameBuffer({:02x?})", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FrameBuffer {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "FrameBuffer({=[u8]:x})", &self.0[..])
    }
}

impl FrameBuffer {
    /// Lay out a frame in a zeroed buffer.
    ///
    /// See [`Self::format`] for the treatment of each argument.
    pub fn encode(id: u32, dlc: u8, payload: &[u8], flags: FrameFlags) -> Self {
        let mut buf = Self::default();
        buf.format(id, dlc, payload, flags);
        buf
    }

    /// Lay out a frame in place.
    ///
    /// The identifier is masked to 11 or 29 bits depending on
    /// `flags.extended()` and only the low 4 bits of `dlc` are kept. For data
    /// frames, `min(dlc, 8, payload.len())` payload bytes are copied; payload
    /// bytes beyond that keep their previous content.
    pub fn format(&mut self, id: u32, dlc: u8, payload: &[u8], flags: FrameFlags) {
        let layout = IdLayout::of(flags.extended());

        let mut info = FrameInfo(0);
        info.set_dlc(dlc);
        info.set_self_reception(flags.self_reception());
        info.set_single_shot(flags.single_shot());
        info.set_rtr(flags.remote());
        info.set_extended(flags.extended());
        self.0[0] = info.0;

        let id = (id & layout.mask) << layout.shift;
        let id_bytes = id.to_be_bytes();
        layout
            .id_bytes_mut(&mut self.0)
            .copy_from_slice(&id_bytes[4 - layout.id_len..]);

        if !flags.remote() {
            let len = min(min(dlc as usize, MAX_DATA_LEN), payload.len());
            layout.data_bytes_mut(&mut self.0)[..len].copy_from_slice(&payload[..len]);
        }
    }

    /// Decode the header and copy the payload into `dest`.
    ///
    /// The number of bytes copied is `min(dlc, 8, dest.len())`, or zero for
    /// remote frames. A DLC above 8 is reported unchanged and flagged as
    /// non-compliant.
    pub fn decode(&self, dest: &mut [u8]) -> DecodedHeader {
        let info = FrameInfo(self.0[0]);
        let layout = IdLayout::of(info.extended());

        let mut id_bytes = [0; 4];
        id_bytes[4 - layout.id_len..].copy_from_slice(layout.id_bytes(&self.0));
        let id = (u32::from_be_bytes(id_bytes) >> layout.shift) & layout.mask;

        let dlc = info.dlc();
        let mut flags = FrameFlags::default();
        flags.set_extended(info.extended());
        flags.set_remote(info.rtr());
        flags.set_dlc_non_compliant(dlc as usize > MAX_DATA_LEN);

        if !info.rtr() {
            let len = min(min(dlc as usize, MAX_DATA_LEN), dest.len());
            dest[..len].copy_from_slice(&layout.data_bytes(&self.0)[..len]);
        }

        DecodedHeader { id, dlc, flags }
    }

    /// Lay out `frame` in a zeroed buffer
    pub fn from_frame(frame: &Frame) -> Self {
        let id = match frame.id {
            Id::Standard(id) => id.as_raw() as u32,
            Id::Extended(id) => id.as_raw(),
        };
        Self::encode(id, frame.dlc, &frame.data, frame.flags)
    }

    /// Decode the buffer into a [`Frame`]
    pub fn to_frame(&self) -> Frame {
        let mut data = [0; MAX_DATA_LEN];
        let header = self.decode(&mut data);
        let id = if header.flags.extended() {
            // The layout mask keeps the ID in range for a 29-bit integer
            Id::Extended(unsafe { ExtendedId::new_unchecked(header.id) })
        } else {
            // The layout mask keeps the ID in range for an 11-bit integer
            Id::Standard(unsafe { StandardId::new_unchecked(header.id as u16) })
        };
        Frame {
            id,
            dlc: header.dlc,
            data,
            flags: header.flags,
        }
    }
}

impl From<&Frame> for FrameBuffer {
    fn from(frame: &Frame) -> Self {
        Self::from_frame(frame)
    }
}
