//! Controller status and bus error reporting

use bitfield::bitfield;
use core::fmt::{self, Debug};

bitfield! {
    /// Snapshot of the status register. Reading it has no side effects.
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct StatusSet(u32);

    /// Receive Buffer Status: at least one frame is waiting in the receive
    /// FIFO
    pub rbs, _: 0;
    /// Data Overrun Status: a frame was lost because the receive FIFO was
    /// full
    pub dos, _: 1;
    /// Transmit Buffer Status: the transmit buffer is free
    pub tbs, _: 2;
    /// Transmission Complete Status: the last requested transmission has
    /// completed
    pub tcs, _: 3;
    /// Receive Status: the controller is receiving a frame
    pub rs, _: 4;
    /// Transmit Status: the controller is transmitting a frame
    pub ts, _: 5;
    /// Error Status: an error counter reached the error warning limit
    pub es, _: 6;
    /// Bus Status: the controller is bus-off
    pub bs, _: 7;
    /// Miss Status: the frame in the receive buffer was received while the
    /// FIFO was already full
    pub ms, _: 8;
}

impl From<u32> for StatusSet {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Debug for StatusSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusSet")
            .field("rbs", &self.rbs())
            .field("dos", &self.dos())
            .field("tbs", &self.tbs())
            .field("tcs", &self.tcs())
            .field("rs", &self.rs())
            .field("ts", &self.ts())
            .field("es", &self.es())
            .field("bs", &self.bs())
            .field("ms", &self.ms())
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for StatusSet {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "StatusSet({=u32:#x})", self.0)
    }
}

/// Transmit and receive error counters
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorCounters {
    /// Transmit error counter. Forced to 128 by the hardware on bus-off.
    pub tec: u8,
    /// Receive error counter. Forced to 0 by the hardware on bus-off.
    pub rec: u8,
}

/// Kind of bus error
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// Transmitted bit differs from the bus level
    Bit,
    /// Fixed-form bit field contained an illegal level
    Form,
    /// More than five consecutive bits of the same level
    Stuff,
    /// CRC, acknowledge or any other error
    Other,
}

/// Whether the controller was transmitting or receiving when the error
/// occurred
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorDirection {
    /// Error during transmission
    Transmit,
    /// Error during reception
    Receive,
}

/// Segment of the frame in which a bus error was detected
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ErrorSegment {
    /// Identifier bits 28 to 21
    Id28To21 = 2,
    /// Start of frame
    StartOfFrame = 3,
    /// Substitute remote request bit
    Srtr = 4,
    /// Identifier extension bit
    Ide = 5,
    /// Identifier bits 20 to 18
    Id20To18 = 6,
    /// Identifier bits 17 to 13
    Id17To13 = 7,
    /// CRC sequence
    CrcSequence = 8,
    /// Reserved bit 0
    R0 = 9,
    /// Data field
    Data = 10,
    /// Data length code
    Dlc = 11,
    /// Remote transmission request bit
    Rtr = 12,
    /// Reserved bit 1
    R1 = 13,
    /// Identifier bits 4 to 0
    Id4To0 = 14,
    /// Identifier bits 12 to 5
    Id12To5 = 15,
    /// Active error flag
    ActiveErrorFlag = 17,
    /// Intermission
    Intermission = 18,
    /// Tolerate dominant bits
    Superposition = 19,
    /// Passive error flag
    PassiveErrorFlag = 22,
    /// Error delimiter
    ErrorDelimiter = 23,
    /// CRC delimiter
    CrcDelimiter = 24,
    /// Acknowledge slot
    AckSlot = 25,
    /// End of frame
    EndOfFrame = 26,
    /// Acknowledge delimiter
    AckDelimiter = 27,
    /// Overload flag
    OverloadFlag = 28,
}

/// The code does not name a frame segment
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UnknownSegment(pub u8);

impl TryFrom<u8> for ErrorSegment {
    type Error = UnknownSegment;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use ErrorSegment::*;
        let ret = match value {
            2 => Id28To21,
            3 => StartOfFrame,
            4 => Srtr,
            5 => Ide,
            6 => Id20To18,
            7 => Id17To13,
            8 => CrcSequence,
            9 => R0,
            10 => Data,
            11 => Dlc,
            12 => Rtr,
            13 => R1,
            14 => Id4To0,
            15 => Id12To5,
            17 => ActiveErrorFlag,
            18 => Intermission,
            19 => Superposition,
            22 => PassiveErrorFlag,
            23 => ErrorDelimiter,
            24 => CrcDelimiter,
            25 => AckSlot,
            26 => EndOfFrame,
            27 => AckDelimiter,
            28 => OverloadFlag,
            _ => Err(UnknownSegment(value))?,
        };
        Ok(ret)
    }
}

/// Decoded content of the error code capture register
///
/// The register latches the most recent bus error and is re-armed by reading
/// it, so each capture is obtained exactly once per bus error event.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct ErrorCapture(u8);

impl ErrorCapture {
    /// Interpret a raw error code capture register value
    pub fn from_bits(bits: u32) -> Self {
        Self(bits as u8)
    }

    /// Raw register value
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Kind of the captured error
    pub fn kind(&self) -> ErrorKind {
        match (self.0 >> 6) & 0x3 {
            0 => ErrorKind::Bit,
            1 => ErrorKind::Form,
            2 => ErrorKind::Stuff,
            _ => ErrorKind::Other,
        }
    }

    /// Direction of the transfer the error occurred in
    pub fn direction(&self) -> ErrorDirection {
        if (self.0 >> 5) & 0x1 == 0 {
            ErrorDirection::Transmit
        } else {
            ErrorDirection::Receive
        }
    }

    /// Raw 5-bit segment code
    pub fn segment_code(&self) -> u8 {
        self.0 & 0x1f
    }

    /// Frame segment the error was detected in
    pub fn segment(&self) -> Result<ErrorSegment, UnknownSegment> {
        self.segment_code().try_into()
    }
}

impl Debug for ErrorCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorCapture")
            .field("kind", &self.kind())
            .field("direction", &self.direction())
            .field("segment", &self.segment())
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ErrorCapture {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "ErrorCapture {{ kind: {}, direction: {}, segment: {=u8} }}",
            self.kind(),
            self.direction(),
            self.segment_code()
        )
    }
}
