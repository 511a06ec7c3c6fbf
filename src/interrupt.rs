//! Interrupt flags and enables
//!
//! The interrupt status register is cleared by reading it, except for the
//! receive interrupt which stays set as long as the receive FIFO holds
//! frames. Every read through [`crate::bus::Twai::interrupt_flags`] therefore
//! consumes the flags it returns.

use bitfield::bitfield;

bitfield! {
    /// A set of TWAI interrupts.
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct InterruptSet(u32);

    /// Bus Idle Status. Only implemented on some chips.
    pub bisi, set_bisi: 8;
    /// Bus Error
    pub bei, set_bei: 7;
    /// Arbitration Lost
    pub ali, set_ali: 6;
    /// Error Passive
    pub epi, set_epi: 5;
    /// Error Warning: the error or bus status changed
    pub ei, set_ei: 2;
    /// Transmit: the transmit buffer became free
    pub ti, set_ti: 1;
    /// Receive: the receive FIFO holds at least one frame
    pub ri, set_ri: 0;
}

impl InterruptSet {
    /// Set without any interrupt
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw register value
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Whether `interrupt` is part of the set
    pub fn contains(&self, interrupt: Interrupt) -> bool {
        self.0 & u32::from(interrupt) != 0
    }

    /// Whether the set has no interrupts
    pub fn is_empty(&self) -> bool {
        self.0 & IMPLEMENTED_BITS == 0
    }
}

/// Interrupts the driver enables by default
pub const DRIVER_INTERRUPTS: InterruptSet = InterruptSet(
    (1 << Interrupt::Receive as u32)
        | (1 << Interrupt::Transmit as u32)
        | (1 << Interrupt::ErrorWarning as u32)
        | (1 << Interrupt::ErrorPassive as u32)
        | (1 << Interrupt::ArbitrationLost as u32)
        | (1 << Interrupt::BusError as u32),
);

const IMPLEMENTED_BITS: u32 = 0x1e7;

impl From<u32> for InterruptSet {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl FromIterator<Interrupt> for InterruptSet {
    fn from_iter<T: IntoIterator<Item = Interrupt>>(iter: T) -> Self {
        let mut set = 0_u32;
        for int in iter.into_iter() {
            set |= u32::from(int);
        }
        InterruptSet(set)
    }
}

impl core::fmt::Debug for InterruptSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "InterruptSet {{ ")?;
        if self.bisi() {
            write!(f, "BISI ")?;
        }
        if self.bei() {
            write!(f, "BEI ")?;
        }
        if self.ali() {
            write!(f, "ALI ")?;
        }
        if self.epi() {
            write!(f, "EPI ")?;
        }
        if self.ei() {
            write!(f, "EI ")?;
        }
        if self.ti() {
            write!(f, "TI ")?;
        }
        if self.ri() {
            write!(f, "RI ")?;
        }
        write!(f, "}}")
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for InterruptSet {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "InterruptSet({=u32:#x})", self.0)
    }
}

/// A single interrupt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Interrupt {
    /// RI
    Receive = 0,
    /// TI
    Transmit = 1,
    /// EI
    ErrorWarning = 2,
    /// EPI
    ErrorPassive = 5,
    /// ALI
    ArbitrationLost = 6,
    /// BEI
    BusError = 7,
    /// BISI
    BusIdle = 8,
}

impl From<Interrupt> for u32 {
    fn from(x: Interrupt) -> Self {
        1 << x as u32
    }
}

/// The bit position does not hold an interrupt flag
#[derive(Debug)]
pub struct InvalidInterruptNumber;

impl TryFrom<u8> for Interrupt {
    type Error = InvalidInterruptNumber;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use Interrupt::*;
        let ret = match value {
            0 => Receive,
            1 => Transmit,
            2 => ErrorWarning,
            5 => ErrorPassive,
            6 => ArbitrationLost,
            7 => BusError,
            8 => BusIdle,
            _ => Err(InvalidInterruptNumber)?,
        };
        Ok(ret)
    }
}

impl InterruptSet {
    /// An iterator visiting all elements in ascending bit order.
    pub fn iter(&self) -> Iter {
        Iter {
            flags: *self,
            index: 0,
        }
    }
}

/// An iterator over the items of an [`InterruptSet`].
///
/// This `struct` is created by [`InterruptSet::iter`].
pub struct Iter {
    flags: InterruptSet,
    index: u8,
}

const LAST_INTERRUPT: u8 = Interrupt::BusIdle as u8;

impl Iterator for Iter {
    type Item = Interrupt;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index <= LAST_INTERRUPT {
            let i = self.index;
            self.index += 1;
            // Bits 3 and 4 are reserved
            if let Ok(int) = Interrupt::try_from(i) {
                if self.flags.0 & (1 << i) != 0 {
                    return Some(int);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn iter_preserves_length() {
        assert_eq!(InterruptSet(0).iter().count(), 0);
        assert_eq!(InterruptSet(1).iter().count(), 1);
        assert_eq!(InterruptSet(0x1e7).iter().count(), 7);
        assert_eq!(InterruptSet(0xffff_ffff).iter().count(), 7);
        assert_eq!(DRIVER_INTERRUPTS.iter().count(), 6);
    }

    fn iter_collect(int: u32) -> u32 {
        InterruptSet::from_iter(InterruptSet(int).iter()).0
    }

    #[test]
    fn iter_collect_preserves_interrupts() {
        assert_eq!(iter_collect(0), 0);
        assert_eq!(iter_collect(1), 1);
        assert_eq!(iter_collect(0xe7), 0xe7);
        assert_eq!(iter_collect(0x1e7), 0x1e7);
    }

    #[test]
    fn iter_collect_drops_reserved_bits() {
        assert_eq!(iter_collect(0x18), 0);
        assert_eq!(iter_collect(0xffff_ffff), 0x1e7);
    }

    #[test]
    fn driver_interrupts() {
        assert_eq!(DRIVER_INTERRUPTS.bits(), 0xe7);
        assert!(DRIVER_INTERRUPTS.contains(Interrupt::BusError));
        assert!(!DRIVER_INTERRUPTS.contains(Interrupt::BusIdle));
        assert!(InterruptSet(0x18).is_empty());
    }
}
