//! Acceptance filter

use embedded_can::{ExtendedId, StandardId};

/// Number of acceptance filters in use
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterMode {
    /// One filter spanning the full 32 bits of code and mask
    #[default]
    Single,
    /// Two shorter filters, see the controller manual for the bit split
    Dual,
}

/// Acceptance code and mask
///
/// Both are given MSB-first as the bits appear on the bus: in single filter
/// mode, a standard identifier occupies bits 31..21 followed by the RTR bit,
/// an extended identifier occupies bits 31..3 followed by the RTR bit. A set
/// mask bit means "don't care".
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcceptanceFilter {
    /// Acceptance code
    pub code: u32,
    /// Acceptance mask, 1 = ignore bit
    pub mask: u32,
    /// Single or dual filter mode
    pub mode: FilterMode,
}

impl Default for AcceptanceFilter {
    fn default() -> Self {
        Self::accept_all()
    }
}

impl AcceptanceFilter {
    /// Accept every frame
    pub const fn accept_all() -> Self {
        Self {
            code: 0,
            mask: 0xffff_ffff,
            mode: FilterMode::Single,
        }
    }

    /// Accept standard frames with exactly `id`, data or remote.
    ///
    /// Extended frames whose top 11 identifier bits equal `id` pass as well.
    pub fn standard(id: StandardId) -> Self {
        Self {
            code: u32::from(id.as_raw()) << 21,
            mask: !(0x7ff << 21),
            mode: FilterMode::Single,
        }
    }

    /// Accept extended frames with exactly `id`, data or remote
    pub fn extended(id: ExtendedId) -> Self {
        Self {
            code: id.as_raw() << 3,
            mask: !(0x1fff_ffff << 3),
            mode: FilterMode::Single,
        }
    }

    /// Register bytes for the code and mask registers, in register order.
    ///
    /// Register byte `i` receives bits `31 - 8i ..= 24 - 8i`.
    pub fn to_registers(&self) -> ([u8; 4], [u8; 4]) {
        (split(self.code), split(self.mask))
    }
}

fn split(value: u32) -> [u8; 4] {
    let swapped = value.swap_bytes();
    let mut bytes = [0; 4];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = (swapped >> (8 * i)) as u8;
    }
    bytes
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn register_bytes_are_msb_first() {
        let filter = AcceptanceFilter {
            code: 0x1234_5678,
            mask: 0x0000_00ff,
            mode: FilterMode::Single,
        };
        let (code, mask) = filter.to_registers();
        assert_eq!(code, [0x12, 0x34, 0x56, 0x78]);
        assert_eq!(mask, [0x00, 0x00, 0x00, 0xff]);
    }

    #[test]
    fn accept_all() {
        let (code, mask) = AcceptanceFilter::accept_all().to_registers();
        assert_eq!(code, [0; 4]);
        assert_eq!(mask, [0xff; 4]);
        assert_eq!(AcceptanceFilter::default(), AcceptanceFilter::accept_all());
    }

    #[test]
    fn single_identifier_filters() {
        let filter = AcceptanceFilter::standard(StandardId::new(0x7ff).unwrap());
        assert_eq!(filter.code, 0xffe0_0000);
        assert_eq!(filter.mask, 0x001f_ffff);

        let filter = AcceptanceFilter::extended(ExtendedId::new(0x1abc_de12).unwrap());
        assert_eq!(filter.code, 0xd5e6_f090);
        assert_eq!(filter.mask, 0x0000_0007);
    }
}
