//! TWAI bus configuration

use crate::filter::AcceptanceFilter;
use crate::interrupt::{InterruptSet, DRIVER_INTERRUPTS};
use core::ops::RangeInclusive;
use fugit::HertzU32;

/// Configuration for the TWAI bus
#[derive(Debug, Copy, Clone)]
pub struct TwaiConfig {
    /// Operating mode entered on [`finalize`](crate::bus::TwaiConfigurable::finalize)
    pub mode: Mode,
    /// Bit timing, either derived from a bitrate or given raw
    pub timing: Timing,
    /// Acceptance filter
    pub filter: AcceptanceFilter,
    /// Enabled interrupts
    pub interrupts: InterruptSet,
    /// Error counter value at which the error warning status and interrupt
    /// are raised
    pub error_warning_limit: u8,
    /// Divider of the CLKOUT pin, `None` disables the output. See
    /// [`Controller::set_clkout`](crate::controller::Controller::set_clkout).
    pub clock_out: Option<u32>,
}

impl TwaiConfig {
    /// Create an instance
    ///
    /// Bitrate value must be provided, all other settings come pre-populated
    /// with default values.
    pub fn new(bitrate: HertzU32) -> Self {
        Self {
            mode: Default::default(),
            timing: Timing::Bitrate(BitTiming::new(bitrate)),
            filter: AcceptanceFilter::accept_all(),
            interrupts: DRIVER_INTERRUPTS,
            error_warning_limit: DEFAULT_ERROR_WARNING_LIMIT,
            clock_out: None,
        }
    }
}

/// Error warning limit after controller reset
pub const DEFAULT_ERROR_WARNING_LIMIT: u8 = 96;

/// Operating mode
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Regular transmission and reception
    #[default]
    Normal,
    /// Transmissions complete without acknowledgement (self test). Useful
    /// together with self-reception on a bus without other nodes.
    NoAck,
    /// Receive only. The controller neither acknowledges nor transmits and
    /// error counters are frozen.
    ListenOnly,
}

impl Mode {
    pub(crate) fn listen_only(self) -> bool {
        self == Mode::ListenOnly
    }

    pub(crate) fn no_ack(self) -> bool {
        self == Mode::NoAck
    }
}

/// How to obtain the bus timing register values
#[derive(Debug, Copy, Clone)]
pub enum Timing {
    /// Derive the prescaler from the source clock
    Bitrate(BitTiming),
    /// Use the given register values
    Raw(TimingConfig),
}

impl Timing {
    /// Bus timing for the peripheral clocked at `source_clock`
    pub fn resolve(&self, source_clock: HertzU32) -> Result<TimingConfig, BitTimingError> {
        match self {
            Timing::Bitrate(bit_timing) => bit_timing.timing(source_clock),
            Timing::Raw(timing) => {
                timing.check()?;
                Ok(*timing)
            }
        }
    }
}

/// Bit-timing parameters as programmed into the bus timing registers
///
/// A bit is made up of `1 + tseg_1 + tseg_2` time quanta of `prescaler`
/// source clock cycles each. The values are *real* values, the `- 1`
/// register encodings are handled by the controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingConfig {
    /// Source clock cycles per time quantum, even
    pub prescaler: u32,
    /// Synchronization jump width
    pub sjw: u8,
    /// Time quanta before the sample point
    pub tseg_1: u8,
    /// Time quanta after the sample point
    pub tseg_2: u8,
    /// Sample each bit three times
    pub triple_sampling: bool,
}

impl TimingConfig {
    /// Returns the number of time quanta that make up one bit time
    pub fn time_quanta_per_bit(&self) -> u32 {
        1 + u32::from(self.tseg_1) + u32::from(self.tseg_2)
    }

    /// Validate every field against the controller's ranges
    pub fn check(&self) -> Result<(), BitTimingError> {
        TIMING_RANGES.check_segments(self.sjw, self.tseg_1, self.tseg_2)?;
        TIMING_RANGES.check_prescaler(self.prescaler)
    }
}

/// Bitrate and segment lengths, the prescaler is derived from the clock of
/// the peripheral.
///
/// Default values are:
/// - sjw: 3
/// - tseg_1: 15
/// - tseg_2: 4
///
/// Default time quanta in a bit time is 20 (tseg_1 + tseg_2 + synchronization
/// segment (1)).
#[derive(Debug, Copy, Clone)]
pub struct BitTiming {
    /// Synchronization jump width
    pub sjw: u8,
    /// Propagation time and phase time before sample point
    pub tseg_1: u8,
    /// Time after sample point
    pub tseg_2: u8,
    /// Sample each bit three times
    pub triple_sampling: bool,
    /// The bitrate of the bus. This needs to be chosen so that the clock to
    /// the peripheral is divisible into time quanta such that the bit time
    /// determined by `tseg_1` and `tseg_2` is a whole number of time quanta,
    /// and the resulting prescaler is even.
    pub bitrate: HertzU32,
}

impl BitTiming {
    /// Create an instance
    ///
    /// Bitrate value must be provided, all other settings come pre-populated
    /// with default values.
    pub fn new(bitrate: HertzU32) -> Self {
        Self {
            sjw: 3,
            tseg_1: 15,
            tseg_2: 4,
            triple_sampling: false,
            bitrate,
        }
    }

    /// Returns the number of time quanta that make up one bit time, `t_bit /
    /// t_q`
    pub fn time_quanta_per_bit(&self) -> u32 {
        1 + u32::from(self.tseg_1) + u32::from(self.tseg_2)
    }

    /// Derive the register values for a peripheral clocked at
    /// `source_clock`
    pub fn timing(&self, source_clock: HertzU32) -> Result<TimingConfig, BitTimingError> {
        TIMING_RANGES.check_segments(self.sjw, self.tseg_1, self.tseg_2)?;
        let bit_time_quanta = self.time_quanta_per_bit();
        let f_q = self.bitrate.to_Hz().checked_mul(bit_time_quanta);
        match f_q {
            Some(f_q) if f_q != 0 && source_clock.to_Hz() % f_q == 0 => {
                let prescaler = source_clock.to_Hz() / f_q;
                TIMING_RANGES.check_prescaler(prescaler)?;
                Ok(TimingConfig {
                    prescaler,
                    sjw: self.sjw,
                    tseg_1: self.tseg_1,
                    tseg_2: self.tseg_2,
                    triple_sampling: self.triple_sampling,
                })
            }
            _ => Err(BitTimingError::NoValidPrescaler {
                source_clock,
                bitrate: self.bitrate,
                bit_time_quanta,
            }),
        }
    }
}

/// Misconfigurations of [`BitTiming`] and [`TimingConfig`].
#[derive(Debug)]
pub enum BitTimingError {
    /// SJW is outside the wrapped `RangeInclusive`
    SynchronizationJumpWidthOutOfRange(RangeInclusive<u32>),
    /// Time segment 1 is outside the wrapped `RangeInclusive`
    TimeSeg1OutOfRange(RangeInclusive<u32>),
    /// Time segment 2 is outside the wrapped `RangeInclusive`
    TimeSeg2OutOfRange(RangeInclusive<u32>),
    /// Prescaler is outside the wrapped `RangeInclusive`
    PrescalerOutOfRange(RangeInclusive<u32>),
    /// Prescaler is odd
    OddPrescaler(u32),
    /// No valid prescaler could be found
    ///
    /// The following requirement must be met:
    /// - `source_clock` must be divisible by `bitrate * bit_time_quanta`
    NoValidPrescaler {
        /// Provided peripheral clock
        source_clock: HertzU32,
        /// Bitrate requested in [`BitTiming`]
        bitrate: HertzU32,
        /// Time quanta per bit selected by [`BitTiming`]
        bit_time_quanta: u32,
    },
}

/// Valid values of the bus timing fields
pub(crate) struct BitTimingRanges {
    sjw: RangeInclusive<u32>,
    tseg_1: RangeInclusive<u32>,
    tseg_2: RangeInclusive<u32>,
    prescaler: RangeInclusive<u32>,
}

pub(crate) const TIMING_RANGES: BitTimingRanges = BitTimingRanges {
    sjw: 1..=4,
    tseg_1: 1..=16,
    tseg_2: 1..=8,
    prescaler: 2..=32768,
};

impl BitTimingRanges {
    fn check_segments(&self, sjw: u8, tseg_1: u8, tseg_2: u8) -> Result<(), BitTimingError> {
        if !self.sjw.contains(&sjw.into()) {
            Err(BitTimingError::SynchronizationJumpWidthOutOfRange(
                self.sjw.clone(),
            ))
        } else if !self.tseg_1.contains(&tseg_1.into()) {
            Err(BitTimingError::TimeSeg1OutOfRange(self.tseg_1.clone()))
        } else if !self.tseg_2.contains(&tseg_2.into()) {
            Err(BitTimingError::TimeSeg2OutOfRange(self.tseg_2.clone()))
        } else {
            Ok(())
        }
    }

    fn check_prescaler(&self, prescaler: u32) -> Result<(), BitTimingError> {
        if !self.prescaler.contains(&prescaler) {
            Err(BitTimingError::PrescalerOutOfRange(self.prescaler.clone()))
        } else if prescaler % 2 != 0 {
            Err(BitTimingError::OddPrescaler(prescaler))
        } else {
            Ok(())
        }
    }
}

/// Whether the controller can be programmed with `prescaler`: even and within
/// 2..=32768
pub fn validate_prescaler(prescaler: u32) -> bool {
    TIMING_RANGES.check_prescaler(prescaler).is_ok()
}
