#![no_std]
#![warn(missing_docs)]

//! `twai-core` provides a set of essential abstractions that serve as a thin
//! integration layer between the platform independent [`twai`] crate and
//! platform specific HAL crates (in documentation also referred to as _target
//! HALs_).
//!
//! Traits from this crate are not supposed to be implemented by the
//! application developer; implementations should be provided by target HALs.
//!
//! Integrators of this crate into any given target HAL are responsible for
//! soundness of trait implementations and conforming to their respective safety
//! prerequisites.
//!
//! [`twai`]: <https://docs.rs/crate/twai/>

pub mod time;

pub use critical_section::CriticalSection;
pub use fugit;

/// Trait representing TWAI peripheral identity
///
/// Types implementing this trait are expected to be used as marker types that
/// identify a specific instance of the TWAI peripheral available on the
/// platform (as there might be more than one). It only conveys *where* the
/// TWAI register block is located, not that it can be accessed. The latter
/// is expressed by the [`Dependencies`] trait.
///
/// # Safety
/// `TwaiId::ADDRESS` points to the start of a valid TWAI register block.
///
/// # Examples
/// ```no_run
/// use twai_core::TwaiId;
///
/// pub enum Twai0 {}
///
/// unsafe impl TwaiId for Twai0 {
///     const ADDRESS: *const () = 0x500D_7000 as *const _;
/// }
/// ```
pub unsafe trait TwaiId {
    /// Static address of the register block controlling this TWAI instance
    const ADDRESS: *const ();
}

/// Trait representing TWAI peripheral dependencies
///
/// Structs implementing [`Dependencies`] should
/// - enclose all object representable dependencies of [`TwaiId`] and release
///   them upon destruction
/// - be constructible only when it is safe and sound to interact with the
///   TWAI peripheral (bus clock enabled, reset line released, function clock
///   running and pins routed)
/// - be a singleton (only a single instance of [`Dependencies`] for a specific
///   [`TwaiId`] must exist at the same time)
///
/// in order to prevent aliasing and guarantee that the abstractions provided
/// by [`twai`] are sole owners of the peripheral.
///
/// # Safety
/// While a [`Dependencies`] instance exists
/// - the TWAI function clock must not change
/// - TWAI related pin modes must not change
/// - the register block must not be accessible through other parts of the
///   target HAL
///
/// [`twai`]: <https://docs.rs/crate/twai/>
pub unsafe trait Dependencies<Id: TwaiId> {
    /// Frequency of the clock selected as the TWAI source clock.
    ///
    /// The bit rate prescaler divides this clock into time quanta.
    fn source_clock(&self) -> fugit::HertzU32;
}

/// Clock feeding the TWAI function clock
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// External crystal oscillator
    Xtal,
    /// Internal fast RC oscillator
    RcFast,
}

/// Control over the clock and reset lines of one TWAI instance.
///
/// The underlying bits usually live in a clock/reset controller shared by all
/// TWAI instances on the chip (and often by other peripherals too). Every
/// method therefore takes a [`CriticalSection`] token: holding one proves that
/// no other context modifies the shared clock-control registers at the same
/// time. Use `critical_section::with` to obtain it.
///
/// Implementations are provided by target HALs, one per TWAI instance.
pub trait ClockControl {
    /// Gate the bus (register interface) clock of the instance.
    fn enable_bus_clock(&mut self, cs: CriticalSection<'_>, enable: bool);

    /// Pulse the reset line of the instance (assert, then release).
    fn reset_register(&mut self, cs: CriticalSection<'_>);

    /// Gate the function clock of the instance.
    fn enable_clock(&mut self, cs: CriticalSection<'_>, enable: bool);

    /// Select which clock feeds the function clock of the instance.
    fn set_clock_source(&mut self, cs: CriticalSection<'_>, source: ClockSource);
}
