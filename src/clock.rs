//! Power sequencing of a TWAI instance
//!
//! Helpers for target HALs building their [`Dependencies`] implementation on
//! top of a [`ClockControl`].
//!
//! [`Dependencies`]: twai_core::Dependencies

use twai_core::{ClockControl, ClockSource, CriticalSection};

/// Power up the instance: bus clock, register reset, function clock source
/// and function clock, in that order.
pub fn enable<C: ClockControl>(control: &mut C, source: ClockSource, cs: CriticalSection<'_>) {
    control.enable_bus_clock(cs, true);
    control.reset_register(cs);
    control.set_clock_source(cs, source);
    control.enable_clock(cs, true);
    debug!("clock enabled, source {}", source);
}

/// Power down the instance in the reverse order of [`enable`]
pub fn disable<C: ClockControl>(control: &mut C, cs: CriticalSection<'_>) {
    control.enable_clock(cs, false);
    control.enable_bus_clock(cs, false);
}

#[cfg(test)]
mod test {
    extern crate std;

    use super::*;
    use std::vec::Vec;

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        BusClock(bool),
        Reset,
        Clock(bool),
        Source(ClockSource),
    }

    #[derive(Default)]
    struct Recorder(Vec<Call>);

    impl ClockControl for Recorder {
        fn enable_bus_clock(&mut self, _: CriticalSection<'_>, enable: bool) {
            self.0.push(Call::BusClock(enable));
        }

        fn reset_register(&mut self, _: CriticalSection<'_>) {
            self.0.push(Call::Reset);
        }

        fn enable_clock(&mut self, _: CriticalSection<'_>, enable: bool) {
            self.0.push(Call::Clock(enable));
        }

        fn set_clock_source(&mut self, _: CriticalSection<'_>, source: ClockSource) {
            self.0.push(Call::Source(source));
        }
    }

    #[test]
    fn enable_then_disable() {
        let mut control = Recorder::default();
        critical_section::with(|cs| enable(&mut control, ClockSource::Xtal, cs));
        critical_section::with(|cs| disable(&mut control, cs));
        assert_eq!(
            control.0,
            [
                Call::BusClock(true),
                Call::Reset,
                Call::Source(ClockSource::Xtal),
                Call::Clock(true),
                Call::Clock(false),
                Call::BusClock(false),
            ]
        );
    }
}
