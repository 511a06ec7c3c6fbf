//! System time source
//!
//! Platforms differ in which hardware timer backs the system time. Instead of
//! overriding a symbol at link time, a target HAL implements [`SystemTime`]
//! directly, or wraps its RTC counter in [`RtcSystemTime`], the default
//! implementation.

use fugit::HertzU32;

/// Monotonic time since boot.
pub trait SystemTime {
    /// Microseconds elapsed since boot.
    fn now_us(&self) -> i64;

    /// Resolution of [`Self::now_us`] in nanoseconds.
    fn resolution_ns(&self) -> u32;
}

/// Free running RTC counter clocked by the slow clock.
pub trait RtcClock {
    /// Current RTC time in microseconds.
    fn rtc_time_us(&self) -> u64;

    /// Frequency of the slow clock driving the RTC counter.
    fn slow_clock(&self) -> HertzU32;
}

/// Default [`SystemTime`] built on top of an [`RtcClock`].
///
/// Time is measured relative to the RTC reading captured at startup.
#[derive(Debug, Clone)]
pub struct RtcSystemTime<R> {
    rtc: R,
    startup_us: u64,
}

impl<R: RtcClock> RtcSystemTime<R> {
    /// Create a time source that counts from `startup_us`, the RTC time
    /// captured when the system started.
    pub fn new(rtc: R, startup_us: u64) -> Self {
        Self { rtc, startup_us }
    }

    /// Create a time source that counts from the current RTC time.
    pub fn starting_now(rtc: R) -> Self {
        let startup_us = rtc.rtc_time_us();
        Self { rtc, startup_us }
    }

    /// Release the underlying RTC.
    pub fn free(self) -> R {
        self.rtc
    }
}

impl<R: RtcClock> SystemTime for RtcSystemTime<R> {
    fn now_us(&self) -> i64 {
        self.rtc.rtc_time_us().wrapping_sub(self.startup_us) as i64
    }

    fn resolution_ns(&self) -> u32 {
        match self.rtc.slow_clock().to_Hz() {
            0 => 0,
            hz => 1_000_000_000 / hz,
        }
    }
}
