//! Typestate driver of the TWAI bus

use crate::config::{BitTimingError, TwaiConfig};
use crate::controller::{Commands, Controller, TransmitCommand};
use crate::interrupt::InterruptSet;
use crate::message::{Frame, FrameBuffer};
use crate::reg::{Mmio, Registers};
use crate::status::{self, ErrorCapture, ErrorCounters, StatusSet};
use fugit::HertzU32;
use twai_core::{Dependencies, TwaiId};

/// Errors that may occur during configuration
#[derive(Debug)]
pub enum ConfigurationError {
    /// Problems with the bit timing configuration
    BitTiming(BitTimingError),
}

impl From<BitTimingError> for ConfigurationError {
    fn from(value: BitTimingError) -> Self {
        Self::BitTiming(value)
    }
}

/// Errors of the non-blocking transmit and receive operations
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The controller is bus-off. Start the recovery with
    /// [`Twai::start_bus_recovery`].
    BusOff,
    /// The controller is in reset mode and not participating in bus
    /// activity, e.g. during bus-off recovery.
    ResetMode,
}

impl embedded_can::Error for Error {
    fn kind(&self) -> embedded_can::ErrorKind {
        embedded_can::ErrorKind::Other
    }
}

impl From<status::ErrorKind> for embedded_can::ErrorKind {
    fn from(value: status::ErrorKind) -> Self {
        match value {
            status::ErrorKind::Bit => Self::Bit,
            status::ErrorKind::Form => Self::Form,
            status::ErrorKind::Stuff => Self::Stuff,
            status::ErrorKind::Other => Self::Other,
        }
    }
}

/// Bus recovery can only be started while bus-off
#[derive(Debug)]
pub struct NotBusOff;

/// Common TWAI bus functionality
pub trait TwaiBus {
    /// Read error counters
    fn error_counters(&self) -> ErrorCounters;
    /// Read the status register
    fn status(&self) -> StatusSet;
    /// Number of frames waiting in the receive FIFO
    fn rx_message_count(&self) -> u8;
}

/// A TWAI bus in operating mode. A bus-off condition asynchronously puts the
/// controller back in reset mode, which requires
/// [`Twai::start_bus_recovery`] to rejoin the bus.
pub struct Twai<D, R> {
    /// Implementation details. The field is public to allow destructuring.
    pub internals: Internals<D, R>,
}

/// Implementation details.
pub struct Internals<D, R> {
    controller: Controller<R>,
    dependencies: D,
    config: TwaiConfig,
}

/// A TWAI bus in reset mode. Before frames can be sent and received, it
/// needs to be [`Self::finalize`]d.
pub struct TwaiConfigurable<D, R>(
    /// The type invariant of operating mode is broken while this is wrapped.
    Twai<D, R>,
);

impl<Id: TwaiId, D: Dependencies<Id>> TwaiConfigurable<D, Mmio<Id>> {
    /// Create a new TWAI bus on the memory mapped peripheral `Id`.
    ///
    /// The returned bus is in reset mode; use [`Self::finalize`] to finish
    /// configuration and start transmitting and receiving.
    pub fn new(bitrate: HertzU32, dependencies: D) -> Self {
        // Safety: `dependencies` implies ownership of the register block
        // pointed to by `Id: TwaiId`, so `regs` has unique access to it.
        let regs = unsafe { Mmio::<Id>::new() };
        Self::with_registers(bitrate, dependencies, regs)
    }
}

impl<D: Dependencies<R::Id>, R: Registers> TwaiConfigurable<D, R> {
    /// Create a new TWAI bus on top of an arbitrary register implementation
    pub fn with_registers(bitrate: HertzU32, dependencies: D, regs: R) -> Self {
        Twai {
            internals: Internals {
                controller: Controller::new(regs),
                dependencies,
                config: TwaiConfig::new(bitrate),
            },
        }
        .configure()
    }

    /// Raw access to the registers.
    ///
    /// # Safety
    /// The abstraction assumes that it has exclusive ownership of the
    /// registers. Direct access can break such assumptions.
    pub unsafe fn registers(&self) -> &R {
        self.0.registers()
    }

    /// Allows changing the configuration applied by [`Self::finalize`]
    pub fn config(&mut self) -> &mut TwaiConfig {
        &mut self.0.internals.config
    }

    /// Preset the error counters, e.g. to restore them after a reset
    pub fn set_error_counters(&mut self, counters: ErrorCounters) {
        let controller = &mut self.0.internals.controller;
        controller.set_tx_error_count(counters.tec);
        controller.set_rx_error_count(counters.rec);
    }

    /// Apply parameters from the config struct
    fn apply_config(&mut self) -> Result<(), ConfigurationError> {
        let internals = &mut self.0.internals;
        let config = &internals.config;
        let controller = &mut internals.controller;

        let timing = config
            .timing
            .resolve(internals.dependencies.source_clock())?;
        trace!(
            "bus timing: prescaler {=u32}, sjw {=u8}, tseg {=u8}/{=u8}",
            timing.prescaler,
            timing.sjw,
            timing.tseg_1,
            timing.tseg_2
        );

        controller.set_mode(config.mode.listen_only(), config.mode.no_ack());
        controller.set_bus_timing(
            timing.prescaler,
            timing.sjw,
            timing.tseg_1,
            timing.tseg_2,
            timing.triple_sampling,
        );
        controller.set_filter(&config.filter);
        controller.set_error_warning_limit(config.error_warning_limit);
        match config.clock_out {
            Some(divider) => controller.set_clkout(divider),
            None => controller.disable_clkout(),
        }
        controller.set_enabled_interrupts(config.interrupts);

        // Re-arm captures and drop flags latched before this configuration
        controller.decode_error_capture();
        controller.clear_arbitration_lost_capture();
        controller.read_and_clear_interrupts();
        Ok(())
    }

    /// Locks the configuration and enters operating mode.
    pub fn finalize(mut self) -> Result<Twai<D, R>, ConfigurationError> {
        self.apply_config()?;

        let mut twai = self.0;
        twai.internals.controller.exit_reset_mode();
        debug!("entered operating mode");

        Ok(twai)
    }
}

impl<D: Dependencies<R::Id>, R: Registers> Twai<D, R> {
    /// Raw access to the registers.
    ///
    /// # Safety
    /// The abstraction assumes that it has exclusive ownership of the
    /// registers. Direct access can break such assumptions.
    pub unsafe fn registers(&self) -> &R {
        self.internals.controller.registers()
    }

    /// Enter reset mode to change the configuration
    pub fn configure(mut self) -> TwaiConfigurable<D, R> {
        self.internals.controller.enter_reset_mode();
        TwaiConfigurable(self)
    }

    /// Enter reset mode and return the parts
    pub fn free(mut self) -> (D, R) {
        self.internals.controller.enter_reset_mode();
        let Internals {
            controller,
            dependencies,
            ..
        } = self.internals;
        (dependencies, controller.free())
    }

    /// Configuration the bus was finalized with
    pub fn config(&self) -> &TwaiConfig {
        &self.internals.config
    }

    fn check_operating(&self, status: StatusSet) -> Result<(), Error> {
        if status.bs() {
            Err(Error::BusOff)
        } else if self.internals.controller.is_in_reset_mode() {
            Err(Error::ResetMode)
        } else {
            Ok(())
        }
    }

    /// Place `frame` in the transmit buffer and request its transmission.
    ///
    /// The single-shot and self-reception flags of `frame` select the
    /// transmit command. Returns `WouldBlock` while the previous transmission
    /// still occupies the buffer.
    pub fn transmit(&mut self, frame: &Frame) -> nb::Result<(), Error> {
        let status = self.status();
        self.check_operating(status)?;
        if !status.tbs() {
            return Err(nb::Error::WouldBlock);
        }
        let controller = &mut self.internals.controller;
        controller.write_tx_buffer(&FrameBuffer::from_frame(frame));
        controller.transmit_with(TransmitCommand::for_flags(frame.flags()));
        Ok(())
    }

    /// Abort a pending transmission
    pub fn abort_transmit(&mut self) {
        self.internals.controller.abort_transmit();
    }

    /// Take the oldest frame out of the receive FIFO.
    ///
    /// A data overrun is cleared together with the buffer release.
    pub fn receive(&mut self) -> nb::Result<Frame, Error> {
        let status = self.status();
        self.check_operating(status)?;
        if !status.rbs() {
            return Err(nb::Error::WouldBlock);
        }
        if status.dos() {
            warn!("receive FIFO overrun, frames were lost");
        }
        let controller = &mut self.internals.controller;
        let buffer = controller.read_rx_buffer();
        controller.issue(Commands {
            release_receive_buffer: true,
            clear_data_overrun: status.dos(),
            ..Default::default()
        });
        Ok(buffer.to_frame())
    }

    /// Read and clear the interrupt flags. The receive flag stays set until
    /// the receive FIFO is empty.
    pub fn interrupt_flags(&mut self) -> InterruptSet {
        self.internals.controller.read_and_clear_interrupts()
    }

    /// Read the last bus error and re-arm the bus error interrupt
    pub fn error_capture(&mut self) -> ErrorCapture {
        let capture = self.internals.controller.decode_error_capture();
        trace!("bus error: {}", capture);
        capture
    }

    /// Re-arm the arbitration lost interrupt. Returns the bit position at
    /// which arbitration was lost.
    pub fn clear_arbitration_lost(&mut self) -> u8 {
        self.internals.controller.clear_arbitration_lost_capture()
    }

    /// The controller is bus-off
    pub fn is_bus_off(&self) -> bool {
        self.status().bs()
    }

    /// The controller is in reset mode, after bus-off or during recovery
    pub fn is_in_reset_mode(&self) -> bool {
        self.internals.controller.is_in_reset_mode()
    }

    /// Start the bus-off recovery sequence.
    ///
    /// The controller rejoins the bus after monitoring 128 occurrences of 11
    /// consecutive recessive bits; [`Self::is_bus_off`] turns false then.
    pub fn start_bus_recovery(&mut self) -> Result<(), NotBusOff> {
        if !self.is_bus_off() {
            return Err(NotBusOff);
        }
        debug!("starting bus-off recovery");
        self.internals.controller.exit_reset_mode();
        Ok(())
    }
}

impl<D: Dependencies<R::Id>, R: Registers> TwaiBus for Twai<D, R> {
    fn error_counters(&self) -> ErrorCounters {
        self.internals.controller.error_counters()
    }

    fn status(&self) -> StatusSet {
        self.internals.controller.read_status()
    }

    fn rx_message_count(&self) -> u8 {
        self.internals.controller.rx_message_count()
    }
}

impl<D: Dependencies<R::Id>, R: Registers> embedded_can::nb::Can for Twai<D, R> {
    type Frame = Frame;
    type Error = Error;

    fn transmit(&mut self, frame: &Frame) -> nb::Result<Option<Frame>, Error> {
        Twai::transmit(self, frame).map(|()| None)
    }

    fn receive(&mut self) -> nb::Result<Frame, Error> {
        Twai::receive(self)
    }
}
