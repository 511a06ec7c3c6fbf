#![no_std]
#![warn(missing_docs)]
//! # TWAI
//!
//! ## Overview
//! This crate provides a platform-agnostic HAL for the TWAI controller, the
//! CAN 2.0 compatible controller found in ESP chips.
//!
//! It provides the following features:
//!
//! - classic CAN frames with standard and extended identifiers, remote
//!   frames and non-compliant data length codes on reception
//! - single-shot transmission and self-reception requests
//! - bit timing derived from a bitrate or given as raw register values
//! - single and dual acceptance filter programming
//! - status, interrupt, error counter and bus error capture inspection
//! - bus-off detection and recovery
//! - an [`embedded_can::nb::Can`] implementation
//!
//! The controller is a memory-mapped peripheral with a 13 byte window that
//! holds the transmit buffer, the front of the receive FIFO or (in reset
//! mode) the acceptance filter. Clocks, resets and pins are outside the
//! scope of this crate: target HALs express them through the
//! [`twai_core`] traits, whose safety requirements guarantee a correct state
//! of the peripheral during operation.
//!
//! In order to use TWAI, one has to instantiate [`TwaiConfigurable`] and
//! [`finalize`] it. Its constructor requires an instance of a
//! [`Dependencies`] implementing struct and holds onto it until the bus is
//! [`freed`].
//!
//! ## Layers
//!
//! - [`message`]: frames and their hardware buffer layout
//! - [`controller`]: register-level operations, one method per register
//!   access pattern, without caching or state
//! - [`bus`]: typestate driver built on the controller that upholds the
//!   reset mode preconditions
//!
//! Register access goes through [`reg::Registers`], implemented for memory
//! mapped I/O by [`reg::Mmio`].
//!
//! ## General usage example
//!
//! ```no_run
//! # use fugit::RateExtU32 as _;
//! # pub enum Twai0 {}
//! # unsafe impl twai::core::TwaiId for Twai0 {
//! #     const ADDRESS: *const () = 0x6002_b000 as *const _;
//! # }
//! # pub struct Dependencies(());
//! # unsafe impl twai::core::Dependencies<Twai0> for Dependencies {
//! #     fn source_clock(&self) -> fugit::HertzU32 { 80.MHz() }
//! # }
//! use twai::bus::TwaiConfigurable;
//! use twai::config::Mode;
//! use twai::embedded_can::{Frame as _, StandardId};
//! use twai::filter::AcceptanceFilter;
//! use twai::message::Frame;
//! use twai::prelude::*;
//! use twai::reg::Mmio;
//!
//! let mut twai =
//!     TwaiConfigurable::<_, Mmio<Twai0>>::new(500.kHz(), Dependencies(()));
//!
//! // The controller is in reset mode and the config struct can be modified.
//! // More information can be found in the `twai::config` module.
//! twai.config().mode = Mode::Normal;
//! twai.config().filter = AcceptanceFilter::standard(StandardId::new(0x100).unwrap());
//!
//! // Call to `finalize` puts the controller into operating mode
//! let mut twai = twai.finalize().unwrap();
//!
//! let frame = Frame::new(StandardId::new(0x100).unwrap(), &[1, 2, 3]).unwrap();
//! nb::block!(twai.transmit(&frame)).unwrap();
//!
//! let interrupts = twai.interrupt_flags();
//! if interrupts.bei() {
//!     let _capture = twai.error_capture();
//! }
//! if interrupts.ri() {
//!     let _frame = nb::block!(twai.receive()).unwrap();
//! }
//! if twai.is_bus_off() {
//!     twai.start_bus_recovery().unwrap();
//! }
//! let _counters = twai.error_counters();
//! ```
//!
//! [`TwaiConfigurable`]: crate::bus::TwaiConfigurable
//! [`finalize`]: crate::bus::TwaiConfigurable::finalize
//! [`freed`]: crate::bus::Twai::free
//! [`Dependencies`]: twai_core::Dependencies

#[macro_use]
mod fmt;

pub mod bus;
pub mod clock;
pub mod config;
pub mod controller;
pub mod filter;
pub mod interrupt;
pub mod message;
pub mod prelude;
pub mod reg;
pub mod status;

pub use embedded_can;
pub use twai_core as core;
