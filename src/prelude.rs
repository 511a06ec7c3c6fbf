//! Traits needed to use the bus, imported anonymously
pub use crate::bus::TwaiBus as _;
pub use crate::reg::Registers as _;
pub use embedded_can::Frame as _;
pub use twai_core::time::SystemTime as _;
