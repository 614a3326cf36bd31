//! Driver for the ambient-attx4 light/sound sensing module.
//!
//! The module hangs off a synchronous serial bus and echoes every command's
//! leading bytes back, which the driver uses as a structural integrity check.
//! See [`Ambient`] for the consumer-facing surface.

pub mod device;
pub mod error;
pub mod events;
pub mod frame;
pub mod hal;
pub mod sim;
pub mod transport;

mod monitor;
mod poller;

pub use device::{Ambient, AmbientConfig, Hardware};
pub use error::AmbientError;
pub use events::{Channel, Subscription};
