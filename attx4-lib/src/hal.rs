//! Hardware capabilities the driver consumes.
//!
//! Digital outputs (reset, chip select) use [`embedded_hal::digital::OutputPin`].
//! The byte-exchange and edge-wait capabilities are crate-local traits whose
//! futures carry a `Send` bound so driver tasks can be spawned on tokio; the
//! `embedded-hal-async` equivalents are plain `async fn`s without one.

use std::future::Future;

pub use embedded_hal::digital::OutputPin;

/// Full-duplex byte exchange over a synchronous serial bus.
pub trait SpiExchange: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Clock `write` out while filling `read`; the two slices have equal
    /// length. Chip select is handled by the caller, not the bus.
    fn transfer(
        &mut self,
        read: &mut [u8],
        write: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// A digital input that can be awaited for a low-to-high transition.
pub trait EdgeInput: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Resolve on the next rising edge. A level that is already high does
    /// not count; the line must transition while being watched.
    fn wait_for_rising_edge(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
