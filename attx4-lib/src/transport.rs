//! Chip-select-bracketed exchanges on the serial bus.

use std::time::Duration;

use tokio::time::timeout;
use tracing::trace;

use crate::error::AmbientError;
use crate::hal::{OutputPin, SpiExchange};

// Generous for a handful of bytes at the module's 50 kHz clock.
const EXCHANGE_TIMEOUT: Duration = Duration::from_millis(500);

/// Owns the bus handle and the chip-select line. Knows nothing about the
/// protocol; retry policy lives with the caller.
pub struct Transport<SPI, CS> {
    spi: SPI,
    chip_select: CS,
}

impl<SPI, CS> Transport<SPI, CS>
where
    SPI: SpiExchange,
    CS: OutputPin,
{
    pub fn new(spi: SPI, mut chip_select: CS) -> Self {
        // Deasserted until the first exchange.
        let _ = chip_select.set_high();
        Transport { spi, chip_select }
    }

    /// One full-duplex exchange: assert chip select, transfer, deassert.
    /// Every byte sent induces one byte received, so the response has the
    /// same length as the outgoing frame. Chip select is released even when
    /// the transfer fails, and is never held across exchanges.
    pub async fn exchange(&mut self, tx: &[u8]) -> Result<Vec<u8>, AmbientError> {
        let mut rx = vec![0u8; tx.len()];

        let _ = self.chip_select.set_low();
        let result = timeout(EXCHANGE_TIMEOUT, self.spi.transfer(&mut rx, tx)).await;
        let _ = self.chip_select.set_high();

        result?.map_err(AmbientError::transport)?;
        trace!(tx = ?tx, rx = ?rx, "bus exchange");
        Ok(rx)
    }
}
