//! Bus trait definition
//!
//! The driver talks to the chip through a byte-duplex SPI bus with a
//! separate chip-select line. This trait uses `maybe_async` to support
//! both sync and async modes:
//! - With `is_sync` feature: blocking/synchronous
//! - Without `is_sync` feature: async

use crate::error::Result;
use maybe_async::maybe_async;

/// Byte-duplex SPI bus with chip-select control (sync or async depending
/// on the `is_sync` feature)
///
/// The W25Q64JV requires SPI mode 0 (clock idle low, sample on rising
/// edge), most-significant bit first, 8-bit frames; `init` must leave the
/// bus in that configuration with chip-select deasserted.
///
/// Implementations must bound the time a single byte exchange may take
/// and report expiry as [`Error::TransportTimeout`](crate::Error); the
/// driver never converts a failed exchange into data.
#[maybe_async(AFIT)]
pub trait SpiBus {
    /// Configure the bus for the chip (mode 0, MSB first, 8-bit frames)
    fn init(&mut self) -> Result<()>;

    /// Assert chip select (drive CS low)
    fn select(&mut self);

    /// Deassert chip select (drive CS high)
    fn deselect(&mut self);

    /// Exchange one byte: shift `byte` out while shifting the reply in
    async fn transfer(&mut self, byte: u8) -> Result<u8>;

    /// Delay for the specified number of microseconds
    async fn delay_us(&mut self, us: u32);
}
