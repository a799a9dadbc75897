//! Range-level flash operations
//!
//! Callers here think in byte ranges; this module validates them against
//! the chip geometry and drives the protocol layer per page or per erase
//! unit. The caller never has to reason about page alignment.

use crate::bus::SpiBus;
use crate::chip;
use crate::error::{Error, Result};
use crate::protocol;
use maybe_async::maybe_async;

/// Write `data` starting at `addr`, splitting across page boundaries
///
/// Decomposes the request into page-bounded program operations: the first
/// chunk is capped at the distance to the next page boundary, every later
/// chunk at the 256-byte page size. Each chunk is an independent
/// page-program with its own write-enable and busy-wait - the chip's
/// write-enable latch and busy condition are per-command, so program
/// operations cannot be batched at the protocol level.
///
/// The whole range must fit on the chip (`InvalidAddress` otherwise - a
/// write never wraps), and every byte touched must already be erased;
/// erase granularity does not match write granularity, so erasing on the
/// caller's behalf is deliberately not done here. An empty `data` returns
/// Ok without any bus traffic.
#[maybe_async]
pub async fn write<B: SpiBus + ?Sized>(bus: &mut B, addr: u32, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    if !chip::contains_range(addr, data.len()) {
        return Err(Error::InvalidAddress);
    }

    log::debug!("writing {} bytes at {:#08x}", data.len(), addr);

    let mut offset = 0usize;
    let mut current_addr = addr;

    while offset < data.len() {
        let remaining = data.len() - offset;
        let chunk_len = core::cmp::min(chip::page_remaining(current_addr), remaining);

        protocol::program_page(bus, current_addr, &data[offset..offset + chunk_len]).await?;

        offset += chunk_len;
        current_addr += chunk_len as u32;
    }

    Ok(())
}

/// Range-checked read
///
/// Unlike [`protocol::read`], the whole range must fit on the chip; a
/// read that would wrap past the end of the address space is rejected
/// with `InvalidAddress`.
#[maybe_async]
pub async fn read<B: SpiBus + ?Sized>(bus: &mut B, addr: u32, buf: &mut [u8]) -> Result<()> {
    if !chip::contains_range(addr, buf.len()) {
        return Err(Error::InvalidAddress);
    }
    protocol::read(bus, addr, buf).await
}

/// Range-checked fast read (one extra dummy byte, full clock rate)
#[maybe_async]
pub async fn fast_read<B: SpiBus + ?Sized>(bus: &mut B, addr: u32, buf: &mut [u8]) -> Result<()> {
    if !chip::contains_range(addr, buf.len()) {
        return Err(Error::InvalidAddress);
    }
    protocol::fast_read(bus, addr, buf).await
}

/// Erase the sectors covering `addr..addr + len`
///
/// The range is widened to 4 KiB sector boundaries and erased with the
/// largest unit that fits at each step (64 KiB block, 32 KiB block, then
/// 4 KiB sector). Bytes inside the widened range but outside the request
/// are erased too - that is the nature of NOR erase granularity, and
/// callers that care must align their ranges.
#[maybe_async]
pub async fn erase_range<B: SpiBus + ?Sized>(bus: &mut B, addr: u32, len: usize) -> Result<()> {
    if len == 0 {
        return Ok(());
    }
    if !chip::contains_range(addr, len) {
        return Err(Error::InvalidAddress);
    }

    let start = addr & !(chip::SECTOR_SIZE - 1);
    let end = (addr + len as u32 + chip::SECTOR_SIZE - 1) & !(chip::SECTOR_SIZE - 1);
    log::debug!("erasing {:#08x}..{:#08x}", start, end);

    let mut current = start;
    while current < end {
        let remaining = end - current;
        if current % chip::BLOCK_64K_SIZE == 0 && remaining >= chip::BLOCK_64K_SIZE {
            protocol::erase_block_64k(bus, current).await?;
            current += chip::BLOCK_64K_SIZE;
        } else if current % chip::BLOCK_32K_SIZE == 0 && remaining >= chip::BLOCK_32K_SIZE {
            protocol::erase_block_32k(bus, current).await?;
            current += chip::BLOCK_32K_SIZE;
        } else {
            protocol::erase_sector_4k(bus, current).await?;
            current += chip::SECTOR_SIZE;
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(all(test, feature = "std", feature = "is_sync"))]
mod tests {
    use super::*;
    use crate::spi::opcodes;
    use std::vec;
    use std::vec::Vec;

    /// A mock bus that records every chip-select window and the bytes
    /// written inside it, and answers every read with "not busy".
    struct MockBus {
        windows: Vec<Vec<u8>>,
        current: Option<Vec<u8>>,
        selected: bool,
    }

    impl MockBus {
        fn new() -> Self {
            Self {
                windows: Vec::new(),
                current: None,
                selected: false,
            }
        }

        /// (address, data length) of every page-program window, in order
        fn program_calls(&self) -> Vec<(u32, usize)> {
            self.windows
                .iter()
                .filter(|w| w.first() == Some(&opcodes::PP))
                .map(|w| {
                    let addr = ((w[1] as u32) << 16) | ((w[2] as u32) << 8) | w[3] as u32;
                    (addr, w.len() - 4)
                })
                .collect()
        }

        /// (opcode, address) of every erase window, in order
        fn erase_calls(&self) -> Vec<(u8, u32)> {
            self.windows
                .iter()
                .filter(|w| {
                    matches!(
                        w.first(),
                        Some(&opcodes::SE) | Some(&opcodes::BE_32K) | Some(&opcodes::BE_64K)
                    )
                })
                .map(|w| {
                    let addr = ((w[1] as u32) << 16) | ((w[2] as u32) << 8) | w[3] as u32;
                    (w[0], addr)
                })
                .collect()
        }

        fn write_enable_count(&self) -> usize {
            self.windows
                .iter()
                .filter(|w| w.first() == Some(&opcodes::WREN))
                .count()
        }
    }

    impl SpiBus for MockBus {
        fn init(&mut self) -> crate::Result<()> {
            Ok(())
        }

        fn select(&mut self) {
            assert!(!self.selected, "select while already selected");
            self.selected = true;
            self.current = Some(Vec::new());
        }

        fn deselect(&mut self) {
            self.selected = false;
            if let Some(window) = self.current.take() {
                self.windows.push(window);
            }
        }

        fn transfer(&mut self, byte: u8) -> crate::Result<u8> {
            let window = self
                .current
                .as_mut()
                .expect("transfer outside a chip-select window");
            window.push(byte);
            // Status polls see an idle chip
            Ok(0x00)
        }

        fn delay_us(&mut self, _us: u32) {}
    }

    #[test]
    fn write_splits_at_page_boundary() {
        let mut bus = MockBus::new();
        let data = vec![0xAB; 300];
        write(&mut bus, 0x1000, &data).unwrap();
        assert_eq!(bus.program_calls(), vec![(0x1000, 256), (0x1100, 44)]);
    }

    #[test]
    fn write_aligned_multiple_of_page() {
        let mut bus = MockBus::new();
        let data = vec![0x55; 512];
        write(&mut bus, 0x2000, &data).unwrap();
        assert_eq!(bus.program_calls(), vec![(0x2000, 256), (0x2100, 256)]);
    }

    #[test]
    fn write_short_is_single_call() {
        let mut bus = MockBus::new();
        write(&mut bus, 0x0, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(bus.program_calls(), vec![(0x0, 6)]);
    }

    #[test]
    fn write_unaligned_start_caps_first_chunk() {
        let mut bus = MockBus::new();
        let data = vec![0x11; 32];
        write(&mut bus, 0x10F0, &data).unwrap();
        assert_eq!(bus.program_calls(), vec![(0x10F0, 16), (0x1100, 16)]);
    }

    #[test]
    fn write_enables_once_per_chunk() {
        let mut bus = MockBus::new();
        let data = vec![0x00; 512];
        write(&mut bus, 0x2000, &data).unwrap();
        assert_eq!(bus.write_enable_count(), 2);
    }

    #[test]
    fn write_empty_touches_nothing() {
        let mut bus = MockBus::new();
        write(&mut bus, 0x1000, &[]).unwrap();
        assert!(bus.windows.is_empty());
    }

    #[test]
    fn write_out_of_range_touches_nothing() {
        let mut bus = MockBus::new();
        assert_eq!(
            write(&mut bus, chip::TOTAL_SIZE, &[0]),
            Err(Error::InvalidAddress)
        );
        assert_eq!(
            write(&mut bus, chip::MAX_ADDRESS, &[0, 0]),
            Err(Error::InvalidAddress)
        );
        assert!(bus.windows.is_empty());
    }

    #[test]
    fn read_rejects_wrapping_range() {
        let mut bus = MockBus::new();
        let mut buf = [0u8; 2];
        assert_eq!(
            read(&mut bus, chip::MAX_ADDRESS, &mut buf),
            Err(Error::InvalidAddress)
        );
        assert!(bus.windows.is_empty());
    }

    #[test]
    fn erase_range_uses_largest_fitting_unit() {
        let mut bus = MockBus::new();
        erase_range(&mut bus, 0, 68 * 1024).unwrap();
        assert_eq!(
            bus.erase_calls(),
            vec![(opcodes::BE_64K, 0), (opcodes::SE, 0x10000)]
        );
    }

    #[test]
    fn erase_range_widens_to_sector_boundaries() {
        let mut bus = MockBus::new();
        erase_range(&mut bus, 0x1800, 0x1000).unwrap();
        assert_eq!(
            bus.erase_calls(),
            vec![(opcodes::SE, 0x1000), (opcodes::SE, 0x2000)]
        );
    }

    #[test]
    fn erase_range_mixes_units() {
        let mut bus = MockBus::new();
        // 0x8000..0x18000: 32 KiB block, then 64 KiB block
        erase_range(&mut bus, 0x8000, 0x10000).unwrap();
        assert_eq!(
            bus.erase_calls(),
            vec![(opcodes::BE_32K, 0x8000), (opcodes::BE_64K, 0x10000)]
        );
    }
}
