//! W25Q64JV protocol implementation
//!
//! This module implements the chip's command sequences over a byte-duplex
//! [`SpiBus`]: chip-select framing, 24-bit MSB-first address encoding, and
//! the write-enable/busy handshake that guards every program and erase.
//!
//! Uses `maybe_async` to support both sync and async modes:
//! - With `is_sync` feature: blocking/synchronous
//! - Without `is_sync` feature: async
//!
//! Program and erase operations block on a *bounded* completion barrier:
//! the status register is polled inside one chip-select window until the
//! busy bit clears or the per-operation deadline from [`crate::chip`]
//! expires, in which case the operation fails with `DeviceNotReady`.

use crate::bus::SpiBus;
use crate::chip::{self, PollTiming};
use crate::error::{Error, Result};
use crate::spi::{opcodes, SpiCommand};
use maybe_async::maybe_async;

bitflags::bitflags! {
    /// Status register 1 bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status1: u8 {
        /// Erase or program in progress
        const BUSY = 1 << 0;
        /// Write enable latch
        const WEL  = 1 << 1;
        /// Block protect bits
        const BP   = 0b0001_1100;
        /// Top/bottom protect
        const TB   = 1 << 5;
        /// Sector/block protect
        const SEC  = 1 << 6;
        /// Status register protect
        const SRP  = 1 << 7;
    }
}

/// Prepare the bus for the chip and leave chip-select deasserted
///
/// Must be called once before any other operation.
pub fn init<B: SpiBus + ?Sized>(bus: &mut B) -> Result<()> {
    bus.init()?;
    bus.deselect();
    Ok(())
}

/// Execute a single SPI command
///
/// Asserts chip select, clocks the opcode/address/dummy/data phases, and
/// deasserts chip select on every exit path, so a transport failure never
/// leaves the chip mid-command.
#[maybe_async]
pub async fn execute<B: SpiBus + ?Sized>(bus: &mut B, cmd: &mut SpiCommand<'_>) -> Result<()> {
    log::trace!(
        "opcode {:#04x}, {} bytes on the wire",
        cmd.opcode,
        cmd.total_bytes()
    );
    bus.select();
    let result = run_selected(bus, cmd).await;
    bus.deselect();
    result
}

#[maybe_async]
async fn run_selected<B: SpiBus + ?Sized>(bus: &mut B, cmd: &mut SpiCommand<'_>) -> Result<()> {
    bus.transfer(cmd.opcode).await?;
    if let Some(addr) = cmd.address {
        bus.transfer((addr >> 16) as u8).await?;
        bus.transfer((addr >> 8) as u8).await?;
        bus.transfer(addr as u8).await?;
    }
    for _ in 0..cmd.dummy_bytes {
        bus.transfer(0xFF).await?;
    }
    for &byte in cmd.write_data {
        bus.transfer(byte).await?;
    }
    for byte in cmd.read_buf.iter_mut() {
        *byte = bus.transfer(0xFF).await?;
    }
    Ok(())
}

/// Send the Write Enable command
///
/// The chip clears the latch itself once the following program/erase
/// completes, so this must precede every single one of them.
#[maybe_async]
pub async fn write_enable<B: SpiBus + ?Sized>(bus: &mut B) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WREN);
    execute(bus, &mut cmd).await
}

/// Read status register 1
#[maybe_async]
pub async fn read_status1<B: SpiBus + ?Sized>(bus: &mut B) -> Result<Status1> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read_reg(opcodes::RDSR1, &mut buf);
    execute(bus, &mut cmd).await?;
    Ok(Status1::from_bits_retain(buf[0]))
}

/// Wait for the busy bit to clear, bounded by `timing`
///
/// The whole poll loop runs inside a single chip-select window: the
/// status opcode is sent once and the register is then clocked out
/// repeatedly. Gives up with `DeviceNotReady` after
/// `timeout_us / poll_delay_us` polls.
#[maybe_async]
pub async fn wait_ready<B: SpiBus + ?Sized>(bus: &mut B, timing: PollTiming) -> Result<()> {
    bus.select();
    let result = poll_until_ready(bus, timing).await;
    bus.deselect();
    result
}

#[maybe_async]
async fn poll_until_ready<B: SpiBus + ?Sized>(bus: &mut B, timing: PollTiming) -> Result<()> {
    bus.transfer(opcodes::RDSR1).await?;

    let max_polls = if timing.poll_delay_us > 0 {
        timing.timeout_us / timing.poll_delay_us
    } else {
        // Fall back to polling once per microsecond
        timing.timeout_us
    };

    for _ in 0..max_polls {
        let status = bus.transfer(0xFF).await?;
        if status & Status1::BUSY.bits() == 0 {
            return Ok(());
        }
        bus.delay_us(timing.poll_delay_us).await;
    }

    Err(Error::DeviceNotReady)
}

/// Read the factory-programmed 64-bit unique ID
///
/// Four dummy bytes of protocol latency, then 8 ID bytes assembled
/// most-significant byte first.
#[maybe_async]
pub async fn read_unique_id<B: SpiBus + ?Sized>(bus: &mut B) -> Result<u64> {
    let mut bytes = [0u8; 8];
    let mut cmd = SpiCommand::read_reg(opcodes::RDUID, &mut bytes).with_dummy_bytes(4);
    execute(bus, &mut cmd).await?;

    let mut id = 0u64;
    for &byte in &bytes {
        id = (id << 8) | byte as u64;
    }
    Ok(id)
}

/// Read data starting at `addr`
///
/// The chip auto-increments its internal address and wraps at the end of
/// the address space, so only the start address is validated here; use
/// [`crate::flash::read`] for a range-checked read.
#[maybe_async]
pub async fn read<B: SpiBus + ?Sized>(bus: &mut B, addr: u32, buf: &mut [u8]) -> Result<()> {
    if !chip::contains_address(addr) {
        return Err(Error::InvalidAddress);
    }
    let mut cmd = SpiCommand::read(opcodes::READ, addr, buf);
    execute(bus, &mut cmd).await
}

/// Read data starting at `addr` using the fast-read command
///
/// Same contract as [`read`], with one dummy byte after the address to
/// satisfy the chip's latency at full clock rate.
#[maybe_async]
pub async fn fast_read<B: SpiBus + ?Sized>(bus: &mut B, addr: u32, buf: &mut [u8]) -> Result<()> {
    if !chip::contains_address(addr) {
        return Err(Error::InvalidAddress);
    }
    let mut cmd = SpiCommand::read(opcodes::FAST_READ, addr, buf).with_dummy_bytes(1);
    execute(bus, &mut cmd).await
}

/// Program 1-256 bytes into previously erased locations
///
/// The target bytes must have been erased since their last program; the
/// chip can only clear bits. Data must not cross a page boundary: the
/// chip's byte counter wraps modulo 256 within the addressed page, so
/// excess bytes would overwrite the start of the same page. Per the
/// datasheet, a full 256-byte payload forces the low address byte to 0 -
/// the write lands at the start of the addressed page regardless of the
/// address's low byte.
///
/// Sequence: write-enable, program command, bounded busy-wait. Reports
/// chip completion only; content is not read back.
#[maybe_async]
pub async fn program_page<B: SpiBus + ?Sized>(bus: &mut B, addr: u32, data: &[u8]) -> Result<()> {
    if !chip::contains_address(addr) {
        return Err(Error::InvalidAddress);
    }
    if data.is_empty() || data.len() > chip::PAGE_SIZE {
        return Err(Error::InvalidLength);
    }

    let addr = if data.len() == chip::PAGE_SIZE {
        addr & !(chip::PAGE_SIZE as u32 - 1)
    } else {
        addr
    };
    log::debug!("programming {} bytes at {:#08x}", data.len(), addr);

    write_enable(bus).await?;
    let mut cmd = SpiCommand::write(opcodes::PP, addr, data);
    execute(bus, &mut cmd).await?;
    wait_ready(bus, chip::PAGE_PROGRAM_TIMING).await
}

/// Erase the 4 KiB sector containing `addr`
#[maybe_async]
pub async fn erase_sector_4k<B: SpiBus + ?Sized>(bus: &mut B, addr: u32) -> Result<()> {
    if !chip::contains_address(addr) {
        return Err(Error::InvalidAddress);
    }
    log::debug!("erasing 4 KiB sector at {:#08x}", addr);
    erase_command(bus, opcodes::SE, addr, chip::SECTOR_ERASE_TIMING).await
}

/// Erase the 32 KiB block containing `addr`
#[maybe_async]
pub async fn erase_block_32k<B: SpiBus + ?Sized>(bus: &mut B, addr: u32) -> Result<()> {
    if !chip::contains_address(addr) {
        return Err(Error::InvalidAddress);
    }
    log::debug!("erasing 32 KiB block at {:#08x}", addr);
    erase_command(bus, opcodes::BE_32K, addr, chip::BLOCK_ERASE_32K_TIMING).await
}

/// Erase the 64 KiB block containing `addr`
#[maybe_async]
pub async fn erase_block_64k<B: SpiBus + ?Sized>(bus: &mut B, addr: u32) -> Result<()> {
    if !chip::contains_address(addr) {
        return Err(Error::InvalidAddress);
    }
    log::debug!("erasing 64 KiB block at {:#08x}", addr);
    erase_command(bus, opcodes::BE_64K, addr, chip::BLOCK_ERASE_64K_TIMING).await
}

/// Erase the entire chip
///
/// Takes up to 100 s on this part; the busy-wait is bounded accordingly.
#[maybe_async]
pub async fn erase_chip<B: SpiBus + ?Sized>(bus: &mut B) -> Result<()> {
    log::debug!("erasing whole chip");
    write_enable(bus).await?;
    let mut cmd = SpiCommand::simple(opcodes::CE);
    execute(bus, &mut cmd).await?;
    wait_ready(bus, chip::CHIP_ERASE_TIMING).await
}

/// Alignment is the chip's business: it erases the unit containing the
/// address, so no alignment check happens here.
#[maybe_async]
async fn erase_command<B: SpiBus + ?Sized>(
    bus: &mut B,
    opcode: u8,
    addr: u32,
    timing: PollTiming,
) -> Result<()> {
    write_enable(bus).await?;
    let mut cmd = SpiCommand::erase(opcode, addr);
    execute(bus, &mut cmd).await?;
    wait_ready(bus, timing).await
}

/// Enter deep power-down
///
/// The driver sleeps out the datasheet transition latency before
/// returning, so the chip is ready for the next command.
#[maybe_async]
pub async fn power_down<B: SpiBus + ?Sized>(bus: &mut B) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::DP);
    execute(bus, &mut cmd).await?;
    bus.delay_us(chip::POWER_TRANSITION_US).await;
    Ok(())
}

/// Release the chip from deep power-down
#[maybe_async]
pub async fn power_up<B: SpiBus + ?Sized>(bus: &mut B) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::RDP);
    execute(bus, &mut cmd).await?;
    bus.delay_us(chip::POWER_TRANSITION_US).await;
    Ok(())
}

/// Software reset: enable-reset then reset, no state verification
#[maybe_async]
pub async fn reset<B: SpiBus + ?Sized>(bus: &mut B) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::RSTEN);
    execute(bus, &mut cmd).await?;
    let mut cmd = SpiCommand::simple(opcodes::RST);
    execute(bus, &mut cmd).await?;
    bus.delay_us(chip::RESET_US).await;
    Ok(())
}
