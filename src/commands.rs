//! Subcommand implementations
//!
//! Every command talks to the emulated chip through the same driver
//! stack a hardware bus would use; the image file is just the emulator's
//! backing store.

use std::fs;
use std::path::Path;

use w25flash_core::{chip, flash, protocol};
use w25flash_dummy::DummyFlash;

/// Errors surfaced to the user by CLI commands
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Driver-level failure
    #[error("flash: {0}")]
    Flash(#[from] w25flash_core::Error),
    /// Host-side file I/O failure
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CommandError>;

pub fn run_info(image: &Path) {
    println!("W25Q64JV");
    println!("========");
    println!(
        "Size:        {} bytes ({} MiB)",
        chip::TOTAL_SIZE,
        chip::TOTAL_SIZE / (1024 * 1024)
    );
    println!("Page size:   {} bytes", chip::PAGE_SIZE);
    println!("Erase units: 4 KiB sector, 32 KiB block, 64 KiB block, whole chip");
    println!("Image:       {}", image.display());
}

pub fn run_id(bus: &mut DummyFlash) -> Result<()> {
    let id = protocol::read_unique_id(bus)?;
    println!("unique ID: {:016X}", id);
    Ok(())
}

pub fn run_status(bus: &mut DummyFlash) -> Result<()> {
    let status = protocol::read_status1(bus)?;
    println!("status register 1: {:#04x} ({:?})", status.bits(), status);
    Ok(())
}

pub fn run_read(
    bus: &mut DummyFlash,
    addr: u32,
    length: u32,
    output: Option<&Path>,
) -> Result<()> {
    let mut buf = vec![0u8; length as usize];
    flash::fast_read(bus, addr, &mut buf)?;

    match output {
        Some(path) => {
            fs::write(path, &buf)?;
            log::info!("wrote {} bytes to {}", buf.len(), path.display());
        }
        None => {
            for (i, row) in buf.chunks(16).enumerate() {
                println!("{}", hexdump_line(addr + (i as u32) * 16, row));
            }
        }
    }
    Ok(())
}

pub fn run_write(bus: &mut DummyFlash, addr: u32, input: &Path, erase: bool) -> Result<()> {
    // The whole input is materialized before the first flash transaction,
    // so a short file writes exactly its own length and nothing else
    let data = fs::read(input)?;
    if erase {
        flash::erase_range(bus, addr, data.len())?;
    }
    flash::write(bus, addr, &data)?;
    println!("wrote {} bytes at {:#08x}", data.len(), addr);
    Ok(())
}

pub fn run_erase(bus: &mut DummyFlash, addr: u32, length: u32) -> Result<()> {
    flash::erase_range(bus, addr, length as usize)?;
    println!("erased sectors covering {:#08x}..{:#08x}", addr, addr + length);
    Ok(())
}

pub fn run_erase_chip(bus: &mut DummyFlash) -> Result<()> {
    log::info!("erasing whole chip, this takes up to a minute on hardware");
    protocol::erase_chip(bus)?;
    println!("chip erased");
    Ok(())
}

pub fn run_power_down(bus: &mut DummyFlash) -> Result<()> {
    protocol::power_down(bus)?;
    println!("chip is now powered down");
    Ok(())
}

pub fn run_power_up(bus: &mut DummyFlash) -> Result<()> {
    protocol::power_up(bus)?;
    println!("chip is now powered up");
    Ok(())
}

pub fn run_reset(bus: &mut DummyFlash) -> Result<()> {
    protocol::reset(bus)?;
    println!("chip reset");
    Ok(())
}

/// One hexdump row: address, up to 16 hex bytes, printable ASCII
fn hexdump_line(addr: u32, row: &[u8]) -> String {
    let mut line = format!("{:08x}  ", addr);
    for i in 0..16 {
        match row.get(i) {
            Some(byte) => line.push_str(&format!("{:02x} ", byte)),
            None => line.push_str("   "),
        }
        if i == 7 {
            line.push(' ');
        }
    }
    line.push_str(" |");
    for &byte in row {
        line.push(if (0x20..0x7F).contains(&byte) {
            byte as char
        } else {
            '.'
        });
    }
    line.push('|');
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hexdump_formats_full_and_partial_rows() {
        let row: Vec<u8> = (0x41..0x51).collect();
        assert_eq!(
            hexdump_line(0x1000, &row),
            "00001000  41 42 43 44 45 46 47 48  49 4a 4b 4c 4d 4e 4f 50  |ABCDEFGHIJKLMNOP|"
        );
        assert_eq!(
            hexdump_line(0x20, &[0x00, 0xFF]),
            "00000020  00 ff                                             |..|"
        );
    }
}
