//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "w25flash")]
#[command(author, version, about = "Console tool for the W25Q64JV SPI NOR flash", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Flash image file backing the emulated chip (created blank on demand)
    #[arg(long, global = true, default_value = "w25q64jv.bin")]
    pub image: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show chip geometry and image state
    Info,

    /// Read the factory-programmed 64-bit unique ID
    Id,

    /// Read status register 1
    Status,

    /// Read flash contents (hexdump to stdout, or raw bytes to a file)
    Read {
        /// Start address (0x-prefixed hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        addr: u32,

        /// Number of bytes to read
        #[arg(short, long, value_parser = parse_hex_u32)]
        length: u32,

        /// Output file (hexdump to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a file's contents starting at an address
    Write {
        /// Start address (0x-prefixed hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        addr: u32,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Erase the covering sectors first (otherwise the target range
        /// must already be erased)
        #[arg(long)]
        erase: bool,
    },

    /// Erase the sectors covering an address range
    Erase {
        /// Start address (0x-prefixed hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        addr: u32,

        /// Number of bytes to cover
        #[arg(short, long, value_parser = parse_hex_u32)]
        length: u32,
    },

    /// Erase the whole chip
    EraseChip,

    /// Enter deep power-down
    PowerDown,

    /// Release the chip from deep power-down
    PowerUp,

    /// Software-reset the chip
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_and_decimal_addresses_parse() {
        assert_eq!(parse_hex_u32("0x1000"), Ok(0x1000));
        assert_eq!(parse_hex_u32("0X7fFFff"), Ok(0x7FFFFF));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
        assert!(parse_hex_u32("ten").is_err());
    }
}
