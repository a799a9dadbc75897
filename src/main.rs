//! w25flash - console tool for the Winbond W25Q64JV SPI NOR flash
//!
//! Drives the `w25flash-core` protocol driver against the byte-level chip
//! emulator from `w25flash-dummy`, backed by a flash image file. Every
//! subcommand goes through the same command framing, write-enable/busy
//! handshake, and page-write orchestration a hardware bus would see; the
//! image file is loaded into the emulated chip on start and written back
//! after mutating commands.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use std::fs;
use std::path::Path;
use w25flash_core::protocol;
use w25flash_dummy::{DummyConfig, DummyFlash};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let mut bus = open_image(&cli.image)?;
    protocol::init(&mut bus)?;

    let mutates = matches!(
        &cli.command,
        Commands::Write { .. } | Commands::Erase { .. } | Commands::EraseChip
    );

    let result: commands::Result<()> = match cli.command {
        Commands::Info => {
            commands::run_info(&cli.image);
            Ok(())
        }
        Commands::Id => commands::run_id(&mut bus),
        Commands::Status => commands::run_status(&mut bus),
        Commands::Read {
            addr,
            length,
            output,
        } => commands::run_read(&mut bus, addr, length, output.as_deref()),
        Commands::Write { addr, input, erase } => {
            commands::run_write(&mut bus, addr, &input, erase)
        }
        Commands::Erase { addr, length } => commands::run_erase(&mut bus, addr, length),
        Commands::EraseChip => commands::run_erase_chip(&mut bus),
        Commands::PowerDown => commands::run_power_down(&mut bus),
        Commands::PowerUp => commands::run_power_up(&mut bus),
        Commands::Reset => commands::run_reset(&mut bus),
    };
    result?;

    if mutates {
        save_image(&cli.image, &bus)?;
    }

    Ok(())
}

/// Load the image file into a fresh emulated chip, or start blank
fn open_image(path: &Path) -> Result<DummyFlash, Box<dyn std::error::Error>> {
    let config = DummyConfig::default();

    if path.exists() {
        let data = fs::read(path)?;
        if data.len() != config.size {
            log::warn!(
                "image {} is {} bytes, chip is {}; missing bytes read as erased",
                path.display(),
                data.len(),
                config.size
            );
        }
        Ok(DummyFlash::with_data(config, &data))
    } else {
        log::info!("no image at {}, starting from an erased chip", path.display());
        Ok(DummyFlash::new(config))
    }
}

/// Write the emulated chip's memory back to the image file
fn save_image(path: &Path, bus: &DummyFlash) -> Result<(), std::io::Error> {
    fs::write(path, bus.data())?;
    log::debug!("saved image to {}", path.display());
    Ok(())
}
