//! SPI command definitions for the W25Q64JV

pub mod opcodes;

mod command;

pub use command::SpiCommand;
