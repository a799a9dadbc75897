//! w25flash-core - driver core for the Winbond W25Q64JV SPI NOR flash
//!
//! This crate provides the protocol driver (command framing, write-enable
//! and busy handshake), the page-write orchestrator, and the shared error
//! model. It is `no_std` compatible and generic over a byte-duplex
//! [`SpiBus`] so the same driver runs on hardware buses and on the
//! in-memory emulator from `w25flash-dummy`.
//!
//! # Features
//!
//! - `std` - Enable standard library support (`std::error::Error` impl)
//! - `is_sync` - Compile the driver synchronous instead of async
//!
//! # Example
//!
//! ```ignore
//! use w25flash_core::{flash, protocol, SpiBus};
//!
//! fn dump_id<B: SpiBus>(bus: &mut B) {
//!     protocol::init(bus).unwrap();
//!     match protocol::read_unique_id(bus) {
//!         Ok(id) => println!("unique ID: {:016X}", id),
//!         Err(e) => println!("read failed: {}", e),
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Allow async fn in traits - we use maybe-async for dual sync/async support
#![allow(async_fn_in_trait)]

#[cfg(feature = "std")]
extern crate std;

pub mod bus;
pub mod chip;
pub mod error;
pub mod flash;
pub mod protocol;
pub mod spi;

pub use bus::SpiBus;
pub use error::{Error, Result};
