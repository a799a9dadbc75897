//! W25Q64JV command opcodes
//!
//! Single-byte commands as defined by the Winbond W25Q64JV datasheet
//! (instruction set table 8.1.2). Only the commands this driver issues
//! are listed.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required immediately before any program/erase command
pub const WREN: u8 = 0x06;

// ============================================================================
// Status
// ============================================================================

/// Read Status Register 1 (bit 0 = busy, bit 1 = write enable latch)
pub const RDSR1: u8 = 0x05;

// ============================================================================
// Read commands
// ============================================================================

/// Read Data (no dummy byte, limited clock rate)
pub const READ: u8 = 0x03;
/// Fast Read (one trailing dummy byte, full clock rate)
pub const FAST_READ: u8 = 0x0B;
/// Read Unique ID (four leading dummy bytes, then 8 ID bytes)
pub const RDUID: u8 = 0x4B;

// ============================================================================
// Program / erase
// ============================================================================

/// Page Program (1-256 bytes within one page)
pub const PP: u8 = 0x02;
/// Sector Erase (4 KiB)
pub const SE: u8 = 0x20;
/// Block Erase (32 KiB)
pub const BE_32K: u8 = 0x52;
/// Block Erase (64 KiB)
pub const BE_64K: u8 = 0xD8;
/// Chip Erase
pub const CE: u8 = 0xC7;

// ============================================================================
// Power management
// ============================================================================

/// Deep Power Down
pub const DP: u8 = 0xB9;
/// Release from Deep Power Down
pub const RDP: u8 = 0xAB;

// ============================================================================
// Software reset
// ============================================================================

/// Reset Enable
pub const RSTEN: u8 = 0x66;
/// Reset Device (must follow Reset Enable)
pub const RST: u8 = 0x99;
