//! w25flash-dummy - In-memory W25Q64JV emulator
//!
//! This crate emulates the chip from the device side of the bus: it
//! implements [`SpiBus`] and decodes the serial byte stream one
//! chip-select window at a time, with NOR semantics (erase to 0xFF,
//! program can only clear bits, page-internal byte-counter wrap), the
//! write-enable latch, the busy flag, and deep power-down. It exists so
//! the driver stack can be exercised without hardware, both by the test
//! suite and by the CLI.
//!
//! Fault injection: a configurable transfer that fails with
//! `TransportTimeout`, and a stuck-busy mode for exercising the bounded
//! completion wait.

use w25flash_core::chip;
use w25flash_core::error::{Error, Result};
use w25flash_core::spi::opcodes;
use w25flash_core::SpiBus;

/// Configuration for the emulated chip
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Flash size in bytes
    pub size: usize,
    /// Factory unique ID returned by the read-unique-ID command
    pub unique_id: u64,
    /// How many status polls report busy after a program/erase commits
    pub busy_polls: u32,
    /// Report busy forever (the failure mode the bounded wait exists for)
    pub stuck_busy: bool,
    /// Fail the Nth byte exchange (0-based) with a transport timeout
    pub fail_transfer_at: Option<u64>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            size: chip::TOTAL_SIZE as usize,
            unique_id: 0xEF50_1234_5678_9ABC,
            busy_polls: 2,
            stuck_busy: false,
            fail_transfer_at: None,
        }
    }
}

/// A committed operation, recorded for test assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOp {
    /// Page program at the page-resolved start address
    Program {
        /// First byte address actually programmed
        addr: u32,
        /// Number of data bytes received
        len: usize,
    },
    /// 4 KiB sector erase (address aligned down to the unit)
    EraseSector {
        /// Start of the erased unit
        addr: u32,
    },
    /// 32 KiB block erase (address aligned down to the unit)
    EraseBlock32 {
        /// Start of the erased unit
        addr: u32,
    },
    /// 64 KiB block erase (address aligned down to the unit)
    EraseBlock64 {
        /// Start of the erased unit
        addr: u32,
    },
    /// Whole-chip erase
    EraseChip,
    /// Deep power-down entered
    PowerDown,
    /// Released from deep power-down
    PowerUp,
    /// Software reset accepted
    Reset,
}

/// Decoder state within one chip-select window
#[derive(Debug, Clone, Copy)]
enum Decoder {
    /// Waiting for an opcode
    Command,
    /// Streaming out status register 1
    Status,
    /// Collecting the 3-byte address for `opcode`
    Address { opcode: u8, got: u8, addr: u32 },
    /// Fast-read latency byte before data
    ReadDummy { addr: u32 },
    /// Streaming out memory, auto-incrementing with wrap
    ReadData { addr: u32 },
    /// Unique-ID latency bytes, then the 8 ID bytes
    UniqueId { dummy_left: u8, index: u8 },
    /// Receiving page-program data into the staging buffer
    Program { pos: usize },
    /// Rest of the window carries no information
    Ignored,
}

/// Action to apply when chip select rises
#[derive(Debug, Clone, Copy)]
enum Pending {
    WriteEnable,
    EraseSector { addr: u32 },
    EraseBlock32 { addr: u32 },
    EraseBlock64 { addr: u32 },
    EraseChip,
    PowerDown,
    PowerUp,
    ResetEnable,
    Reset,
}

/// In-memory W25Q64JV behind a byte-duplex bus
pub struct DummyFlash {
    config: DummyConfig,
    data: Vec<u8>,
    state: Decoder,
    pending: Option<Pending>,
    selected: bool,
    powered_down: bool,
    write_enabled: bool,
    reset_enabled: bool,
    busy_polls_left: u32,
    transfers: u64,
    // Page-program staging: the chip latches data into a page buffer and
    // commits it when chip select rises
    prog_base: u32,
    prog_start: usize,
    prog_len: usize,
    page_buf: [u8; chip::PAGE_SIZE],
    page_written: [bool; chip::PAGE_SIZE],
    ops: Vec<FlashOp>,
}

impl DummyFlash {
    /// Create a new emulated chip, fully erased
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            config,
            data,
            state: Decoder::Command,
            pending: None,
            selected: false,
            powered_down: false,
            write_enabled: false,
            reset_enabled: false,
            busy_polls_left: 0,
            transfers: 0,
            prog_base: 0,
            prog_start: 0,
            prog_len: 0,
            page_buf: [0xFF; chip::PAGE_SIZE],
            page_written: [false; chip::PAGE_SIZE],
            ops: Vec::new(),
        }
    }

    /// Create a new emulated chip with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create an emulated chip pre-loaded with an image
    pub fn with_data(config: DummyConfig, initial: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = core::cmp::min(initial.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial[..len]);
        flash
    }

    /// Get a reference to the memory contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the memory contents
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Committed operations, in order
    pub fn ops(&self) -> &[FlashOp] {
        &self.ops
    }

    /// Total byte exchanges seen so far
    pub fn transfers(&self) -> u64 {
        self.transfers
    }

    /// Whether chip select is currently asserted
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    fn status_byte(&mut self) -> u8 {
        let mut status = 0u8;
        if self.config.stuck_busy {
            status |= 0x01;
        } else if self.busy_polls_left > 0 {
            self.busy_polls_left -= 1;
            status |= 0x01;
        }
        if self.write_enabled {
            status |= 0x02;
        }
        status
    }

    fn busy(&self) -> bool {
        self.config.stuck_busy || self.busy_polls_left > 0
    }

    fn decode_opcode(&mut self, opcode: u8) -> Decoder {
        // In power-down only the release command is decoded; while busy
        // only the status read is
        if self.powered_down && opcode != opcodes::RDP {
            return Decoder::Ignored;
        }
        if self.busy() && opcode != opcodes::RDSR1 {
            log::debug!("opcode {:#04x} ignored while busy", opcode);
            return Decoder::Ignored;
        }

        match opcode {
            opcodes::RDSR1 => Decoder::Status,
            opcodes::WREN => {
                self.pending = Some(Pending::WriteEnable);
                Decoder::Ignored
            }
            opcodes::READ | opcodes::FAST_READ | opcodes::PP | opcodes::SE | opcodes::BE_32K
            | opcodes::BE_64K => Decoder::Address {
                opcode,
                got: 0,
                addr: 0,
            },
            opcodes::CE => {
                self.pending = Some(Pending::EraseChip);
                Decoder::Ignored
            }
            opcodes::RDUID => Decoder::UniqueId {
                dummy_left: 4,
                index: 0,
            },
            opcodes::DP => {
                self.pending = Some(Pending::PowerDown);
                Decoder::Ignored
            }
            opcodes::RDP => {
                self.pending = Some(Pending::PowerUp);
                Decoder::Ignored
            }
            opcodes::RSTEN => {
                self.pending = Some(Pending::ResetEnable);
                Decoder::Ignored
            }
            opcodes::RST => {
                if self.reset_enabled {
                    self.pending = Some(Pending::Reset);
                }
                Decoder::Ignored
            }
            _ => {
                log::debug!("unknown opcode {:#04x}", opcode);
                Decoder::Ignored
            }
        }
    }

    fn address_complete(&mut self, opcode: u8, addr: u32) -> Decoder {
        match opcode {
            opcodes::READ => Decoder::ReadData { addr },
            opcodes::FAST_READ => Decoder::ReadDummy { addr },
            opcodes::PP => {
                self.prog_base = addr & !(chip::PAGE_SIZE as u32 - 1);
                self.prog_start = addr as usize % chip::PAGE_SIZE;
                self.prog_len = 0;
                self.page_buf = [0xFF; chip::PAGE_SIZE];
                self.page_written = [false; chip::PAGE_SIZE];
                Decoder::Program {
                    pos: self.prog_start,
                }
            }
            opcodes::SE => {
                self.pending = Some(Pending::EraseSector {
                    addr: addr & !(chip::SECTOR_SIZE - 1),
                });
                Decoder::Ignored
            }
            opcodes::BE_32K => {
                self.pending = Some(Pending::EraseBlock32 {
                    addr: addr & !(chip::BLOCK_32K_SIZE - 1),
                });
                Decoder::Ignored
            }
            opcodes::BE_64K => {
                self.pending = Some(Pending::EraseBlock64 {
                    addr: addr & !(chip::BLOCK_64K_SIZE - 1),
                });
                Decoder::Ignored
            }
            _ => Decoder::Ignored,
        }
    }

    fn clock_byte(&mut self, byte: u8) -> u8 {
        match self.state {
            Decoder::Command => {
                self.state = self.decode_opcode(byte);
                0xFF
            }
            Decoder::Status => self.status_byte(),
            Decoder::Address { opcode, got, addr } => {
                let addr = (addr << 8) | byte as u32;
                if got == 2 {
                    self.state = self.address_complete(opcode, addr);
                } else {
                    self.state = Decoder::Address {
                        opcode,
                        got: got + 1,
                        addr,
                    };
                }
                0xFF
            }
            Decoder::ReadDummy { addr } => {
                self.state = Decoder::ReadData { addr };
                0xFF
            }
            Decoder::ReadData { addr } => {
                let out = self.data[addr as usize % self.data.len()];
                // The chip auto-increments and wraps at the end of the
                // address space
                self.state = Decoder::ReadData {
                    addr: (addr + 1) % self.data.len() as u32,
                };
                out
            }
            Decoder::UniqueId { dummy_left, index } => {
                if dummy_left > 0 {
                    self.state = Decoder::UniqueId {
                        dummy_left: dummy_left - 1,
                        index,
                    };
                    0xFF
                } else if index < 8 {
                    let out = (self.config.unique_id >> (56 - 8 * index as u32)) as u8;
                    self.state = Decoder::UniqueId {
                        dummy_left: 0,
                        index: index + 1,
                    };
                    out
                } else {
                    0xFF
                }
            }
            Decoder::Program { pos } => {
                // The chip's internal byte counter wraps modulo the page
                // size: excess bytes overwrite the start of the same page
                self.page_buf[pos] = byte;
                self.page_written[pos] = true;
                self.prog_len += 1;
                self.state = Decoder::Program {
                    pos: (pos + 1) % chip::PAGE_SIZE,
                };
                0xFF
            }
            Decoder::Ignored => 0xFF,
        }
    }

    /// Apply whatever the finished window asked for
    fn commit(&mut self) {
        let was_program = matches!(self.state, Decoder::Program { .. });
        let pending = self.pending.take();

        // Any command other than enable-reset invalidates a pending reset
        if !matches!(pending, Some(Pending::ResetEnable)) {
            self.reset_enabled = false;
        }

        if was_program {
            self.commit_program();
            return;
        }

        match pending {
            Some(Pending::WriteEnable) => self.write_enabled = true,
            Some(Pending::EraseSector { addr }) => {
                self.commit_erase(addr, chip::SECTOR_SIZE, FlashOp::EraseSector { addr })
            }
            Some(Pending::EraseBlock32 { addr }) => {
                self.commit_erase(addr, chip::BLOCK_32K_SIZE, FlashOp::EraseBlock32 { addr })
            }
            Some(Pending::EraseBlock64 { addr }) => {
                self.commit_erase(addr, chip::BLOCK_64K_SIZE, FlashOp::EraseBlock64 { addr })
            }
            Some(Pending::EraseChip) => {
                if self.write_enabled {
                    self.data.fill(0xFF);
                    self.finish_write(FlashOp::EraseChip);
                }
            }
            Some(Pending::PowerDown) => {
                self.powered_down = true;
                self.ops.push(FlashOp::PowerDown);
            }
            Some(Pending::PowerUp) => {
                self.powered_down = false;
                self.ops.push(FlashOp::PowerUp);
            }
            Some(Pending::ResetEnable) => self.reset_enabled = true,
            Some(Pending::Reset) => {
                self.write_enabled = false;
                self.busy_polls_left = 0;
                self.state = Decoder::Command;
                self.ops.push(FlashOp::Reset);
            }
            None => {}
        }
    }

    fn commit_program(&mut self) {
        if !self.write_enabled {
            log::warn!("page program without write enable ignored");
            return;
        }
        if self.prog_len == 0 {
            return;
        }
        // Like the chip, only decode the address bits the size needs
        let base = self.prog_base as usize % self.data.len();
        for i in 0..chip::PAGE_SIZE {
            if self.page_written[i] {
                // Programming can only clear bits
                self.data[base + i] &= self.page_buf[i];
            }
        }
        self.finish_write(FlashOp::Program {
            addr: self.prog_base + self.prog_start as u32,
            len: self.prog_len,
        });
    }

    fn commit_erase(&mut self, addr: u32, unit: u32, op: FlashOp) {
        if !self.write_enabled {
            log::warn!("erase without write enable ignored");
            return;
        }
        let start = addr as usize % self.data.len();
        let end = core::cmp::min(start + unit as usize, self.data.len());
        self.data[start..end].fill(0xFF);
        self.finish_write(op);
    }

    fn finish_write(&mut self, op: FlashOp) {
        self.write_enabled = false;
        self.busy_polls_left = self.config.busy_polls;
        self.ops.push(op);
    }
}

impl SpiBus for DummyFlash {
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn select(&mut self) {
        if self.selected {
            log::warn!("select while already selected");
        }
        self.selected = true;
        self.state = Decoder::Command;
    }

    fn deselect(&mut self) {
        // The driver deasserts an already-idle bus during init
        if !self.selected {
            return;
        }
        self.selected = false;
        self.commit();
        self.state = Decoder::Command;
    }

    fn transfer(&mut self, byte: u8) -> Result<u8> {
        let n = self.transfers;
        self.transfers += 1;
        if self.config.fail_transfer_at == Some(n) {
            return Err(Error::TransportTimeout);
        }
        if !self.selected {
            log::warn!("transfer without chip select");
            return Ok(0xFF);
        }
        Ok(self.clock_byte(byte))
    }

    fn delay_us(&mut self, _us: u32) {
        // No delay needed for in-memory operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use w25flash_core::{flash, protocol};

    fn small_flash() -> DummyFlash {
        // A 1 MiB chip keeps erase-everything tests fast; geometry is
        // otherwise identical
        DummyFlash::new(DummyConfig {
            size: 1024 * 1024,
            ..DummyConfig::default()
        })
    }

    #[test]
    fn unique_id_assembles_msb_first() {
        let mut flash_dev = DummyFlash::new(DummyConfig {
            unique_id: 0x0102_0304_0506_0708,
            ..DummyConfig::default()
        });
        protocol::init(&mut flash_dev).unwrap();
        assert_eq!(
            protocol::read_unique_id(&mut flash_dev).unwrap(),
            0x0102_0304_0506_0708
        );
    }

    #[test]
    fn program_then_read_back() {
        let mut flash_dev = small_flash();
        let data: Vec<u8> = (0..=255).collect();
        protocol::program_page(&mut flash_dev, 0x1000, &data).unwrap();

        let mut buf = [0u8; 256];
        protocol::fast_read(&mut flash_dev, 0x1000, &mut buf).unwrap();
        assert_eq!(&buf[..], &data[..]);
    }

    #[test]
    fn erase_leaves_all_ones_and_is_idempotent() {
        let mut flash_dev = small_flash();
        protocol::program_page(&mut flash_dev, 0x2000, &[0u8; 64]).unwrap();

        protocol::erase_sector_4k(&mut flash_dev, 0x2000).unwrap();
        let mut buf = vec![0u8; chip::SECTOR_SIZE as usize];
        protocol::fast_read(&mut flash_dev, 0x2000, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xFF));

        protocol::erase_sector_4k(&mut flash_dev, 0x2000).unwrap();
        protocol::fast_read(&mut flash_dev, 0x2000, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn program_is_logical_and() {
        let mut flash_dev = small_flash();
        protocol::program_page(&mut flash_dev, 0x100, &[0xF0]).unwrap();
        protocol::program_page(&mut flash_dev, 0x100, &[0x0F]).unwrap();

        let mut buf = [0u8; 1];
        protocol::read(&mut flash_dev, 0x100, &mut buf).unwrap();
        assert_eq!(buf[0], 0x00);
    }

    #[test]
    fn full_page_program_lands_at_page_start() {
        let mut flash_dev = small_flash();
        let data: Vec<u8> = (0..=255).collect();
        protocol::program_page(&mut flash_dev, 0x1234, &data).unwrap();

        assert_eq!(
            flash_dev.ops(),
            &[FlashOp::Program {
                addr: 0x1200,
                len: 256
            }]
        );
        let mut buf = [0u8; 256];
        protocol::fast_read(&mut flash_dev, 0x1200, &mut buf).unwrap();
        assert_eq!(&buf[..], &data[..]);
    }

    #[test]
    fn unaligned_erase_clears_containing_sector() {
        let mut flash_dev = small_flash();
        protocol::program_page(&mut flash_dev, 0x1800, &[0u8; 16]).unwrap();

        protocol::erase_sector_4k(&mut flash_dev, 0x1801).unwrap();
        assert!(flash_dev
            .ops()
            .contains(&FlashOp::EraseSector { addr: 0x1000 }));

        let mut buf = [0u8; 16];
        protocol::read(&mut flash_dev, 0x1800, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn reads_wrap_at_end_of_address_space() {
        let mut flash_dev = DummyFlash::new_default();
        let size = flash_dev.config().size;
        flash_dev.data_mut()[size - 1] = 0xAA;
        flash_dev.data_mut()[0] = 0xBB;

        let mut buf = [0u8; 2];
        protocol::read(&mut flash_dev, chip::MAX_ADDRESS, &mut buf).unwrap();
        assert_eq!(buf, [0xAA, 0xBB]);
    }

    #[test]
    fn orchestrated_write_spans_pages() {
        let mut flash_dev = small_flash();
        let data: Vec<u8> = (0..300).map(|i| (i % 251) as u8).collect();
        flash::write(&mut flash_dev, 0x1000, &data).unwrap();

        let programs: Vec<_> = flash_dev
            .ops()
            .iter()
            .filter(|op| matches!(op, FlashOp::Program { .. }))
            .collect();
        assert_eq!(
            programs,
            vec![
                &FlashOp::Program {
                    addr: 0x1000,
                    len: 256
                },
                &FlashOp::Program {
                    addr: 0x1100,
                    len: 44
                },
            ]
        );

        let mut buf = vec![0u8; 300];
        flash::fast_read(&mut flash_dev, 0x1000, &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn invalid_arguments_cause_no_bus_traffic() {
        let mut flash_dev = DummyFlash::new_default();

        assert_eq!(
            protocol::program_page(&mut flash_dev, chip::TOTAL_SIZE, &[0]),
            Err(Error::InvalidAddress)
        );
        assert_eq!(
            protocol::program_page(&mut flash_dev, 0, &[0u8; 257]),
            Err(Error::InvalidLength)
        );
        assert_eq!(
            protocol::program_page(&mut flash_dev, 0, &[]),
            Err(Error::InvalidLength)
        );
        assert_eq!(
            protocol::erase_sector_4k(&mut flash_dev, chip::TOTAL_SIZE),
            Err(Error::InvalidAddress)
        );
        let mut buf = [0u8; 1];
        assert_eq!(
            protocol::read(&mut flash_dev, chip::TOTAL_SIZE, &mut buf),
            Err(Error::InvalidAddress)
        );

        assert_eq!(flash_dev.transfers(), 0);
        assert!(flash_dev.ops().is_empty());
    }

    #[test]
    fn transport_failure_propagates_and_deselects() {
        // Fail mid page-program: byte 0 is the write-enable opcode, the
        // failure lands inside the program command's address phase
        let mut flash_dev = DummyFlash::new(DummyConfig {
            fail_transfer_at: Some(3),
            ..DummyConfig::default()
        });

        assert_eq!(
            protocol::program_page(&mut flash_dev, 0x1000, &[0xAB; 8]),
            Err(Error::TransportTimeout)
        );
        assert!(!flash_dev.is_selected());
        assert!(flash_dev.ops().is_empty());
    }

    #[test]
    fn stuck_busy_hits_the_poll_deadline() {
        let mut flash_dev = DummyFlash::new(DummyConfig {
            stuck_busy: true,
            ..DummyConfig::default()
        });

        assert_eq!(
            protocol::program_page(&mut flash_dev, 0, &[0x42]),
            Err(Error::DeviceNotReady)
        );
        assert!(!flash_dev.is_selected());
    }

    #[test]
    fn power_down_gates_everything_but_release() {
        let mut flash_dev = small_flash();
        flash_dev.data_mut()[0x10] = 0x42;

        protocol::power_down(&mut flash_dev).unwrap();
        let mut buf = [0u8; 1];
        protocol::fast_read(&mut flash_dev, 0x10, &mut buf).unwrap();
        assert_eq!(buf[0], 0xFF);

        protocol::power_up(&mut flash_dev).unwrap();
        protocol::fast_read(&mut flash_dev, 0x10, &mut buf).unwrap();
        assert_eq!(buf[0], 0x42);

        assert_eq!(flash_dev.ops(), &[FlashOp::PowerDown, FlashOp::PowerUp]);
    }

    #[test]
    fn status_reflects_write_enable_and_reset_clears_it() {
        let mut flash_dev = small_flash();

        protocol::write_enable(&mut flash_dev).unwrap();
        let status = protocol::read_status1(&mut flash_dev).unwrap();
        assert!(status.contains(protocol::Status1::WEL));
        assert!(!status.contains(protocol::Status1::BUSY));

        protocol::reset(&mut flash_dev).unwrap();
        let status = protocol::read_status1(&mut flash_dev).unwrap();
        assert!(!status.contains(protocol::Status1::WEL));
        assert!(flash_dev.ops().contains(&FlashOp::Reset));
    }

    #[test]
    fn chip_erase_clears_everything() {
        let mut flash_dev = small_flash();
        protocol::program_page(&mut flash_dev, 0x0, &[0u8; 32]).unwrap();
        protocol::program_page(&mut flash_dev, 0xF_F000, &[0u8; 32]).unwrap();

        protocol::erase_chip(&mut flash_dev).unwrap();
        assert!(flash_dev.ops().contains(&FlashOp::EraseChip));
        assert!(flash_dev.data().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn erase_range_end_to_end() {
        let mut flash_dev = small_flash();
        protocol::program_page(&mut flash_dev, 0x0, &[0u8; 256]).unwrap();
        protocol::program_page(&mut flash_dev, 0x10F00, &[0u8; 256]).unwrap();

        flash::erase_range(&mut flash_dev, 0, 68 * 1024).unwrap();

        let erases: Vec<_> = flash_dev
            .ops()
            .iter()
            .filter(|op| !matches!(op, FlashOp::Program { .. }))
            .collect();
        assert_eq!(
            erases,
            vec![
                &FlashOp::EraseBlock64 { addr: 0 },
                &FlashOp::EraseSector { addr: 0x10000 },
            ]
        );

        let mut buf = vec![0u8; 68 * 1024];
        flash::read(&mut flash_dev, 0, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xFF));
    }
}
