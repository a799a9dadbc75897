//! W25Q64JV chip geometry and timing limits
//!
//! The driver targets a single chip, so its geometry lives here as
//! constants instead of a database entry. Timing limits come from the
//! W25Q64JV datasheet (AC characteristics, table 9.6) with headroom on
//! top of the worst-case figures.

/// Total chip size in bytes (64 Mbit)
pub const TOTAL_SIZE: u32 = 8 * 1024 * 1024;

/// Highest valid byte address
pub const MAX_ADDRESS: u32 = TOTAL_SIZE - 1;

/// Program granularity: one page-program command writes at most this many bytes
pub const PAGE_SIZE: usize = 256;

/// Smallest erase unit
pub const SECTOR_SIZE: u32 = 4 * 1024;

/// Middle erase unit
pub const BLOCK_32K_SIZE: u32 = 32 * 1024;

/// Largest erase unit short of the whole chip
pub const BLOCK_64K_SIZE: u32 = 64 * 1024;

/// Check that an address falls inside the chip
pub const fn contains_address(addr: u32) -> bool {
    addr <= MAX_ADDRESS
}

/// Check that a whole byte range falls inside the chip
pub fn contains_range(addr: u32, len: usize) -> bool {
    if addr > MAX_ADDRESS {
        return false;
    }
    addr as u64 + len as u64 <= TOTAL_SIZE as u64
}

/// Bytes left in the page containing `addr`
pub fn page_remaining(addr: u32) -> usize {
    PAGE_SIZE - (addr as usize % PAGE_SIZE)
}

/// Busy-poll pacing for one operation class
///
/// The completion wait is bounded as `timeout_us / poll_delay_us` polls,
/// each followed by a `poll_delay_us` delay.
#[derive(Debug, Clone, Copy)]
pub struct PollTiming {
    /// Delay between status polls, in microseconds
    pub poll_delay_us: u32,
    /// Give up after this much accumulated delay
    pub timeout_us: u32,
}

/// Page program: typical 0.4-3 ms
pub const PAGE_PROGRAM_TIMING: PollTiming = PollTiming {
    poll_delay_us: 10,
    timeout_us: 10_000,
};

/// 4 KiB sector erase: typical 45-400 ms
pub const SECTOR_ERASE_TIMING: PollTiming = PollTiming {
    poll_delay_us: 1_000,
    timeout_us: 1_000_000,
};

/// 32 KiB block erase: typical 120 ms, max 1.6 s
pub const BLOCK_ERASE_32K_TIMING: PollTiming = PollTiming {
    poll_delay_us: 10_000,
    timeout_us: 3_000_000,
};

/// 64 KiB block erase: typical 150 ms, max 2 s
pub const BLOCK_ERASE_64K_TIMING: PollTiming = PollTiming {
    poll_delay_us: 10_000,
    timeout_us: 4_000_000,
};

/// Chip erase: typical 20 s, max 100 s
pub const CHIP_ERASE_TIMING: PollTiming = PollTiming {
    poll_delay_us: 100_000,
    timeout_us: 200_000_000,
};

/// Wake-up / power-down latency (tDP, tRES1)
pub const POWER_TRANSITION_US: u32 = 3;

/// Software reset latency (tRST)
pub const RESET_US: u32 = 30;
