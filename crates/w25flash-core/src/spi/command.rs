//! SPI command structure

/// A single SPI transaction
///
/// Designed to avoid allocation - uses slices for data. The lifetime
/// parameter `'a` ties the command to the buffers it references. The
/// chip only understands 3-byte addressing, so the address field is a
/// 24-bit value sent most-significant byte first.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// 24-bit address (if any)
    pub address: Option<u32>,

    /// Number of don't-care bytes clocked after the address phase
    pub dummy_bytes: u8,

    /// Data to write after opcode/address/dummy
    pub write_data: &'a [u8],

    /// Buffer to read into (mutable)
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Create a command with no address or data (e.g., WREN, DP)
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            dummy_bytes: 0,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a read register command with no address (e.g., RDSR1)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: None,
            dummy_bytes: 0,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create an addressed read command (e.g., READ)
    pub fn read(opcode: u8, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            dummy_bytes: 0,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create an addressed write command (e.g., PP)
    pub fn write(opcode: u8, addr: u32, data: &'a [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            dummy_bytes: 0,
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// Create an addressed command with no data phase (e.g., SE)
    pub fn erase(opcode: u8, addr: u32) -> Self {
        Self {
            opcode,
            address: Some(addr),
            dummy_bytes: 0,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Set the number of dummy bytes
    pub fn with_dummy_bytes(mut self, bytes: u8) -> Self {
        self.dummy_bytes = bytes;
        self
    }

    /// Total number of bytes this command clocks over the bus
    pub fn total_bytes(&self) -> usize {
        let mut total = 1; // opcode
        if self.address.is_some() {
            total += 3;
        }
        total += self.dummy_bytes as usize;
        total += self.write_data.len();
        total += self.read_buf.len();
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::opcodes;

    #[test]
    fn total_bytes_counts_every_phase() {
        assert_eq!(SpiCommand::simple(opcodes::WREN).total_bytes(), 1);

        let mut id = [0u8; 8];
        let cmd = SpiCommand::read_reg(opcodes::RDUID, &mut id).with_dummy_bytes(4);
        assert_eq!(cmd.total_bytes(), 13);

        let mut buf = [0u8; 10];
        let cmd = SpiCommand::read(opcodes::FAST_READ, 0x1234, &mut buf).with_dummy_bytes(1);
        assert_eq!(cmd.total_bytes(), 15);

        let data = [0u8; 4];
        assert_eq!(SpiCommand::write(opcodes::PP, 0, &data).total_bytes(), 8);
        assert_eq!(SpiCommand::erase(opcodes::SE, 0).total_bytes(), 4);
    }
}
