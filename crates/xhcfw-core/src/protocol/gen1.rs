//! Generation 1: configuration space ping-pong
//!
//! Everything goes through a handful of config space registers. An address
//! is written to a latch and polled until it echoes back, then a single
//! data register is accessed. The latch is asynchronous to the PCI bus, so
//! the echo must be awaited before touching the data port.

use crate::code::{CodeImage, LoadProgress};
use crate::device::RawHandles;
use crate::error::{Error, Result};
use crate::identity::Generation;
use crate::poll::{Delay, PollConfig};
use crate::port::{RawConfigPort, Width};
use crate::protocol::IndirectAccessProtocol;
use crate::regs;

/// Code RAM size of generation 1 parts
pub const CODE_SIZE: u32 = 0x10000;

/// Config space registers used by generation 1 parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gen1Ports {
    /// Code RAM word address
    pub code_addr: u16,
    /// Code RAM data, lower bank
    pub code_data_lower: u16,
    /// Code RAM data, upper bank
    pub code_data_upper: u16,
    /// Internal MMIO address
    pub mmio_addr: u16,
    /// Internal MMIO write data
    pub mmio_write_data: u16,
    /// Internal MMIO read data
    pub mmio_read_data: u16,
}

impl Gen1Ports {
    /// Register layout of ASM1042A/ASM1142
    pub const DEFAULT: Self = Self {
        code_addr: regs::CODE_RAM_ADDR,
        code_data_lower: regs::CODE_RAM_DATA_LOWER_BANK,
        code_data_upper: regs::CODE_RAM_DATA_UPPER_BANK,
        mmio_addr: regs::MMIO_ACCESS_ADDR,
        mmio_write_data: regs::MMIO_ACCESS_WRITE_DATA,
        mmio_read_data: regs::MMIO_ACCESS_READ_DATA,
    };
}

/// Config space protocol of 64 KiB parts
#[derive(Debug)]
pub struct Gen1Protocol {
    /// Register layout
    pub ports: Gen1Ports,
}

impl Gen1Protocol {
    /// Latch an internal MMIO address
    fn select(&self, io: &mut RawHandles, poll: &PollConfig, addr: u32) -> Result<()> {
        io.config().write_confirmed(
            self.ports.mmio_addr,
            Width::Word,
            (addr & 0xffff) as u64,
            poll,
        )
    }
}

impl IndirectAccessProtocol for Gen1Protocol {
    fn generation(&self) -> Generation {
        Generation::Gen1
    }

    fn code_size(&self) -> u32 {
        CODE_SIZE
    }

    fn read_byte(&self, io: &mut RawHandles, poll: &PollConfig, addr: u32) -> Result<u8> {
        self.select(io, poll, addr)?;
        let config = io.config();
        let value = config.read(self.ports.mmio_read_data, Width::Byte)?;
        // Back-to-back accesses at full bus speed return stale data.
        config.delay_us(poll.settle_us);
        Ok(value as u8)
    }

    fn write_byte(
        &self,
        io: &mut RawHandles,
        poll: &PollConfig,
        addr: u32,
        value: u8,
    ) -> Result<()> {
        self.select(io, poll, addr)?;
        let config = io.config();
        config.write(self.ports.mmio_write_data, Width::Byte, value as u64)?;
        config.delay_us(poll.settle_us);
        Ok(())
    }

    fn can_read_code(&self) -> bool {
        false
    }

    fn set_code_ports(&self, _io: &mut RawHandles, _enable: bool) -> Result<()> {
        Ok(())
    }

    fn write_code(
        &self,
        io: &mut RawHandles,
        poll: &PollConfig,
        image: &CodeImage<'_>,
        progress: &mut dyn LoadProgress,
    ) -> Result<()> {
        let config = io.config();
        let data = image.data();
        progress.writing(data.len());

        for (i, word) in data.chunks_exact(2).enumerate() {
            let offset = (image.base() + 2 * i as u32) % CODE_SIZE;

            let data_port = if offset & regs::CODE_RAM_BANK_BIT != 0 {
                self.ports.code_data_upper
            } else {
                self.ports.code_data_lower
            };

            config.write_confirmed(
                self.ports.code_addr,
                Width::Word,
                (offset & regs::CODE_RAM_ADDR_MASK) as u64,
                poll,
            )?;
            config.write(
                data_port,
                Width::Word,
                u16::from_le_bytes([word[0], word[1]]) as u64,
            )?;

            progress.write_progress(2 * (i + 1));
        }

        Ok(())
    }

    fn read_code(
        &self,
        _io: &mut RawHandles,
        _poll: &PollConfig,
        _base: u32,
        _buf: &mut [u8],
        _progress: &mut dyn LoadProgress,
    ) -> Result<()> {
        Err(Error::CapabilityUnsupported("code RAM readback"))
    }
}
