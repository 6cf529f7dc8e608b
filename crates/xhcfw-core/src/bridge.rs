//! Indirect access to the internal MMIO space
//!
//! The 8051 register file is reached one byte at a time through the
//! generation-specific protocol. Wider accesses are split into bytes at
//! consecutive addresses and reassembled little-endian.

use crate::device::RawHandles;
use crate::error::{Error, Result};
use crate::identity::CapabilityProfile;
use crate::poll::{poll_until, Delay, PollConfig};
use crate::port::Width;
use crate::protocol::IndirectAccessProtocol;

/// Byte-wise access to a device's internal MMIO space
pub struct IndirectRegisterBridge<'a> {
    profile: &'static CapabilityProfile,
    protocol: &'static dyn IndirectAccessProtocol,
    io: &'a mut RawHandles,
    poll: PollConfig,
}

impl<'a> IndirectRegisterBridge<'a> {
    pub(crate) fn new(
        profile: &'static CapabilityProfile,
        io: &'a mut RawHandles,
        poll: PollConfig,
    ) -> Result<Self> {
        let protocol = profile
            .protocol
            .ok_or(Error::CapabilityUnsupported("hardware MMIO access"))?;
        Ok(Self::with_protocol(profile, protocol, io, poll))
    }

    pub(crate) fn with_protocol(
        profile: &'static CapabilityProfile,
        protocol: &'static dyn IndirectAccessProtocol,
        io: &'a mut RawHandles,
        poll: PollConfig,
    ) -> Self {
        Self {
            profile,
            protocol,
            io,
            poll,
        }
    }

    fn check(&self, addr: u32, width: Width) -> Result<()> {
        if width == Width::Qword {
            return Err(Error::InvalidWidth(8));
        }
        if addr >= self.profile.mmio_space_size {
            return Err(Error::InvalidAddress(addr));
        }
        Ok(())
    }

    fn read_bytes(&mut self, addr: u32, width: Width) -> Result<u64> {
        let mask = self.profile.address_mask();
        let mut value = 0u64;
        for i in 0..width.bytes() as u32 {
            let byte = self
                .protocol
                .read_byte(self.io, &self.poll, (addr + i) & mask)?;
            value |= (byte as u64) << (8 * i);
        }
        Ok(value)
    }

    /// Read `width` bytes starting at internal address `addr`
    pub fn read(&mut self, addr: u32, width: Width) -> Result<u64> {
        self.check(addr, width)?;
        let value = self.read_bytes(addr, width)?;
        log::trace!("mmio read  {:#07x}/{} -> {:#x}", addr, width.bytes(), value);
        Ok(value)
    }

    /// Write `width` bytes starting at internal address `addr`
    ///
    /// With `confirm`, the register is read back until it holds `value`.
    pub fn write(&mut self, addr: u32, width: Width, value: u64, confirm: bool) -> Result<()> {
        self.check(addr, width)?;
        let value = value & width.mask();
        log::trace!("mmio write {:#07x}/{} <- {:#x}", addr, width.bytes(), value);

        let mask = self.profile.address_mask();
        for i in 0..width.bytes() as u32 {
            let byte = (value >> (8 * i)) as u8;
            self.protocol
                .write_byte(self.io, &self.poll, (addr + i) & mask, byte)?;
        }

        if confirm {
            let poll = self.poll;
            poll_until(self, &poll, addr, |bridge| {
                Ok(bridge.read_bytes(addr, width)? == value)
            })?;
        }

        Ok(())
    }
}

impl Delay for IndirectRegisterBridge<'_> {
    fn delay_us(&mut self, us: u32) {
        self.io.delay_us(us);
    }
}
