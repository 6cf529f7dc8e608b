//! Raw register ports
//!
//! A device exposes two raw windows to the host:
//!
//! - [`RawConfigPort`] - its PCI configuration space (1/2/4-byte accesses)
//! - [`RawMemoryPort`] - a memory-mapped BAR (1/2/4/8-byte accesses)
//!
//! Implementations only provide the `*_raw` methods. The provided methods
//! validate the width first and add the write-then-reread confirmation.
//! Every access must reach the hardware as one transaction of the given
//! width; splitting it into byte accesses changes what the device sees.

use crate::error::{Error, Result};
use crate::poll::{poll_until, Delay, PollConfig};

/// Width of a single register transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Width {
    /// 8-bit access
    Byte = 1,
    /// 16-bit access
    Word = 2,
    /// 32-bit access
    Dword = 4,
    /// 64-bit access (BAR only)
    Qword = 8,
}

impl Width {
    /// Number of bytes in the access
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Mask covering all bits of a value of this width
    pub const fn mask(self) -> u64 {
        match self {
            Self::Byte => 0xff,
            Self::Word => 0xffff,
            Self::Dword => 0xffff_ffff,
            Self::Qword => u64::MAX,
        }
    }
}

impl TryFrom<u8> for Width {
    type Error = Error;

    fn try_from(bytes: u8) -> Result<Self> {
        match bytes {
            1 => Ok(Self::Byte),
            2 => Ok(Self::Word),
            4 => Ok(Self::Dword),
            8 => Ok(Self::Qword),
            other => Err(Error::InvalidWidth(other)),
        }
    }
}

/// Configuration space port
pub trait RawConfigPort: Delay {
    /// Read `width` bytes at `offset`, little-endian
    ///
    /// Only called with widths accepted by [`config_width`].
    fn read_raw(&mut self, offset: u16, width: Width) -> Result<u64>;

    /// Write the low `width` bytes of `value` at `offset`, little-endian
    ///
    /// Only called with widths accepted by [`config_width`].
    fn write_raw(&mut self, offset: u16, width: Width, value: u64) -> Result<()>;

    /// Read a register
    fn read(&mut self, offset: u16, width: Width) -> Result<u64> {
        config_width(width)?;
        let value = self.read_raw(offset, width)?;
        log::trace!("cfg read  {:#05x}/{} -> {:#x}", offset, width.bytes(), value);
        Ok(value)
    }

    /// Write a register
    fn write(&mut self, offset: u16, width: Width, value: u64) -> Result<()> {
        config_width(width)?;
        log::trace!("cfg write {:#05x}/{} <- {:#x}", offset, width.bytes(), value);
        self.write_raw(offset, width, value & width.mask())
    }

    /// Write a register and wait until it reads back the written value
    fn write_confirmed(
        &mut self,
        offset: u16,
        width: Width,
        value: u64,
        poll: &PollConfig,
    ) -> Result<()> {
        let value = value & width.mask();
        self.write(offset, width, value)?;
        poll_until(self, poll, offset as u32, |port| {
            Ok(port.read(offset, width)? == value)
        })
    }
}

/// Memory-mapped BAR port
pub trait RawMemoryPort: Delay {
    /// Size of the mapped region in bytes
    fn size(&mut self) -> Result<usize>;

    /// Read `width` bytes at `offset` as one transaction
    fn read_raw(&mut self, offset: usize, width: Width) -> Result<u64>;

    /// Write the low `width` bytes of `value` at `offset` as one transaction
    fn write_raw(&mut self, offset: usize, width: Width, value: u64) -> Result<()>;

    /// Read a register
    fn read(&mut self, offset: usize, width: Width) -> Result<u64> {
        let value = self.read_raw(offset, width)?;
        log::trace!("bar read  {:#06x}/{} -> {:#x}", offset, width.bytes(), value);
        Ok(value)
    }

    /// Write a register
    fn write(&mut self, offset: usize, width: Width, value: u64) -> Result<()> {
        log::trace!("bar write {:#06x}/{} <- {:#x}", offset, width.bytes(), value);
        self.write_raw(offset, width, value & width.mask())
    }

    /// Write a register and wait until it reads back the written value
    fn write_confirmed(
        &mut self,
        offset: usize,
        width: Width,
        value: u64,
        poll: &PollConfig,
    ) -> Result<()> {
        let value = value & width.mask();
        self.write(offset, width, value)?;
        poll_until(self, poll, offset as u32, |port| {
            Ok(port.read(offset, width)? == value)
        })
    }
}

/// Check that `width` can be used on configuration space
pub fn config_width(width: Width) -> Result<()> {
    match width {
        Width::Byte | Width::Word | Width::Dword => Ok(()),
        Width::Qword => Err(Error::InvalidWidth(8)),
    }
}

/// Check that a BAR access of `width` at `offset` fits a region of `size` bytes
/// and is naturally aligned
pub fn check_bar_access(offset: usize, width: Width, size: usize) -> Result<()> {
    let end = offset.checked_add(width.bytes());
    if end.map_or(true, |end| end > size) || offset % width.bytes() != 0 {
        return Err(Error::InvalidAddress(offset as u32));
    }
    Ok(())
}

/// Check that configuration space is reachable
///
/// A device that dropped off the bus (or was never there) reads back as
/// all ones.
pub fn check_reachable(port: &mut dyn RawConfigPort) -> Result<()> {
    if port.read(0, Width::Dword)? == 0xffff_ffff {
        return Err(Error::BusUnreachable);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Config port whose registers only latch after a few reads
    struct LaggyPort {
        regs: [u8; 256],
        pending: Option<(u16, Width, u64, u32)>,
        writes: usize,
        waited_us: u64,
    }

    impl LaggyPort {
        fn new() -> Self {
            Self {
                regs: [0; 256],
                pending: None,
                writes: 0,
                waited_us: 0,
            }
        }
    }

    impl Delay for LaggyPort {
        fn delay_us(&mut self, us: u32) {
            self.waited_us += us as u64;
        }
    }

    impl RawConfigPort for LaggyPort {
        fn read_raw(&mut self, offset: u16, width: Width) -> Result<u64> {
            if let Some((off, w, value, reads)) = self.pending.take() {
                if reads == 0 {
                    let bytes = value.to_le_bytes();
                    self.regs[off as usize..off as usize + w.bytes()]
                        .copy_from_slice(&bytes[..w.bytes()]);
                } else {
                    self.pending = Some((off, w, value, reads - 1));
                }
            }
            let mut buf = [0u8; 8];
            buf[..width.bytes()]
                .copy_from_slice(&self.regs[offset as usize..offset as usize + width.bytes()]);
            Ok(u64::from_le_bytes(buf))
        }

        fn write_raw(&mut self, offset: u16, width: Width, value: u64) -> Result<()> {
            self.writes += 1;
            self.pending = Some((offset, width, value, 2));
            Ok(())
        }
    }

    #[test]
    fn test_width_conversion() {
        assert_eq!(Width::try_from(4u8), Ok(Width::Dword));
        assert_eq!(Width::try_from(3u8), Err(Error::InvalidWidth(3)));
        assert_eq!(Width::Word.mask(), 0xffff);
        assert_eq!(Width::Qword.bytes(), 8);
    }

    #[test]
    fn test_config_rejects_qword() {
        let mut port = LaggyPort::new();
        assert_eq!(port.read(0, Width::Qword), Err(Error::InvalidWidth(8)));
        assert_eq!(port.write(0, Width::Qword, 0), Err(Error::InvalidWidth(8)));
        assert_eq!(port.writes, 0);
    }

    #[test]
    fn test_write_confirmed_waits_for_latch() {
        let mut port = LaggyPort::new();
        let poll = PollConfig::new().with_interval_us(5);

        port.write_confirmed(0xE8, Width::Word, 0x1234, &poll)
            .unwrap();

        assert_eq!(port.read(0xE8, Width::Word).unwrap(), 0x1234);
        assert_eq!(port.waited_us, 10);
    }

    #[test]
    fn test_write_confirmed_truncates_value() {
        let mut port = LaggyPort::new();
        port.write_confirmed(0x40, Width::Byte, 0x1ab, &PollConfig::default())
            .unwrap();
        assert_eq!(port.read(0x40, Width::Byte).unwrap(), 0xab);
    }

    #[test]
    fn test_bar_access_bounds() {
        assert!(check_bar_access(0x3024, Width::Dword, 0x4000).is_ok());
        assert_eq!(
            check_bar_access(0x3ffe, Width::Dword, 0x4000),
            Err(Error::InvalidAddress(0x3ffe))
        );
        assert_eq!(
            check_bar_access(0x3011, Width::Word, 0x4000),
            Err(Error::InvalidAddress(0x3011))
        );
    }

    #[test]
    fn test_unreachable_device() {
        let mut port = LaggyPort::new();
        port.regs[..4].copy_from_slice(&[0xff; 4]);
        assert_eq!(check_reachable(&mut port), Err(Error::BusUnreachable));

        port.regs[..4].copy_from_slice(&[0x21, 0x1b, 0x42, 0x12]);
        assert!(check_reachable(&mut port).is_ok());
    }
}
