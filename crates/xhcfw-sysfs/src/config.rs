//! PCI configuration space access via sysfs
//!
//! The kernel exposes each device's configuration space as a file. A seek
//! followed by a read or write of 1, 2 or 4 bytes becomes one config cycle
//! of that width.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use xhcfw_core::{Delay, Error as CoreError, RawConfigPort, Width};

use crate::error::{Result, SysfsError};

/// Configuration space of one PCI device
pub struct SysfsConfigPort {
    file: File,
}

impl SysfsConfigPort {
    /// Open `<device dir>/config` for reading and writing
    pub fn open(device_dir: &Path) -> Result<Self> {
        let path = device_dir.join("config");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| SysfsError::Open {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self { file })
    }

    fn read_bytes(&mut self, offset: u16, buf: &mut [u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset as u64))
            .and_then(|_| self.file.read_exact(buf))
            .map_err(|source| SysfsError::Config { offset, source })
    }

    fn write_bytes(&mut self, offset: u16, buf: &[u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset as u64))
            .and_then(|_| self.file.write_all(buf))
            .map_err(|source| SysfsError::Config { offset, source })
    }
}

impl Delay for SysfsConfigPort {
    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(us as u64));
    }
}

impl RawConfigPort for SysfsConfigPort {
    fn read_raw(&mut self, offset: u16, width: Width) -> xhcfw_core::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_bytes(offset, &mut buf[..width.bytes()])
            .map_err(|e| {
                log::debug!("{}", e);
                CoreError::ReadError {
                    offset: offset as u32,
                }
            })?;
        Ok(u64::from_le_bytes(buf))
    }

    fn write_raw(&mut self, offset: u16, width: Width, value: u64) -> xhcfw_core::Result<()> {
        let bytes = value.to_le_bytes();
        self.write_bytes(offset, &bytes[..width.bytes()])
            .map_err(|e| {
                log::debug!("{}", e);
                CoreError::WriteError {
                    offset: offset as u32,
                }
            })
    }
}

/// Read a hex u16 sysfs attribute such as `vendor` or `device`
pub fn read_sysfs_hex_u16(path: &Path) -> Result<u16> {
    let content = std::fs::read_to_string(path).map_err(|source| SysfsError::SysfsRead {
        path: path.display().to_string(),
        source,
    })?;
    parse_hex_u16(&content).ok_or_else(|| SysfsError::SysfsParse {
        path: path.display().to_string(),
        value: content.trim().to_string(),
    })
}

fn parse_hex_u16(content: &str) -> Option<u16> {
    let content = content.trim();
    // Handle "0x" prefix
    let hex_str = content.strip_prefix("0x").unwrap_or(content);
    u16::from_str_radix(hex_str, 16).ok()
}
