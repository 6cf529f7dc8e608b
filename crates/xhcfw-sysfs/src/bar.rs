//! BAR0 access via sysfs `resource0`
//!
//! The BAR is mapped with `mmap` on first use and stays mapped until the
//! port is dropped. Every access is a single volatile load or store of the
//! requested width; the controller decodes the access size.
//!
//! # Safety
//!
//! Writing to a BAR changes hardware state. The mapping itself only
//! guarantees that accesses stay inside the region and are naturally
//! aligned.

use std::path::{Path, PathBuf};
use std::time::Duration;

use xhcfw_core::port::check_bar_access;
use xhcfw_core::{Delay, Error as CoreError, RawMemoryPort, Width};

use crate::error::{Result, SysfsError};

/// A mapped PCI BAR
#[cfg(target_os = "linux")]
pub struct BarMapping {
    /// Pointer to the mapped memory
    ptr: *mut u8,
    /// Size of the mapping
    size: usize,
}

#[cfg(target_os = "linux")]
impl BarMapping {
    /// Map a sysfs resource file
    pub fn new(path: &Path) -> Result<Self> {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;
        use std::os::unix::io::AsRawFd;

        let map_err = |source: std::io::Error| SysfsError::MemoryMap {
            path: path.display().to_string(),
            source,
        };

        // O_SYNC for uncached access
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)
            .map_err(map_err)?;

        let size = file.metadata().map_err(map_err)?.len() as usize;
        if size == 0 {
            return Err(SysfsError::NotSupported("BAR has zero size"));
        }

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(map_err(std::io::Error::last_os_error()));
        }

        log::debug!("Mapped {} ({:#x} bytes)", path.display(), size);

        Ok(Self {
            ptr: ptr as *mut u8,
            size,
        })
    }

    /// Size of the mapping
    pub fn size(&self) -> usize {
        self.size
    }

    /// Read `width` bytes at `offset` with a single access
    pub fn read(&self, offset: usize, width: Width) -> xhcfw_core::Result<u64> {
        check_bar_access(offset, width, self.size)?;
        // SAFETY: in bounds and naturally aligned, checked above
        let value = unsafe {
            let p = self.ptr.add(offset);
            match width {
                Width::Byte => core::ptr::read_volatile(p) as u64,
                Width::Word => u16::from_le(core::ptr::read_volatile(p as *const u16)) as u64,
                Width::Dword => u32::from_le(core::ptr::read_volatile(p as *const u32)) as u64,
                Width::Qword => u64::from_le(core::ptr::read_volatile(p as *const u64)),
            }
        };
        Ok(value)
    }

    /// Write the low `width` bytes of `value` at `offset` with a single access
    pub fn write(&self, offset: usize, width: Width, value: u64) -> xhcfw_core::Result<()> {
        check_bar_access(offset, width, self.size)?;
        // SAFETY: in bounds and naturally aligned, checked above
        unsafe {
            let p = self.ptr.add(offset);
            match width {
                Width::Byte => core::ptr::write_volatile(p, value as u8),
                Width::Word => core::ptr::write_volatile(p as *mut u16, (value as u16).to_le()),
                Width::Dword => core::ptr::write_volatile(p as *mut u32, (value as u32).to_le()),
                Width::Qword => core::ptr::write_volatile(p as *mut u64, value.to_le()),
            }
        }
        Ok(())
    }
}

#[cfg(target_os = "linux")]
impl Drop for BarMapping {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.size);
        }
    }
}

// The mapping is plain MMIO; moving it to another thread is fine.
#[cfg(target_os = "linux")]
unsafe impl Send for BarMapping {}

// Stub for non-Linux platforms
#[cfg(not(target_os = "linux"))]
pub struct BarMapping {
    _private: (),
}

#[cfg(not(target_os = "linux"))]
impl BarMapping {
    /// Map a sysfs resource file
    pub fn new(_path: &Path) -> Result<Self> {
        Err(SysfsError::NotSupported("BAR mapping only supported on Linux"))
    }

    /// Size of the mapping
    pub fn size(&self) -> usize {
        0
    }

    /// Read `width` bytes at `offset` with a single access
    pub fn read(&self, offset: usize, _width: Width) -> xhcfw_core::Result<u64> {
        Err(CoreError::ReadError {
            offset: offset as u32,
        })
    }

    /// Write the low `width` bytes of `value` at `offset` with a single access
    pub fn write(&self, offset: usize, _width: Width, _value: u64) -> xhcfw_core::Result<()> {
        Err(CoreError::WriteError {
            offset: offset as u32,
        })
    }
}

/// BAR0 of one PCI device, mapped on first access
pub struct SysfsBarPort {
    path: PathBuf,
    map: Option<BarMapping>,
}

impl SysfsBarPort {
    /// Port for `<device dir>/resource0`; nothing is mapped yet
    pub fn new(device_dir: &Path) -> Self {
        Self {
            path: device_dir.join("resource0"),
            map: None,
        }
    }

    /// Whether the BAR has been mapped
    pub fn is_mapped(&self) -> bool {
        self.map.is_some()
    }

    /// Map the BAR if needed, reporting `error` if that fails
    fn mapping(&mut self, error: CoreError) -> xhcfw_core::Result<&BarMapping> {
        if self.map.is_none() {
            let map = BarMapping::new(&self.path).map_err(|e| {
                log::debug!("{}", e);
                error
            })?;
            self.map = Some(map);
        }
        self.map.as_ref().ok_or(error)
    }
}

impl Delay for SysfsBarPort {
    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(us as u64));
    }
}

impl RawMemoryPort for SysfsBarPort {
    fn size(&mut self) -> xhcfw_core::Result<usize> {
        Ok(self.mapping(CoreError::ReadError { offset: 0 })?.size())
    }

    fn read_raw(&mut self, offset: usize, width: Width) -> xhcfw_core::Result<u64> {
        let error = CoreError::ReadError {
            offset: offset as u32,
        };
        self.mapping(error)?.read(offset, width)
    }

    fn write_raw(&mut self, offset: usize, width: Width, value: u64) -> xhcfw_core::Result<()> {
        let error = CoreError::WriteError {
            offset: offset as u32,
        };
        self.mapping(error)?.write(offset, width, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_port_maps_lazily() {
        let port = SysfsBarPort::new(Path::new("/nonexistent"));
        assert!(!port.is_mapped());
    }

    #[test]
    fn test_missing_resource_is_read_error() {
        let mut port = SysfsBarPort::new(Path::new("/nonexistent"));
        assert_eq!(
            port.read(0x3010, Width::Byte),
            Err(CoreError::ReadError { offset: 0x3010 })
        );
        assert!(!port.is_mapped());
    }

    #[test]
    fn test_missing_resource_is_write_error() {
        let mut port = SysfsBarPort::new(Path::new("/nonexistent"));
        assert_eq!(
            port.write(0x3012, Width::Word, 0x1234),
            Err(CoreError::WriteError { offset: 0x3012 })
        );
        assert!(!port.is_mapped());
    }

    #[test]
    #[ignore] // Requires root and an ASMedia controller at 0000:03:00.0
    fn test_bar_read_status() {
        let mut port = SysfsBarPort::new(Path::new("/sys/bus/pci/devices/0000:03:00.0"));
        port.read(0x3010, Width::Byte).unwrap();
        assert!(port.is_mapped());
    }
}
