//! PCI device addresses

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::SysfsError;

/// Root of the per-device sysfs directories
pub const SYSFS_PCI_DEVICES: &str = "/sys/bus/pci/devices";

/// PCI domain/bus/slot/function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PciAddress {
    /// PCI domain (usually 0)
    pub domain: u16,
    /// PCI bus number
    pub bus: u8,
    /// PCI device (slot) number
    pub device: u8,
    /// PCI function number
    pub function: u8,
}

impl PciAddress {
    /// sysfs directory of this device
    pub fn sysfs_path(&self) -> PathBuf {
        PathBuf::from(SYSFS_PCI_DEVICES).join(self.to_string())
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.domain, self.bus, self.device, self.function
        )
    }
}

impl FromStr for PciAddress {
    type Err = SysfsError;

    /// Parse "dddd:bb:ss.f", or "bb:ss.f" with domain 0
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SysfsError::InvalidAddress(s.to_string());

        let parts: Vec<&str> = s.trim().split(':').collect();
        let (domain, bus, dev_func) = match parts.as_slice() {
            [domain, bus, dev_func] => (u16::from_str_radix(domain, 16).ok(), *bus, *dev_func),
            [bus, dev_func] => (Some(0), *bus, *dev_func),
            _ => return Err(invalid()),
        };

        let (device, function) = dev_func.split_once('.').ok_or_else(invalid)?;

        let domain = domain.ok_or_else(invalid)?;
        let bus = u8::from_str_radix(bus, 16).map_err(|_| invalid())?;
        let device = u8::from_str_radix(device, 16).map_err(|_| invalid())?;
        let function = u8::from_str_radix(function, 16).map_err(|_| invalid())?;

        if device > 0x1f || function > 7 {
            return Err(invalid());
        }

        Ok(Self {
            domain,
            bus,
            device,
            function,
        })
    }
}
