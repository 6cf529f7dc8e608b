//! xhcfw-sysfs - Linux sysfs backend
//!
//! Opens an ASMedia controller through `/sys/bus/pci/devices/<dbsf>`:
//!
//! - `config` for configuration space
//! - `resource0` for BAR0 (mapped on first use)
//! - `vendor` / `device` for identification
//! - `driver/unbind` to detach the kernel driver before poking the 8051
//!
//! Requires root.

pub mod address;
pub mod bar;
pub mod config;
pub mod error;

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};

use xhcfw_core::{Device, PollConfig};

pub use address::PciAddress;
pub use bar::{BarMapping, SysfsBarPort};
pub use config::{read_sysfs_hex_u16, SysfsConfigPort};
pub use error::{Result, SysfsError};

/// Options for the sysfs backend
#[derive(Debug, Clone)]
pub struct SysfsOptions {
    /// Device to open
    pub dev: PciAddress,
    /// Unbind the kernel driver first
    pub unbind: bool,
}

impl SysfsOptions {
    /// Parse backend options
    ///
    /// Recognized keys:
    /// - `dev` (required): "<domain>:<bus>:<slot>.<func>"
    /// - `unbind`: "1"/"yes"/"true" to detach the kernel driver
    pub fn from_options(options: &[(&str, &str)]) -> Result<Self> {
        let mut dev = None;
        let mut unbind = false;

        for (key, value) in options {
            match *key {
                "dev" => dev = Some(value.parse::<PciAddress>()?),
                "unbind" => unbind = parse_bool("unbind", value)?,
                _ => {
                    log::warn!("Unknown sysfs option: {}={}", key, value);
                }
            }
        }

        Ok(Self {
            dev: dev.ok_or(SysfsError::MissingParameter("dev"))?,
            unbind,
        })
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(SysfsError::InvalidParameter {
            name,
            message: format!("expected a boolean, got '{}'", value),
        }),
    }
}

/// Detach the kernel driver from a device
///
/// Returns false if no driver was bound.
pub fn driver_unbind(dev: &PciAddress) -> Result<bool> {
    let path = dev.sysfs_path().join("driver").join("unbind");
    let unbind_err = |source: std::io::Error| SysfsError::Unbind {
        dev: dev.to_string(),
        source,
    };

    let mut file = match OpenOptions::new().write(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(unbind_err(e)),
    };

    file.write_all(dev.to_string().as_bytes())
        .map_err(unbind_err)?;
    log::info!("Unbound kernel driver from {}", dev);
    Ok(true)
}

/// Whether a kernel driver is bound to a device
pub fn driver_bound(dev: &PciAddress) -> bool {
    dev.sysfs_path().join("driver").exists()
}

/// Open a controller
pub fn open_device(options: &SysfsOptions, poll: PollConfig) -> Result<Device> {
    let dir = options.dev.sysfs_path();
    if !dir.exists() {
        return Err(SysfsError::DeviceNotFound(options.dev.to_string()));
    }

    if options.unbind {
        driver_unbind(&options.dev)?;
    } else if driver_bound(&options.dev) {
        log::warn!(
            "A kernel driver is bound to {}; pass unbind=1 to detach it",
            options.dev
        );
    }

    let vendor_id = read_sysfs_hex_u16(&dir.join("vendor"))?;
    let device_id = read_sysfs_hex_u16(&dir.join("device"))?;

    let config = SysfsConfigPort::open(&dir)?;
    let bar = SysfsBarPort::new(&dir);

    let device = Device::open(
        Box::new(config),
        Some(Box::new(bar)),
        vendor_id,
        device_id,
        poll,
    )?;

    log::info!(
        "Opened {} ({:04x}:{:04x}) at {}",
        device.name(),
        vendor_id,
        device_id,
        options.dev
    );

    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_parse() {
        let opts = SysfsOptions::from_options(&[("dev", "0000:03:00.0"), ("unbind", "1")]).unwrap();
        assert_eq!(opts.dev.to_string(), "0000:03:00.0");
        assert!(opts.unbind);

        let opts = SysfsOptions::from_options(&[("dev", "04:00.0"), ("bogus", "x")]).unwrap();
        assert_eq!(opts.dev.bus, 4);
        assert!(!opts.unbind);
    }

    #[test]
    fn test_options_errors() {
        assert!(matches!(
            SysfsOptions::from_options(&[]),
            Err(SysfsError::MissingParameter("dev"))
        ));
        assert!(matches!(
            SysfsOptions::from_options(&[("dev", "nope")]),
            Err(SysfsError::InvalidAddress(_))
        ));
        assert!(matches!(
            SysfsOptions::from_options(&[("dev", "03:00.0"), ("unbind", "maybe")]),
            Err(SysfsError::InvalidParameter { name: "unbind", .. })
        ));
    }

    #[test]
    fn test_open_missing_device() {
        let opts = SysfsOptions::from_options(&[("dev", "ffff:ff:1f.7")]).unwrap();
        assert!(matches!(
            open_device(&opts, PollConfig::default()),
            Err(SysfsError::DeviceNotFound(_))
        ));
    }
}
