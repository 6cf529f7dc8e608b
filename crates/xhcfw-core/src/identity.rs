//! Device identification and capability table
//!
//! Maps a PCI vendor/device pair to a chip name and an immutable
//! [`CapabilityProfile`]. The table is static; a profile is resolved once
//! when a [`Device`](crate::Device) is opened and never re-derived.

use core::fmt;

use crate::error::{Error, Result};
use crate::protocol::{IndirectAccessProtocol, GEN1, GEN2};
use crate::regs;

/// ASMedia PCI vendor ID
pub const ASMEDIA_VID: u16 = 0x1b21;

/// Indirect access protocol generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Generation {
    /// No host access to internal MMIO or code RAM
    None,
    /// Config space ping-pong, 64 KiB internal space
    Gen1,
    /// BAR0 status-polled engine, 128 KiB internal space
    Gen2,
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Gen1 => write!(f, "gen1"),
            Self::Gen2 => write!(f, "gen2"),
        }
    }
}

/// What the host can do with a given chip
#[derive(Debug, Clone, Copy)]
pub struct CapabilityProfile {
    /// Protocol generation
    pub generation: Generation,
    /// Size of the internal MMIO address space in bytes
    pub mmio_space_size: u32,
    /// Largest code image the chip accepts, in bytes
    pub code_size: u32,
    /// Internal address of the next-boot-mode register
    pub cpu_mode_next: u32,
    /// Internal address of the execution control register
    pub cpu_exec_ctrl: u32,
    /// Internal address of the code RAM access control register
    pub code_ctrl: u32,
    /// Access protocol, `None` for chips without host access
    pub protocol: Option<&'static dyn IndirectAccessProtocol>,
}

impl CapabilityProfile {
    /// Whether internal MMIO can be reached from the host
    pub fn has_mmio(&self) -> bool {
        self.protocol.is_some()
    }

    /// Whether code RAM can be written from the host
    pub fn has_code(&self) -> bool {
        self.protocol.is_some()
    }

    /// Mask applied to internal MMIO addresses
    pub fn address_mask(&self) -> u32 {
        self.mmio_space_size - 1
    }
}

/// Profile of chips without host access
pub static PROFILE_NONE: CapabilityProfile = CapabilityProfile {
    generation: Generation::None,
    mmio_space_size: 0x10000,
    code_size: 0,
    cpu_mode_next: regs::CPU_MODE_NEXT_64K,
    cpu_exec_ctrl: regs::CPU_EXEC_CTRL_64K,
    code_ctrl: regs::CODE_CTRL_64K,
    protocol: None,
};

/// Profile of 64 KiB parts (ASM1042A, ASM1142)
pub static PROFILE_GEN1: CapabilityProfile = CapabilityProfile {
    generation: Generation::Gen1,
    mmio_space_size: 0x10000,
    code_size: 0x10000,
    cpu_mode_next: regs::CPU_MODE_NEXT_64K,
    cpu_exec_ctrl: regs::CPU_EXEC_CTRL_64K,
    code_ctrl: regs::CODE_CTRL_64K,
    protocol: Some(&GEN1),
};

/// Profile of 128 KiB parts (ASM2142, ASM3142, ASM3242)
pub static PROFILE_GEN2: CapabilityProfile = CapabilityProfile {
    generation: Generation::Gen2,
    mmio_space_size: 0x20000,
    code_size: 0x18000,
    cpu_mode_next: regs::CPU_MODE_NEXT_128K,
    cpu_exec_ctrl: regs::CPU_EXEC_CTRL_128K,
    code_ctrl: regs::CODE_CTRL_128K,
    protocol: Some(&GEN2),
};

/// Entry in the chip table
#[derive(Debug, Clone, Copy)]
pub struct ChipEntry {
    /// PCI vendor ID
    pub vendor_id: u16,
    /// PCI device ID
    pub device_id: u16,
    /// Marketing name
    pub name: &'static str,
    /// Capabilities
    pub profile: &'static CapabilityProfile,
}

impl ChipEntry {
    /// Check if this entry matches a vendor/device ID pair
    pub fn matches(&self, vendor_id: u16, device_id: u16) -> bool {
        self.vendor_id == vendor_id && self.device_id == device_id
    }
}

static CHIPS: &[ChipEntry] = &[
    ChipEntry {
        vendor_id: ASMEDIA_VID,
        device_id: 0x1042,
        name: "ASM1042",
        profile: &PROFILE_NONE,
    },
    ChipEntry {
        vendor_id: ASMEDIA_VID,
        device_id: 0x1142,
        name: "ASM1042A",
        profile: &PROFILE_GEN1,
    },
    ChipEntry {
        vendor_id: ASMEDIA_VID,
        device_id: 0x1242,
        name: "ASM1142",
        profile: &PROFILE_GEN1,
    },
    ChipEntry {
        vendor_id: ASMEDIA_VID,
        device_id: 0x2142,
        name: "ASM2142/ASM3142",
        profile: &PROFILE_GEN2,
    },
    ChipEntry {
        vendor_id: ASMEDIA_VID,
        device_id: 0x3242,
        name: "ASM3242",
        profile: &PROFILE_GEN2,
    },
];

/// All known chips
pub fn chips() -> &'static [ChipEntry] {
    CHIPS
}

/// Look up a chip by vendor/device ID
pub fn find_chip(vendor_id: u16, device_id: u16) -> Option<&'static ChipEntry> {
    CHIPS.iter().find(|c| c.matches(vendor_id, device_id))
}

/// Resolve the capability profile of a chip
pub fn resolve(vendor_id: u16, device_id: u16) -> Result<&'static CapabilityProfile> {
    find_chip(vendor_id, device_id)
        .map(|c| c.profile)
        .ok_or(Error::UnrecognizedDevice {
            vendor_id,
            device_id,
        })
}

/// Chip name, or "Unknown" for pairs not in the table
pub fn chip_name(vendor_id: u16, device_id: u16) -> &'static str {
    find_chip(vendor_id, device_id).map_or("Unknown", |c| c.name)
}
