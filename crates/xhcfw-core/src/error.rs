//! Error types for xhcfw-core
//!
//! This module provides a no_std compatible error type shared by every
//! layer of the crate, from raw port accesses up to the CPU lifecycle.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Device errors
    /// Configuration space reads back as all ones
    BusUnreachable,
    /// Vendor/device pair is not in the capability table
    UnrecognizedDevice {
        /// PCI vendor ID
        vendor_id: u16,
        /// PCI device ID
        device_id: u16,
    },
    /// The resolved profile does not provide the requested access
    CapabilityUnsupported(&'static str),

    // Parameter errors
    /// Access width not supported by the target port
    InvalidWidth(u8),
    /// Address out of range or misaligned
    InvalidAddress(u32),
    /// Length too large or not a multiple of the word size
    InvalidLength(usize),

    // Hardware communication errors
    /// A bounded polling loop gave up at the given port offset
    ConfirmationTimeout {
        /// Port offset (or internal address) that was being polled
        offset: u32,
    },
    /// Code memory readback differs from what was written
    VerificationFailed {
        /// Code memory byte address of the first differing word
        address: u32,
        /// Word that was written
        expected: u16,
        /// Word that was read back
        found: u16,
    },
    /// Raw port read failed
    ReadError {
        /// Port offset
        offset: u32,
    },
    /// Raw port write failed
    WriteError {
        /// Port offset
        offset: u32,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusUnreachable => write!(f, "device is not reachable on the bus"),
            Self::UnrecognizedDevice {
                vendor_id,
                device_id,
            } => write!(
                f,
                "unrecognized PCI VID:DID pair: {:04x}:{:04x}",
                vendor_id, device_id
            ),
            Self::CapabilityUnsupported(what) => write!(f, "not supported: {}", what),
            Self::InvalidWidth(width) => write!(f, "invalid width: {}", width),
            Self::InvalidAddress(addr) => write!(f, "invalid address: {:#x}", addr),
            Self::InvalidLength(len) => write!(f, "invalid length: {:#x}", len),
            Self::ConfirmationTimeout { offset } => {
                write!(f, "timed out waiting for confirmation at {:#x}", offset)
            }
            Self::VerificationFailed {
                address,
                expected,
                found,
            } => write!(
                f,
                "code verification failed at 0x{:05X}: expected 0x{:04X}, found 0x{:04X}",
                address, expected, found
            ),
            Self::ReadError { offset } => write!(f, "read failed at {:#x}", offset),
            Self::WriteError { offset } => write!(f, "write failed at {:#x}", offset),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
