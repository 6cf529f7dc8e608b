//! Error types for sysfs PCI access

use std::io;
use thiserror::Error;

/// sysfs backend errors
#[derive(Debug, Error)]
pub enum SysfsError {
    /// Malformed PCI address
    #[error("Invalid PCI address '{0}' (expected <domain>:<bus>:<slot>.<func>)")]
    InvalidAddress(String),

    /// Device directory does not exist
    #[error("PCI device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to open a sysfs file
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to read sysfs attribute
    #[error("Failed to read sysfs attribute '{path}': {source}")]
    SysfsRead {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to parse sysfs attribute
    #[error("Failed to parse sysfs attribute '{path}': {value}")]
    SysfsParse { path: String, value: String },

    /// Config space access failed
    #[error("Config space access at {offset:#x} failed: {source}")]
    Config {
        offset: u16,
        #[source]
        source: io::Error,
    },

    /// Mapping a BAR failed
    #[error("Failed to map '{path}': {source}")]
    MemoryMap {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Unbinding the kernel driver failed
    #[error("Failed to unbind driver from {dev}: {source}")]
    Unbind {
        dev: String,
        #[source]
        source: io::Error,
    },

    /// Missing required parameter
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },

    /// Operation not available on this platform
    #[error("Not supported: {0}")]
    NotSupported(&'static str),

    /// Error from the access layer
    #[error(transparent)]
    Core(#[from] xhcfw_core::Error),
}

/// Result type for sysfs operations
pub type Result<T> = std::result::Result<T, SysfsError>;
