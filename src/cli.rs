//! CLI argument parsing

use crate::backends;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a string as a hex or decimal u64
fn parse_hex_u64(s: &str) -> Result<u64, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u64>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Generate dynamic help text for the backend argument
fn backend_help() -> String {
    format!(
        "Backend to use, e.g. sysfs:dev=0000:03:00.0 [available: {}]",
        backends::backend_names_short()
    )
}

#[derive(Parser)]
#[command(name = "xhcfw")]
#[command(
    author,
    version,
    about = "ASMedia xHCI controller firmware loader",
    long_about = None
)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Register window for raw reads
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Space {
    /// PCI configuration space
    Config,
    /// Memory BAR0
    Bar,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify the controller
    Info {
        #[arg(short = 'p', long, help = backend_help())]
        backend: String,
    },

    /// Halt the 8051, load code RAM and restart it from code RAM
    Load {
        #[arg(short = 'p', long, help = backend_help())]
        backend: String,

        /// Raw code file
        #[arg(short, long)]
        input: PathBuf,

        /// Run the CPU at full instead of half speed
        #[arg(long)]
        full_speed: bool,
    },

    /// Write code RAM without touching the CPU
    CodeWrite {
        #[arg(short = 'p', long, help = backend_help())]
        backend: String,

        /// Raw code file
        #[arg(short, long)]
        input: PathBuf,

        /// Code RAM byte address (hex, e.g., 0x100)
        #[arg(long, default_value = "0", value_parser = parse_hex_u32)]
        address: u32,
    },

    /// Read code RAM back into a file (generation 2 only)
    CodeRead {
        #[arg(short = 'p', long, help = backend_help())]
        backend: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Code RAM byte address (hex, e.g., 0x100)
        #[arg(long, default_value = "0", value_parser = parse_hex_u32)]
        address: u32,

        /// Number of bytes (defaults to the rest of code RAM)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Read an internal MMIO register
    MmioRead {
        #[arg(short = 'p', long, help = backend_help())]
        backend: String,

        /// Internal address (hex, e.g., 0xF342)
        #[arg(long, value_parser = parse_hex_u32)]
        addr: u32,

        /// Access width in bytes (1, 2 or 4)
        #[arg(long, default_value_t = 1)]
        width: u8,
    },

    /// Write an internal MMIO register
    MmioWrite {
        #[arg(short = 'p', long, help = backend_help())]
        backend: String,

        /// Internal address (hex, e.g., 0xF342)
        #[arg(long, value_parser = parse_hex_u32)]
        addr: u32,

        /// Value to write (hex or decimal)
        #[arg(long, value_parser = parse_hex_u64)]
        value: u64,

        /// Access width in bytes (1, 2 or 4)
        #[arg(long, default_value_t = 1)]
        width: u8,

        /// Read back until the register shows the written value
        #[arg(long)]
        confirm: bool,
    },

    /// Read configuration space or BAR0 directly
    RawRead {
        #[arg(short = 'p', long, help = backend_help())]
        backend: String,

        /// Register window
        #[arg(long, value_enum, default_value_t = Space::Config)]
        space: Space,

        /// Byte offset (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32)]
        offset: u32,

        /// Access width in bytes (1, 2, 4, or 8 for BAR0)
        #[arg(long, default_value_t = 4)]
        width: u8,
    },

    /// Sample the 8051 program counter
    Trace {
        #[arg(short = 'p', long, help = backend_help())]
        backend: String,

        /// Number of samples to take
        #[arg(short = 'c', long, default_value_t = 1_000_000)]
        samples: usize,

        /// Reset the controller before sampling (generation 1 only)
        #[arg(short, long)]
        reset: bool,
    },

    /// List supported controllers
    ListChips,

    /// List compiled-in backends
    ListBackends,
}
