//! xhcfw-core - Indirect register access for ASMedia xHCI controllers
//!
//! ASMedia USB 3 host controllers contain an 8051 microcontroller whose
//! register file (XDATA/MMIO) and code RAM are not mapped into the host's
//! address space. This crate reaches both through the indirect ports the
//! controllers expose in PCI configuration space and BAR0, and sequences
//! halting, loading and restarting the 8051.
//!
//! The crate is `no_std` (with `alloc`). Hardware access goes through the
//! [`RawConfigPort`] and [`RawMemoryPort`] traits, implemented by backend
//! crates.
//!
//! # Features
//!
//! - `std` - implement `std::error::Error` for [`Error`]
//!
//! # Example
//!
//! ```ignore
//! use xhcfw_core::{Device, PollConfig};
//!
//! let mut dev = Device::open(config, Some(bar), 0x1b21, 0x2142, PollConfig::default())?;
//! println!("Chip: {}", dev.name());
//! dev.cpu()?.load_and_run(&code, true)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bridge;
pub mod code;
pub mod cpu;
pub mod device;
pub mod error;
pub mod identity;
pub mod poll;
pub mod port;
pub mod protocol;
pub mod regs;
pub mod trace;

pub use bridge::IndirectRegisterBridge;
pub use code::{CodeImage, CodeMemoryLoader, LoadProgress, NoProgress};
pub use cpu::CpuLifecycleController;
pub use device::{Device, RawHandles};
pub use error::{Error, Result};
pub use identity::{chip_name, chips, resolve, CapabilityProfile, ChipEntry, Generation};
pub use poll::{Delay, PollConfig};
pub use port::{RawConfigPort, RawMemoryPort, Width};
pub use protocol::IndirectAccessProtocol;
pub use trace::{PcSource, PcTracer};
