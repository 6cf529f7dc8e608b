//! Generation-specific access protocols
//!
//! Each controller generation reaches the 8051's internal address spaces
//! through a different set of host-visible ports. The two variants share
//! the [`IndirectAccessProtocol`] interface; the right one is picked from
//! the capability table when the device is opened.

pub mod gen1;
pub mod gen2;

use core::fmt;

use crate::code::{CodeImage, LoadProgress};
use crate::device::RawHandles;
use crate::error::Result;
use crate::identity::Generation;
use crate::poll::PollConfig;

pub use gen1::{Gen1Ports, Gen1Protocol};
pub use gen2::{Gen2Ports, Gen2Protocol};

/// Protocol of 64 KiB parts
pub static GEN1: Gen1Protocol = Gen1Protocol {
    ports: Gen1Ports::DEFAULT,
};

/// Protocol of 128 KiB parts
pub static GEN2: Gen2Protocol = Gen2Protocol {
    ports: Gen2Ports::DEFAULT,
};

/// Low-level steps of one protocol generation
///
/// Implementations carry no state; all state lives in the device's raw
/// handles. Callers must hold the device exclusively for the whole of a
/// multi-step sequence.
pub trait IndirectAccessProtocol: Sync + fmt::Debug {
    /// Protocol generation
    fn generation(&self) -> Generation;

    /// Size of code memory in bytes
    fn code_size(&self) -> u32;

    /// Read one byte of internal MMIO
    fn read_byte(&self, io: &mut RawHandles, poll: &PollConfig, addr: u32) -> Result<u8>;

    /// Write one byte of internal MMIO
    fn write_byte(&self, io: &mut RawHandles, poll: &PollConfig, addr: u32, value: u8)
        -> Result<()>;

    /// Whether written code can be read back for verification
    fn can_read_code(&self) -> bool;

    /// Open or close the host side code RAM ports
    ///
    /// This is separate from the code control register inside the chip,
    /// which the caller handles through the MMIO bridge.
    fn set_code_ports(&self, io: &mut RawHandles, enable: bool) -> Result<()>;

    /// Transfer an image into code RAM
    ///
    /// Write access must already be enabled. Offsets past the end of code
    /// memory wrap around to 0.
    fn write_code(
        &self,
        io: &mut RawHandles,
        poll: &PollConfig,
        image: &CodeImage<'_>,
        progress: &mut dyn LoadProgress,
    ) -> Result<()>;

    /// Read `buf.len()` bytes of code RAM starting at `base`
    ///
    /// Read access must already be enabled.
    fn read_code(
        &self,
        io: &mut RawHandles,
        poll: &PollConfig,
        base: u32,
        buf: &mut [u8],
        progress: &mut dyn LoadProgress,
    ) -> Result<()>;
}
