//! Code RAM loading
//!
//! [`CodeMemoryLoader`] writes a [`CodeImage`] into the 8051's code RAM and,
//! where the hardware allows it, reads the image back and compares it.
//!
//! Sequence:
//!
//! 1. validate the image against the capability profile (no hardware access)
//! 2. set the write-enable bit (and, on generation 2, the read-enable bit)
//!    in the code control register, open the host side code ports
//! 3. transfer the image
//! 4. (generation 2) read back, compare
//! 5. clear the enable bits and close the code ports, even if 2-4 failed

use alloc::vec;
use alloc::vec::Vec;

use crate::bridge::IndirectRegisterBridge;
use crate::device::RawHandles;
use crate::error::{Error, Result};
use crate::identity::CapabilityProfile;
use crate::poll::PollConfig;
use crate::port::Width;
use crate::protocol::IndirectAccessProtocol;
use crate::regs::CodeCtrl;

/// Progress callbacks for code RAM transfers
pub trait LoadProgress {
    /// Called when starting to write
    fn writing(&mut self, total_bytes: usize);

    /// Called to update write progress
    fn write_progress(&mut self, bytes_written: usize);

    /// Called when starting to read back for verification
    fn verifying(&mut self, total_bytes: usize);

    /// Called to update verification progress
    fn verify_progress(&mut self, bytes_read: usize);
}

/// A no-op progress reporter
pub struct NoProgress;

impl LoadProgress for NoProgress {
    fn writing(&mut self, _total_bytes: usize) {}
    fn write_progress(&mut self, _bytes_written: usize) {}
    fn verifying(&mut self, _total_bytes: usize) {}
    fn verify_progress(&mut self, _bytes_read: usize) {}
}

/// Code to be placed in code RAM
#[derive(Debug, Clone, Copy)]
pub struct CodeImage<'a> {
    base: u32,
    data: &'a [u8],
}

impl<'a> CodeImage<'a> {
    /// Create an image to be written at `base`
    pub fn new(base: u32, data: &'a [u8]) -> Self {
        Self { base, data }
    }

    /// Target address in code RAM
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Image contents
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Image length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check the image against a capability profile
    ///
    /// Checks run in a fixed order and the first violation is returned:
    /// code access, address range and alignment, length limit, length
    /// parity.
    pub fn validate(&self, profile: &CapabilityProfile) -> Result<()> {
        check_range(profile, self.base, self.data.len())
    }
}

fn check_range(profile: &CapabilityProfile, base: u32, len: usize) -> Result<()> {
    if !profile.has_code() {
        return Err(Error::CapabilityUnsupported("hardware code RAM access"));
    }

    let limit = profile.code_size;
    if base % 2 != 0 || base > limit - 2 {
        return Err(Error::InvalidAddress(base));
    }

    if len > limit as usize || len % 2 != 0 {
        return Err(Error::InvalidLength(len));
    }

    Ok(())
}

/// Writes (and verifies) code RAM
pub struct CodeMemoryLoader<'a> {
    profile: &'static CapabilityProfile,
    protocol: &'static dyn IndirectAccessProtocol,
    io: &'a mut RawHandles,
    poll: PollConfig,
}

impl<'a> CodeMemoryLoader<'a> {
    pub(crate) fn new(
        profile: &'static CapabilityProfile,
        io: &'a mut RawHandles,
        poll: PollConfig,
    ) -> Result<Self> {
        let protocol = profile
            .protocol
            .ok_or(Error::CapabilityUnsupported("hardware code RAM access"))?;
        Ok(Self {
            profile,
            protocol,
            io,
            poll,
        })
    }

    /// Whether loads are verified by reading back
    pub fn verifies(&self) -> bool {
        self.protocol.can_read_code()
    }

    /// Write an image to code RAM
    pub fn load(&mut self, image: &CodeImage<'_>) -> Result<()> {
        self.load_with_progress(image, &mut NoProgress)
    }

    /// Write an image to code RAM, reporting progress
    pub fn load_with_progress(
        &mut self,
        image: &CodeImage<'_>,
        progress: &mut dyn LoadProgress,
    ) -> Result<()> {
        image.validate(self.profile)?;

        log::debug!(
            "Writing {:#x} bytes of code at {:#06x} ({})",
            image.len(),
            image.base(),
            self.protocol.generation()
        );

        let mut bits = CodeCtrl::WRITE_ENABLE;
        if self.verifies() {
            // Half covered slots are read before they are written
            bits |= CodeCtrl::READ_ENABLE;
        }
        let result = self
            .enable(bits)
            .and_then(|()| self.transfer(image, progress));
        let cleanup = self.disable();

        match (result, cleanup) {
            (Err(e), Err(cleanup_err)) => {
                log::warn!("Failed to disable code RAM access: {}", cleanup_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), cleanup) => cleanup,
        }
    }

    /// Read `len` bytes of code RAM starting at `base`
    pub fn read_back(&mut self, base: u32, len: usize) -> Result<Vec<u8>> {
        check_range(self.profile, base, len)?;
        if !self.verifies() {
            return Err(Error::CapabilityUnsupported("code RAM readback"));
        }

        let mut buf = vec![0u8; len];
        let result = self
            .enable(CodeCtrl::READ_ENABLE)
            .and_then(|()| self.read_into(base, &mut buf, &mut NoProgress));
        let cleanup = self.disable();

        result?;
        cleanup?;
        Ok(buf)
    }

    fn bridge(&mut self) -> IndirectRegisterBridge<'_> {
        IndirectRegisterBridge::with_protocol(self.profile, self.protocol, self.io, self.poll)
    }

    /// Read-modify-write of the code control register
    fn update_ctrl(&mut self, set: CodeCtrl, clear: CodeCtrl) -> Result<()> {
        let addr = self.profile.code_ctrl;
        let mut bridge = self.bridge();
        let current = CodeCtrl::from_bits_retain(bridge.read(addr, Width::Byte)? as u8);
        let next = current.union(set).difference(clear);
        bridge.write(addr, Width::Byte, next.bits() as u64, true)
    }

    fn enable(&mut self, bits: CodeCtrl) -> Result<()> {
        log::debug!("Enabling code RAM access ({:?})", bits);
        self.update_ctrl(bits, CodeCtrl::empty())?;
        self.protocol.set_code_ports(self.io, true)
    }

    /// Close every code RAM access path, attempting all steps
    fn disable(&mut self) -> Result<()> {
        log::debug!("Disabling code RAM access");
        let mut bits = CodeCtrl::WRITE_ENABLE;
        if self.verifies() {
            bits |= CodeCtrl::READ_ENABLE;
        }
        let ctrl = self.update_ctrl(CodeCtrl::empty(), bits);
        let ports = self.protocol.set_code_ports(self.io, false);
        ctrl.and(ports)
    }

    fn read_into(
        &mut self,
        base: u32,
        buf: &mut [u8],
        progress: &mut dyn LoadProgress,
    ) -> Result<()> {
        self.protocol
            .read_code(self.io, &self.poll, base, buf, progress)
    }

    fn transfer(&mut self, image: &CodeImage<'_>, progress: &mut dyn LoadProgress) -> Result<()> {
        self.protocol
            .write_code(self.io, &self.poll, image, progress)?;

        if !self.verifies() {
            return Ok(());
        }

        let mut readback = vec![0u8; image.len()];
        self.read_into(image.base(), &mut readback, progress)?;

        compare(self.protocol.code_size(), image, &readback)
    }
}

/// Compare a readback buffer with the image that was written
fn compare(code_size: u32, image: &CodeImage<'_>, readback: &[u8]) -> Result<()> {
    let mismatch = image
        .data()
        .chunks_exact(2)
        .zip(readback.chunks_exact(2))
        .position(|(expected, found)| expected != found);

    match mismatch {
        None => Ok(()),
        Some(word) => {
            let i = 2 * word;
            Err(Error::VerificationFailed {
                address: (image.base() + i as u32) % code_size,
                expected: u16::from_le_bytes([image.data()[i], image.data()[i + 1]]),
                found: u16::from_le_bytes([readback[i], readback[i + 1]]),
            })
        }
    }
}
