//! 8051 lifecycle control
//!
//! Loading and starting code follows a fixed order:
//!
//! 1. halt the CPU
//! 2. write the image to code RAM at address 0
//! 3. select code RAM as the boot source (and the clock divider)
//! 4. release the CPU
//!
//! If step 2 fails the CPU is left halted, never running from a partially
//! written image.

use crate::bridge::IndirectRegisterBridge;
use crate::code::{CodeImage, CodeMemoryLoader, LoadProgress, NoProgress};
use crate::device::RawHandles;
use crate::error::{Error, Result};
use crate::identity::CapabilityProfile;
use crate::poll::PollConfig;
use crate::port::Width;
use crate::protocol::IndirectAccessProtocol;
use crate::regs::{CpuExecCtrl, CpuModeNext};

/// Halts, loads and releases the 8051
pub struct CpuLifecycleController<'a> {
    profile: &'static CapabilityProfile,
    protocol: &'static dyn IndirectAccessProtocol,
    io: &'a mut RawHandles,
    poll: PollConfig,
}

impl<'a> CpuLifecycleController<'a> {
    pub(crate) fn new(
        profile: &'static CapabilityProfile,
        io: &'a mut RawHandles,
        poll: PollConfig,
    ) -> Result<Self> {
        let protocol = profile
            .protocol
            .ok_or(Error::CapabilityUnsupported("hardware CPU control"))?;
        Ok(Self {
            profile,
            protocol,
            io,
            poll,
        })
    }

    fn bridge(&mut self) -> IndirectRegisterBridge<'_> {
        IndirectRegisterBridge::with_protocol(self.profile, self.protocol, self.io, self.poll)
    }

    /// Hold the CPU in reset
    pub fn halt(&mut self) -> Result<()> {
        log::debug!("Halting CPU");
        let addr = self.profile.cpu_exec_ctrl;
        self.bridge()
            .write(addr, Width::Byte, CpuExecCtrl::HALT.bits() as u64, false)
    }

    /// Let the CPU run
    pub fn release(&mut self) -> Result<()> {
        log::debug!("Releasing CPU");
        let addr = self.profile.cpu_exec_ctrl;
        self.bridge()
            .write(addr, Width::Byte, CpuExecCtrl::empty().bits() as u64, false)
    }

    /// Whether the CPU is held in reset
    pub fn is_halted(&mut self) -> Result<bool> {
        let addr = self.profile.cpu_exec_ctrl;
        let ctrl = self.bridge().read(addr, Width::Byte)?;
        Ok(CpuExecCtrl::from_bits_retain(ctrl as u8).contains(CpuExecCtrl::HALT))
    }

    /// Boot from code RAM at the next release
    pub fn set_boot_mode(&mut self, half_speed: bool) -> Result<()> {
        let mut mode = CpuModeNext::BOOT_FROM_CODE_RAM;
        mode.set(CpuModeNext::HALF_SPEED, half_speed);
        log::debug!("Setting boot mode {:?}", mode);

        let addr = self.profile.cpu_mode_next;
        self.bridge()
            .write(addr, Width::Byte, mode.bits() as u64, false)
    }

    /// Load `code` at address 0 and run it
    pub fn load_and_run(&mut self, code: &[u8], half_speed: bool) -> Result<()> {
        self.load_and_run_with_progress(code, half_speed, &mut NoProgress)
    }

    /// Load `code` at address 0 and run it, reporting progress
    pub fn load_and_run_with_progress(
        &mut self,
        code: &[u8],
        half_speed: bool,
        progress: &mut dyn LoadProgress,
    ) -> Result<()> {
        let image = CodeImage::new(0, code);
        image.validate(self.profile)?;

        self.halt()?;

        let mut loader = CodeMemoryLoader::new(self.profile, self.io, self.poll)?;
        if let Err(e) = loader.load_with_progress(&image, progress) {
            log::debug!("Load failed, leaving CPU halted");
            return Err(e);
        }

        self.set_boot_mode(half_speed)?;
        self.release()
    }
}
