//! Device handle
//!
//! A [`Device`] owns the raw ports of one controller and the capability
//! profile resolved when it was opened. All higher level accessors borrow
//! the device mutably, so a multi-step sequence always has exclusive use
//! of the hardware.

use alloc::boxed::Box;

use crate::bridge::IndirectRegisterBridge;
use crate::code::CodeMemoryLoader;
use crate::cpu::CpuLifecycleController;
use crate::error::{Error, Result};
use crate::identity::{self, CapabilityProfile, ChipEntry, Generation};
use crate::poll::{Delay, PollConfig};
use crate::port::{check_reachable, RawConfigPort, RawMemoryPort};
use crate::trace::PcTracer;

/// Raw ports owned by a device
pub struct RawHandles {
    config: Box<dyn RawConfigPort>,
    bar: Option<Box<dyn RawMemoryPort>>,
}

impl RawHandles {
    /// Bundle a config space port and an optional BAR0 port
    pub fn new(config: Box<dyn RawConfigPort>, bar: Option<Box<dyn RawMemoryPort>>) -> Self {
        Self { config, bar }
    }

    /// Configuration space port
    pub fn config(&mut self) -> &mut (dyn RawConfigPort + 'static) {
        self.config.as_mut()
    }

    /// BAR0 port
    pub fn bar(&mut self) -> Result<&mut (dyn RawMemoryPort + 'static)> {
        match self.bar.as_mut() {
            Some(bar) => Ok(bar.as_mut()),
            None => Err(Error::CapabilityUnsupported("BAR0 access")),
        }
    }
}

impl Delay for RawHandles {
    fn delay_us(&mut self, us: u32) {
        self.config.delay_us(us);
    }
}

/// An opened controller
pub struct Device {
    vendor_id: u16,
    device_id: u16,
    chip: Option<&'static ChipEntry>,
    io: RawHandles,
    poll: PollConfig,
}

impl Device {
    /// Open a device from its raw ports and PCI IDs
    ///
    /// Fails with [`Error::BusUnreachable`] if configuration space reads
    /// back as all ones. Devices missing from the chip table still open;
    /// hardware operations on them fail with
    /// [`Error::UnrecognizedDevice`].
    pub fn open(
        config: Box<dyn RawConfigPort>,
        bar: Option<Box<dyn RawMemoryPort>>,
        vendor_id: u16,
        device_id: u16,
        poll: PollConfig,
    ) -> Result<Self> {
        let mut io = RawHandles::new(config, bar);
        check_reachable(io.config())?;

        let chip = identity::find_chip(vendor_id, device_id);
        match chip {
            Some(c) => log::debug!(
                "Opened {} ({:04x}:{:04x}, {})",
                c.name,
                vendor_id,
                device_id,
                c.profile.generation
            ),
            None => log::debug!(
                "Opened unrecognized device {:04x}:{:04x}",
                vendor_id,
                device_id
            ),
        }

        Ok(Self {
            vendor_id,
            device_id,
            chip,
            io,
            poll,
        })
    }

    /// Chip name, "Unknown" for unrecognized devices
    pub fn name(&self) -> &'static str {
        self.chip.map_or("Unknown", |c| c.name)
    }

    /// PCI vendor ID
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    /// PCI device ID
    pub fn device_id(&self) -> u16 {
        self.device_id
    }

    /// Chip table entry, if recognized
    pub fn chip(&self) -> Option<&'static ChipEntry> {
        self.chip
    }

    /// Capability profile
    pub fn profile(&self) -> Result<&'static CapabilityProfile> {
        self.chip
            .map(|c| c.profile)
            .ok_or(Error::UnrecognizedDevice {
                vendor_id: self.vendor_id,
                device_id: self.device_id,
            })
    }

    /// Protocol generation, if recognized
    pub fn generation(&self) -> Option<Generation> {
        self.chip.map(|c| c.profile.generation)
    }

    /// Polling parameters used by every sequence on this device
    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Direct configuration space access
    pub fn config_port(&mut self) -> &mut (dyn RawConfigPort + 'static) {
        self.io.config()
    }

    /// Direct BAR0 access
    pub fn bar_port(&mut self) -> Result<&mut (dyn RawMemoryPort + 'static)> {
        self.io.bar()
    }

    /// Internal MMIO access
    pub fn bridge(&mut self) -> Result<IndirectRegisterBridge<'_>> {
        let profile = self.profile()?;
        IndirectRegisterBridge::new(profile, &mut self.io, self.poll)
    }

    /// Code RAM access
    pub fn code_loader(&mut self) -> Result<CodeMemoryLoader<'_>> {
        let profile = self.profile()?;
        CodeMemoryLoader::new(profile, &mut self.io, self.poll)
    }

    /// CPU control
    pub fn cpu(&mut self) -> Result<CpuLifecycleController<'_>> {
        let profile = self.profile()?;
        CpuLifecycleController::new(profile, &mut self.io, self.poll)
    }

    /// Program counter sampling
    pub fn pc_tracer(&mut self) -> Result<PcTracer<'_>> {
        let profile = self.profile()?;
        PcTracer::new(profile, &mut self.io)
    }
}
