//! Program counter sampling
//!
//! The 8051 publishes its current program counter to the host. Generation 1
//! parts return it from the lower code data port in configuration space,
//! generation 2 parts from a BAR0 register. Samples are taken back to back,
//! without any delay, to catch the code path as densely as the bus allows.
//!
//! Generation 1 parts can also be reset through configuration space, so a
//! trace can start at the reset vector.

use alloc::vec::Vec;

use crate::device::RawHandles;
use crate::error::{Error, Result};
use crate::identity::{CapabilityProfile, Generation};
use crate::port::Width;
use crate::regs;

/// Where program counter samples come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcSource {
    /// Configuration space [`regs::PC_STATUS`]
    Config,
    /// BAR0 [`regs::HW_PC_STATUS`]
    Bar,
}

/// Samples the 8051 program counter
pub struct PcTracer<'a> {
    source: PcSource,
    io: &'a mut RawHandles,
}

impl<'a> PcTracer<'a> {
    pub(crate) fn new(profile: &'static CapabilityProfile, io: &'a mut RawHandles) -> Result<Self> {
        let source = match profile.generation {
            Generation::Gen1 => PcSource::Config,
            Generation::Gen2 => {
                io.bar()?;
                PcSource::Bar
            }
            Generation::None => {
                return Err(Error::CapabilityUnsupported("program counter tracing"))
            }
        };
        Ok(Self { source, io })
    }

    /// Register the samples are read from
    pub fn source(&self) -> PcSource {
        self.source
    }

    /// Pulse the controller reset
    ///
    /// Only available when sampling through configuration space.
    pub fn reset(&mut self) -> Result<()> {
        if self.source != PcSource::Config {
            return Err(Error::CapabilityUnsupported("controller reset"));
        }
        log::debug!("Resetting controller");
        let config = self.io.config();
        config.write(
            regs::CONTROLLER_RESET,
            Width::Dword,
            regs::CONTROLLER_RESET_ASSERT,
        )?;
        config.write(regs::CONTROLLER_RESET, Width::Dword, 0)
    }

    /// Read the program counter once
    pub fn sample(&mut self) -> Result<u16> {
        let value = match self.source {
            PcSource::Config => self.io.config().read(regs::PC_STATUS, Width::Dword)?,
            PcSource::Bar => self.io.bar()?.read(regs::HW_PC_STATUS, Width::Word)?,
        };
        Ok(value as u16)
    }

    /// Take `count` samples back to back
    pub fn collect(&mut self, count: usize) -> Result<Vec<u16>> {
        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            samples.push(self.sample()?);
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;

    use crate::identity::{PROFILE_GEN1, PROFILE_GEN2, PROFILE_NONE};
    use crate::poll::Delay;
    use crate::port::RawConfigPort;

    /// Config space whose PC status counts up on every read
    struct PcPort {
        pc: u16,
    }

    impl Delay for PcPort {
        fn delay_us(&mut self, _us: u32) {}
    }

    impl RawConfigPort for PcPort {
        fn read_raw(&mut self, offset: u16, _width: Width) -> Result<u64> {
            if offset != regs::PC_STATUS {
                return Ok(0);
            }
            self.pc = self.pc.wrapping_add(1);
            Ok(0xabcd_0000 | self.pc as u64)
        }

        fn write_raw(&mut self, _offset: u16, _width: Width, _value: u64) -> Result<()> {
            Ok(())
        }
    }

    fn handles() -> RawHandles {
        RawHandles::new(Box::new(PcPort { pc: 0 }), None)
    }

    #[test]
    fn test_config_samples_keep_low_half() {
        let mut io = handles();
        let mut tracer = PcTracer::new(&PROFILE_GEN1, &mut io).unwrap();
        assert_eq!(tracer.source(), PcSource::Config);
        assert_eq!(tracer.collect(3).unwrap(), [1, 2, 3]);
        assert!(tracer.collect(0).unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_sources() {
        let mut io = handles();
        assert_eq!(
            PcTracer::new(&PROFILE_NONE, &mut io).err(),
            Some(Error::CapabilityUnsupported("program counter tracing"))
        );
        // Generation 2 needs BAR0
        assert_eq!(
            PcTracer::new(&PROFILE_GEN2, &mut io).err(),
            Some(Error::CapabilityUnsupported("BAR0 access"))
        );
    }
}
