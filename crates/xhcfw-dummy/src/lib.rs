//! xhcfw-dummy - Emulated ASMedia xHCI controller
//!
//! Emulates the configuration space and BAR0 of both controller
//! generations, including the internal MMIO space and code RAM behind the
//! indirect ports. Useful for testing and development without hardware.
//!
//! The address latches can be made slow (`latch_delay`) and the generation
//! 2 engine can report busy for a while after each access (`busy_cycles`).
//! [`Faults`] break the emulation in specific ways.

mod model;

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;
use xhcfw_core::identity::ASMEDIA_VID;
use xhcfw_core::{Delay, Device, PollConfig, RawConfigPort, RawMemoryPort, Width};

use model::Model;

pub use model::{BAR_SIZE, CONFIG_SIZE};

/// Errors from parsing dummy options
#[derive(Debug, Error)]
pub enum DummyError {
    /// Chip name not known
    #[error("Unknown chip '{0}' (known: asm1042, asm1042a, asm1142, asm2142, asm3142, asm3242)")]
    UnknownChip(String),

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },
}

/// Ways to make the emulation misbehave
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Faults {
    /// Address latches ignore writes
    pub stuck_latch: bool,
    /// The generation 2 engine never goes idle
    pub stuck_busy: bool,
    /// Code RAM data port writes fail
    pub fail_code_write: bool,
    /// Code RAM word that reads back corrupted
    pub corrupt_readback: Option<u32>,
    /// Configuration space reads as all ones
    pub unreachable: bool,
}

/// Configuration for the emulated controller
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// PCI vendor ID
    pub vendor_id: u16,
    /// PCI device ID
    pub device_id: u16,
    /// Reads before a written address shows up in its latch
    pub latch_delay: u32,
    /// Status reads that report busy after each engine access
    pub busy_cycles: u32,
    /// Injected faults
    pub faults: Faults,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            vendor_id: ASMEDIA_VID,
            device_id: 0x2142, // ASM2142/ASM3142
            latch_delay: 2,
            busy_cycles: 2,
            faults: Faults::default(),
        }
    }
}

impl DummyConfig {
    /// Configuration for a chip by name
    pub fn for_chip(name: &str) -> Result<Self, DummyError> {
        let device_id = match name.to_ascii_lowercase().as_str() {
            "asm1042" => 0x1042,
            "asm1042a" => 0x1142,
            "asm1142" => 0x1242,
            "asm2142" | "asm3142" => 0x2142,
            "asm3242" => 0x3242,
            _ => return Err(DummyError::UnknownChip(name.to_string())),
        };
        Ok(Self {
            device_id,
            ..Self::default()
        })
    }

    /// Parse backend options
    ///
    /// Recognized keys: `chip`, `vid`, `did`, `latch_delay`, `busy_cycles`,
    /// and the faults `stuck_latch`, `stuck_busy`, `fail_code_write`,
    /// `corrupt=<code address>`, `unreachable`.
    pub fn from_options(options: &[(&str, &str)]) -> Result<Self, DummyError> {
        let mut config = Self::default();

        // chip first so that vid/did can override it
        if let Some((_, chip)) = options.iter().find(|(k, _)| *k == "chip") {
            config = Self::for_chip(chip)?;
        }

        for (key, value) in options {
            match *key {
                "chip" => {}
                "vid" => config.vendor_id = parse_id("vid", value)?,
                "did" => config.device_id = parse_id("did", value)?,
                "latch_delay" => config.latch_delay = parse_num("latch_delay", value)?,
                "busy_cycles" => config.busy_cycles = parse_num("busy_cycles", value)?,
                "stuck_latch" => config.faults.stuck_latch = value != &"0",
                "stuck_busy" => config.faults.stuck_busy = value != &"0",
                "fail_code_write" => config.faults.fail_code_write = value != &"0",
                "unreachable" => config.faults.unreachable = value != &"0",
                "corrupt" => config.faults.corrupt_readback = Some(parse_num("corrupt", value)?),
                _ => {
                    log::warn!("Unknown dummy option: {}={}", key, value);
                }
            }
        }

        Ok(config)
    }
}

/// Parse a 16-bit PCI ID
fn parse_id(name: &'static str, value: &str) -> Result<u16, DummyError> {
    u16::try_from(parse_num(name, value)?).map_err(|e| DummyError::InvalidParameter {
        name,
        message: e.to_string(),
    })
}

/// Parse a decimal or 0x-prefixed hex number
fn parse_num(name: &'static str, value: &str) -> Result<u32, DummyError> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| DummyError::InvalidParameter {
        name,
        message: e.to_string(),
    })
}

/// An emulated controller
///
/// Cloning shares the emulated hardware; the ports handed to a [`Device`]
/// and the inspection methods here see the same state.
#[derive(Clone)]
pub struct DummyController {
    model: Rc<RefCell<Model>>,
}

impl DummyController {
    /// Create a controller
    pub fn new(config: DummyConfig) -> Self {
        Self {
            model: Rc::new(RefCell::new(Model::new(config))),
        }
    }

    /// Open the controller as a [`Device`]
    pub fn open(&self, poll: PollConfig) -> xhcfw_core::Result<Device> {
        let (vendor_id, device_id, has_bar) = {
            let model = self.model.borrow();
            (
                model.config.vendor_id,
                model.config.device_id,
                model.has_bar(),
            )
        };

        let config = Box::new(DummyConfigPort {
            model: Rc::clone(&self.model),
        });
        let bar: Option<Box<dyn RawMemoryPort>> = if has_bar {
            Some(Box::new(DummyBarPort {
                model: Rc::clone(&self.model),
            }))
        } else {
            None
        };

        Device::open(config, bar, vendor_id, device_id, poll)
    }

    /// Contents of code RAM
    pub fn code(&self) -> Vec<u8> {
        self.model.borrow().code.clone()
    }

    /// Overwrite code RAM directly
    pub fn set_code(&self, offset: usize, data: &[u8]) {
        self.model.borrow_mut().code[offset..offset + data.len()].copy_from_slice(data);
    }

    /// One byte of the internal MMIO space
    pub fn internal(&self, addr: u32) -> u8 {
        self.model.borrow().internal[addr as usize]
    }

    /// Number of host writes to configuration space or BAR0
    pub fn writes(&self) -> usize {
        self.model.borrow().writes
    }

    /// Number of code RAM words stored
    pub fn code_writes(&self) -> usize {
        self.model.borrow().code_writes
    }

    /// Internal MMIO byte writes, in order
    pub fn mmio_writes(&self) -> Vec<(u32, u8)> {
        self.model.borrow().mmio_writes.clone()
    }

    /// Total time spent in delays
    pub fn elapsed_us(&self) -> u64 {
        self.model.borrow().elapsed_us
    }

    /// Replace the injected faults
    pub fn set_faults(&self, faults: Faults) {
        self.model.borrow_mut().config.faults = faults;
    }
}

/// Configuration space of a [`DummyController`]
pub struct DummyConfigPort {
    model: Rc<RefCell<Model>>,
}

impl Delay for DummyConfigPort {
    fn delay_us(&mut self, us: u32) {
        self.model.borrow_mut().delay(us);
    }
}

impl RawConfigPort for DummyConfigPort {
    fn read_raw(&mut self, offset: u16, width: Width) -> xhcfw_core::Result<u64> {
        self.model.borrow_mut().config_read(offset, width)
    }

    fn write_raw(&mut self, offset: u16, width: Width, value: u64) -> xhcfw_core::Result<()> {
        self.model.borrow_mut().config_write(offset, width, value)
    }
}

/// BAR0 of a [`DummyController`]
pub struct DummyBarPort {
    model: Rc<RefCell<Model>>,
}

impl Delay for DummyBarPort {
    fn delay_us(&mut self, us: u32) {
        self.model.borrow_mut().delay(us);
    }
}

impl RawMemoryPort for DummyBarPort {
    fn size(&mut self) -> xhcfw_core::Result<usize> {
        Ok(BAR_SIZE)
    }

    fn read_raw(&mut self, offset: usize, width: Width) -> xhcfw_core::Result<u64> {
        self.model.borrow_mut().bar_read(offset, width)
    }

    fn write_raw(&mut self, offset: usize, width: Width, value: u64) -> xhcfw_core::Result<()> {
        self.model.borrow_mut().bar_write(offset, width, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xhcfw_core::identity::{PROFILE_GEN1, PROFILE_GEN2};
    use xhcfw_core::regs::{self, CodeCtrl, CpuExecCtrl, CpuModeNext};
    use xhcfw_core::{CodeImage, Error, Generation, PcSource};

    fn controller(chip: &str) -> DummyController {
        DummyController::new(DummyConfig::for_chip(chip).unwrap())
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + (i >> 8)) as u8).collect()
    }

    #[test]
    fn test_options() {
        let config = DummyConfig::from_options(&[
            ("chip", "asm1142"),
            ("latch_delay", "5"),
            ("corrupt", "0x100"),
            ("stuck_busy", "1"),
        ])
        .unwrap();
        assert_eq!(config.device_id, 0x1242);
        assert_eq!(config.latch_delay, 5);
        assert_eq!(config.faults.corrupt_readback, Some(0x100));
        assert!(config.faults.stuck_busy);
        assert!(!config.faults.stuck_latch);

        assert!(matches!(
            DummyConfig::from_options(&[("chip", "asm9999")]),
            Err(DummyError::UnknownChip(_))
        ));
        assert!(matches!(
            DummyConfig::from_options(&[("busy_cycles", "lots")]),
            Err(DummyError::InvalidParameter { name: "busy_cycles", .. })
        ));
    }

    #[test]
    fn test_options_reject_wide_ids() {
        let config = DummyConfig::from_options(&[("vid", "0x8086"), ("did", "65535")]).unwrap();
        assert_eq!(config.vendor_id, 0x8086);
        assert_eq!(config.device_id, 0xffff);

        assert!(matches!(
            DummyConfig::from_options(&[("vid", "0x12345")]),
            Err(DummyError::InvalidParameter { name: "vid", .. })
        ));
        assert!(matches!(
            DummyConfig::from_options(&[("did", "65536")]),
            Err(DummyError::InvalidParameter { name: "did", .. })
        ));
    }

    #[test]
    fn test_open_identifies_chip() {
        let dev = controller("asm3242").open(PollConfig::default()).unwrap();
        assert_eq!(dev.name(), "ASM3242");
        assert_eq!(dev.generation(), Some(Generation::Gen2));
        assert_eq!(dev.profile().unwrap().code_size, 0x18000);
    }

    #[test]
    fn test_unreachable_bus() {
        let mut config = DummyConfig::for_chip("asm1142").unwrap();
        config.faults.unreachable = true;
        let ctrl = DummyController::new(config);
        assert!(matches!(
            ctrl.open(PollConfig::default()),
            Err(Error::BusUnreachable)
        ));
    }

    #[test]
    fn test_unrecognized_device() {
        let ctrl = DummyController::new(DummyConfig {
            vendor_id: 0x8086,
            device_id: 0x1e31,
            ..DummyConfig::default()
        });
        let mut dev = ctrl.open(PollConfig::default()).unwrap();
        let unrecognized = Error::UnrecognizedDevice {
            vendor_id: 0x8086,
            device_id: 0x1e31,
        };

        assert_eq!(dev.name(), "Unknown");
        assert_eq!(dev.generation(), None);
        assert!(matches!(dev.bridge(), Err(e) if e == unrecognized));
        assert!(matches!(dev.code_loader(), Err(e) if e == unrecognized));
        assert!(matches!(dev.cpu(), Err(e) if e == unrecognized));
        // Identification still works
        assert_eq!(dev.config_port().read(0, Width::Word).unwrap(), 0x8086);
        assert_eq!(ctrl.writes(), 0);
    }

    #[test]
    fn test_no_host_access() {
        let ctrl = controller("asm1042");
        let mut dev = ctrl.open(PollConfig::default()).unwrap();

        assert_eq!(dev.name(), "ASM1042");
        assert!(matches!(dev.bridge(), Err(Error::CapabilityUnsupported(_))));
        assert!(matches!(
            dev.code_loader(),
            Err(Error::CapabilityUnsupported(_))
        ));
        assert!(matches!(dev.cpu(), Err(Error::CapabilityUnsupported(_))));
        assert!(matches!(dev.bar_port(), Err(Error::CapabilityUnsupported(_))));
    }

    #[test]
    fn test_gen1_bridge_round_trip() {
        let ctrl = controller("asm1142");
        let mut dev = ctrl.open(PollConfig::default()).unwrap();
        let mut bridge = dev.bridge().unwrap();

        for (width, value) in [
            (Width::Byte, 0x5a),
            (Width::Word, 0xc0de),
            (Width::Dword, 0x1234_5678),
        ] {
            bridge.write(0x8000, width, value, true).unwrap();
            assert_eq!(bridge.read(0x8000, width).unwrap(), value);
        }

        assert_eq!(ctrl.internal(0x8000), 0x78);
        assert_eq!(ctrl.internal(0x8003), 0x12);
    }

    #[test]
    fn test_gen1_settle_delay_per_byte() {
        for width in [Width::Byte, Width::Word, Width::Dword] {
            for settle_us in [0, 7] {
                let ctrl = DummyController::new(DummyConfig {
                    device_id: 0x1242,
                    latch_delay: 0,
                    ..DummyConfig::default()
                });
                let poll = PollConfig::default().with_settle_us(settle_us);
                let mut dev = ctrl.open(poll).unwrap();
                let mut bridge = dev.bridge().unwrap();
                let start = ctrl.elapsed_us();
                let expected = width.bytes() as u64 * settle_us as u64;

                bridge.write(0x8000, width, 0, false).unwrap();
                assert_eq!(ctrl.elapsed_us() - start, expected, "write {:?}", width);

                bridge.read(0x8000, width).unwrap();
                assert_eq!(ctrl.elapsed_us() - start, 2 * expected, "read {:?}", width);
            }
        }
    }

    #[test]
    fn test_gen2_bridge_round_trip() {
        let ctrl = controller("asm3142");
        let mut dev = ctrl.open(PollConfig::default()).unwrap();
        let mut bridge = dev.bridge().unwrap();

        for (width, value) in [
            (Width::Byte, 0xa5),
            (Width::Word, 0xbeef),
            (Width::Dword, 0xdead_beef),
        ] {
            bridge.write(0x1_2340, width, value, true).unwrap();
            assert_eq!(bridge.read(0x1_2340, width).unwrap(), value);
        }

        // Bit 16 selects the high bank
        assert_eq!(ctrl.internal(0x1_2340), 0xef);
        assert_eq!(ctrl.internal(0x2340), 0x00);
    }

    #[test]
    fn test_gen2_bridge_rejects_out_of_range() {
        let ctrl = controller("asm3142");
        let mut dev = ctrl.open(PollConfig::default()).unwrap();
        let mut bridge = dev.bridge().unwrap();

        assert_eq!(
            bridge.read(0x2_0000, Width::Byte),
            Err(Error::InvalidAddress(0x2_0000))
        );
        assert_eq!(
            bridge.write(0, Width::Qword, 0, false),
            Err(Error::InvalidWidth(8))
        );
        assert_eq!(ctrl.writes(), 0);
    }

    fn gen2_round_trip(base: u32, len: usize) {
        let ctrl = controller("asm3142");
        let mut dev = ctrl.open(PollConfig::default()).unwrap();
        let data = pattern(len);

        dev.code_loader()
            .unwrap()
            .load(&CodeImage::new(base, &data))
            .unwrap();

        let code = ctrl.code();
        for (i, byte) in data.iter().enumerate() {
            assert_eq!(
                code[(base as usize + i) % code.len()],
                *byte,
                "code byte {:#x}",
                i
            );
        }

        let readback = dev.code_loader().unwrap().read_back(base, len).unwrap();
        assert_eq!(readback, data);

        // Access closed again
        let ctrl_reg = CodeCtrl::from_bits_retain(ctrl.internal(PROFILE_GEN2.code_ctrl));
        assert!(ctrl_reg.is_empty());
        assert_eq!(
            dev.config_port()
                .read(regs::CODE_PORT_ENABLE, Width::Byte)
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_gen2_round_trip_boundaries() {
        for len in [0x2, 0x8000, 0x8002, 0x18000] {
            gen2_round_trip(0, len);
        }
    }

    #[test]
    fn test_gen2_round_trip_offset_and_wrap() {
        gen2_round_trip(0x7ffe, 0x4);
        gen2_round_trip(0x10000, 0x18000);
        gen2_round_trip(0x17ffe, 0x18000);
    }

    #[test]
    fn test_gen2_partial_slot_keeps_other_lane() {
        let ctrl = controller("asm3142");
        ctrl.set_code(0x0000, &[0x02, 0x10]);
        ctrl.set_code(0x8002, &[0x33, 0x44]);
        let mut dev = ctrl.open(PollConfig::default()).unwrap();

        // Lane B of slot 0 only
        dev.code_loader()
            .unwrap()
            .load(&CodeImage::new(0x8000, &[0xaa, 0xbb]))
            .unwrap();
        // Lane A of slot 2 only
        dev.code_loader()
            .unwrap()
            .load(&CodeImage::new(0x0002, &[0xcc, 0xdd]))
            .unwrap();

        let code = ctrl.code();
        assert_eq!(&code[0x0000..0x0002], &[0x02, 0x10]);
        assert_eq!(&code[0x8000..0x8002], &[0xaa, 0xbb]);
        assert_eq!(&code[0x0002..0x0004], &[0xcc, 0xdd]);
        assert_eq!(&code[0x8002..0x8004], &[0x33, 0x44]);
        assert!(CodeCtrl::from_bits_retain(ctrl.internal(PROFILE_GEN2.code_ctrl)).is_empty());
    }

    #[test]
    fn test_gen1_load() {
        let ctrl = controller("asm1042a");
        let mut dev = ctrl.open(PollConfig::default()).unwrap();
        let data = pattern(0x10000);

        let mut loader = dev.code_loader().unwrap();
        assert!(!loader.verifies());
        loader.load(&CodeImage::new(0, &data)).unwrap();

        assert_eq!(ctrl.code(), data);
        assert_eq!(ctrl.code_writes(), 0x8000);
        let ctrl_reg = CodeCtrl::from_bits_retain(ctrl.internal(PROFILE_GEN1.code_ctrl));
        assert!(!ctrl_reg.contains(CodeCtrl::WRITE_ENABLE));

        assert_eq!(
            dev.code_loader().unwrap().read_back(0, 2),
            Err(Error::CapabilityUnsupported("code RAM readback"))
        );
    }

    #[test]
    fn test_gen1_load_wraps() {
        let ctrl = controller("asm1142");
        let mut dev = ctrl.open(PollConfig::default()).unwrap();

        dev.code_loader()
            .unwrap()
            .load(&CodeImage::new(0xfffe, &[1, 2, 3, 4]))
            .unwrap();

        let code = ctrl.code();
        assert_eq!(&code[0xfffe..], &[1, 2]);
        assert_eq!(&code[..2], &[3, 4]);
    }

    #[test]
    fn test_invalid_images_have_no_side_effects() {
        for chip in ["asm1142", "asm3142"] {
            let ctrl = controller(chip);
            let mut dev = ctrl.open(PollConfig::default()).unwrap();
            let limit = dev.profile().unwrap().code_size as usize;

            let odd = pattern(3);
            let long = pattern(limit + 2);
            let even = pattern(4);

            let mut loader = dev.code_loader().unwrap();
            assert_eq!(
                loader.load(&CodeImage::new(0, &odd)),
                Err(Error::InvalidLength(3))
            );
            assert_eq!(
                loader.load(&CodeImage::new(0, &long)),
                Err(Error::InvalidLength(limit + 2))
            );
            assert_eq!(
                loader.load(&CodeImage::new(1, &even)),
                Err(Error::InvalidAddress(1))
            );
            assert_eq!(
                loader.load(&CodeImage::new(limit as u32, &even)),
                Err(Error::InvalidAddress(limit as u32))
            );

            let mut cpu = dev.cpu().unwrap();
            assert_eq!(cpu.load_and_run(&odd, true), Err(Error::InvalidLength(3)));

            assert_eq!(ctrl.writes(), 0, "{}", chip);
            assert_eq!(ctrl.code_writes(), 0);
        }
    }

    #[test]
    fn test_load_and_run() {
        for (chip, profile) in [("asm1142", &PROFILE_GEN1), ("asm3142", &PROFILE_GEN2)] {
            let ctrl = controller(chip);
            let mut dev = ctrl.open(PollConfig::default()).unwrap();
            let data = pattern(0x100);

            let mut cpu = dev.cpu().unwrap();
            cpu.load_and_run(&data, true).unwrap();
            assert!(!cpu.is_halted().unwrap());

            assert_eq!(&ctrl.code()[..0x100], &data[..]);
            assert_eq!(
                ctrl.internal(profile.cpu_mode_next),
                (CpuModeNext::BOOT_FROM_CODE_RAM | CpuModeNext::HALF_SPEED).bits()
            );

            // halt, then mode, then release
            let writes = ctrl.mmio_writes();
            let exec: Vec<u8> = writes
                .iter()
                .filter(|(a, _)| *a == profile.cpu_exec_ctrl)
                .map(|(_, v)| *v)
                .collect();
            assert_eq!(exec, [CpuExecCtrl::HALT.bits(), 0]);
            let mode_at = writes
                .iter()
                .position(|(a, _)| *a == profile.cpu_mode_next)
                .unwrap();
            let release_at = writes
                .iter()
                .rposition(|(a, _)| *a == profile.cpu_exec_ctrl)
                .unwrap();
            assert!(mode_at < release_at);
        }
    }

    #[test]
    fn test_full_speed_boot_mode() {
        let ctrl = controller("asm1142");
        let mut dev = ctrl.open(PollConfig::default()).unwrap();
        dev.cpu().unwrap().load_and_run(&[0, 0], false).unwrap();
        assert_eq!(
            ctrl.internal(PROFILE_GEN1.cpu_mode_next),
            CpuModeNext::BOOT_FROM_CODE_RAM.bits()
        );
    }

    #[test]
    fn test_failed_load_leaves_cpu_halted() {
        for (chip, profile) in [("asm1142", &PROFILE_GEN1), ("asm3142", &PROFILE_GEN2)] {
            let ctrl = controller(chip);
            ctrl.set_faults(Faults {
                fail_code_write: true,
                ..Faults::default()
            });
            let mut dev = ctrl.open(PollConfig::default()).unwrap();

            let err = dev.cpu().unwrap().load_and_run(&pattern(0x40), true);
            assert!(matches!(err, Err(Error::WriteError { .. })), "{:?}", err);

            let exec = CpuExecCtrl::from_bits_retain(ctrl.internal(profile.cpu_exec_ctrl));
            assert!(exec.contains(CpuExecCtrl::HALT));
            assert!(ctrl
                .mmio_writes()
                .iter()
                .all(|(a, _)| *a != profile.cpu_mode_next));

            // Write access was closed again
            let code_ctrl = CodeCtrl::from_bits_retain(ctrl.internal(profile.code_ctrl));
            assert!(code_ctrl.is_empty());
            assert!(dev.cpu().unwrap().is_halted().unwrap());
        }
    }

    #[test]
    fn test_verification_failure() {
        let ctrl = controller("asm3142");
        ctrl.set_faults(Faults {
            corrupt_readback: Some(0x8004),
            ..Faults::default()
        });
        let mut dev = ctrl.open(PollConfig::default()).unwrap();
        let data = pattern(0x9000);

        let err = dev
            .cpu()
            .unwrap()
            .load_and_run(&data, true)
            .unwrap_err();

        let expected = u16::from_le_bytes([data[0x8004], data[0x8005]]);
        assert_eq!(
            err,
            Error::VerificationFailed {
                address: 0x8004,
                expected,
                found: expected ^ 0x5a5a,
            }
        );
        let exec = CpuExecCtrl::from_bits_retain(ctrl.internal(PROFILE_GEN2.cpu_exec_ctrl));
        assert!(exec.contains(CpuExecCtrl::HALT));
        assert!(CodeCtrl::from_bits_retain(ctrl.internal(PROFILE_GEN2.code_ctrl)).is_empty());
    }

    #[test]
    fn test_pc_trace_from_config_space() {
        let ctrl = controller("asm1142");
        let mut dev = ctrl.open(PollConfig::default()).unwrap();

        let mut tracer = dev.pc_tracer().unwrap();
        assert_eq!(tracer.source(), PcSource::Config);
        assert_eq!(tracer.collect(3).unwrap(), [0, 1, 2]);

        tracer.reset().unwrap();
        assert_eq!(tracer.sample().unwrap(), 0);
        assert_eq!(
            dev.config_port()
                .read(regs::CONTROLLER_RESET, Width::Dword)
                .unwrap(),
            0
        );

        // A halted CPU stays put
        dev.cpu().unwrap().halt().unwrap();
        assert_eq!(dev.pc_tracer().unwrap().collect(2).unwrap(), [1, 1]);
    }

    #[test]
    fn test_pc_trace_from_bar() {
        let ctrl = controller("asm3242");
        let mut dev = ctrl.open(PollConfig::default()).unwrap();

        let mut tracer = dev.pc_tracer().unwrap();
        assert_eq!(tracer.source(), PcSource::Bar);
        assert_eq!(tracer.collect(2).unwrap(), [0, 1]);
        assert_eq!(
            tracer.reset(),
            Err(Error::CapabilityUnsupported("controller reset"))
        );
        assert_eq!(ctrl.writes(), 0);

        let mut dev = controller("asm1042").open(PollConfig::default()).unwrap();
        assert!(matches!(
            dev.pc_tracer(),
            Err(Error::CapabilityUnsupported(_))
        ));
    }

    #[test]
    fn test_stuck_latch_times_out() {
        let ctrl = controller("asm1142");
        ctrl.set_faults(Faults {
            stuck_latch: true,
            ..Faults::default()
        });
        let poll = PollConfig::new().with_timeout_us(10_000).with_interval_us(100);
        let mut dev = ctrl.open(poll).unwrap();

        let err = dev.bridge().unwrap().read(0x1234, Width::Byte).unwrap_err();
        assert_eq!(
            err,
            Error::ConfirmationTimeout {
                offset: regs::MMIO_ACCESS_ADDR as u32
            }
        );
        assert!(ctrl.elapsed_us() <= 10_000 + 100);
    }

    #[test]
    fn test_stuck_busy_times_out() {
        let ctrl = controller("asm3142");
        ctrl.set_faults(Faults {
            stuck_busy: true,
            ..Faults::default()
        });
        let poll = PollConfig::new().with_timeout_us(5_000).with_interval_us(0);
        let mut dev = ctrl.open(poll).unwrap();

        let err = dev
            .bridge()
            .unwrap()
            .write(0x18542, Width::Byte, 2, false)
            .unwrap_err();
        assert_eq!(
            err,
            Error::ConfirmationTimeout {
                offset: regs::HW_MMIO_STATUS as u32
            }
        );
        assert_eq!(ctrl.elapsed_us(), 5_000);
    }

    #[test]
    fn test_stuck_code_latch_cleans_up() {
        let ctrl = controller("asm3142");
        let poll = PollConfig::new().with_timeout_us(1_000).with_interval_us(10);
        let mut dev = ctrl.open(poll).unwrap();

        // Only the code RAM latch is stuck by the time data is written
        dev.code_loader()
            .unwrap()
            .load(&CodeImage::new(0, &[1, 2]))
            .unwrap();
        ctrl.set_faults(Faults {
            stuck_latch: true,
            ..Faults::default()
        });

        let err = dev
            .code_loader()
            .unwrap()
            .load(&CodeImage::new(0x100, &[3, 4]))
            .unwrap_err();
        assert_eq!(
            err,
            Error::ConfirmationTimeout {
                offset: regs::HW_CODE_ADDR as u32
            }
        );
        assert!(CodeCtrl::from_bits_retain(ctrl.internal(PROFILE_GEN2.code_ctrl)).is_empty());
        assert_eq!(&ctrl.code()[0x100..0x102], &[0, 0]);
    }
}
