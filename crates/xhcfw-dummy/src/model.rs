//! Register-level model of the controller
//!
//! Only the registers the access protocols touch are modelled. Everything
//! else in configuration space and BAR0 is plain storage.

use xhcfw_core::identity::{find_chip, CapabilityProfile};
use xhcfw_core::port::check_bar_access;
use xhcfw_core::regs::{self, CodeCtrl, CpuExecCtrl};
use xhcfw_core::{Error, Generation, Result, Width};

use crate::{DummyConfig, Faults};

/// Size of the emulated BAR0
pub const BAR_SIZE: usize = 0x8000;

/// Size of configuration space
pub const CONFIG_SIZE: usize = 0x100;

/// An address latch that takes a few reads to reflect a write
#[derive(Debug, Default)]
struct Latch {
    value: u32,
    pending: Option<(u32, u32)>,
}

impl Latch {
    fn write(&mut self, value: u32, delay: u32, stuck: bool) {
        if stuck {
            return;
        }
        if delay == 0 {
            self.value = value;
            self.pending = None;
        } else {
            self.pending = Some((value, delay));
        }
    }

    fn read(&mut self) -> u32 {
        if let Some((value, reads)) = self.pending {
            if reads <= 1 {
                self.value = value;
                self.pending = None;
            } else {
                self.pending = Some((value, reads - 1));
            }
        }
        self.value
    }
}

fn read_le(mem: &[u8], offset: usize, width: Width) -> u64 {
    let mut buf = [0u8; 8];
    buf[..width.bytes()].copy_from_slice(&mem[offset..offset + width.bytes()]);
    u64::from_le_bytes(buf)
}

fn write_le(mem: &mut [u8], offset: usize, width: Width, value: u64) {
    mem[offset..offset + width.bytes()].copy_from_slice(&value.to_le_bytes()[..width.bytes()]);
}

/// Emulated controller state
pub struct Model {
    pub(crate) config: DummyConfig,
    profile: Option<&'static CapabilityProfile>,
    cfg: [u8; CONFIG_SIZE],
    bar: Vec<u8>,
    pub(crate) internal: Vec<u8>,
    pub(crate) code: Vec<u8>,
    mmio_latch: Latch,
    code_latch: Latch,
    hw_addr: u32,
    busy: u32,
    pc: u16,
    /// Host writes to config space or BAR0
    pub(crate) writes: usize,
    /// 16-bit code RAM words stored
    pub(crate) code_writes: usize,
    /// Internal MMIO byte writes, in order
    pub(crate) mmio_writes: Vec<(u32, u8)>,
    /// Time spent in delays
    pub(crate) elapsed_us: u64,
}

impl Model {
    pub fn new(config: DummyConfig) -> Self {
        let profile = find_chip(config.vendor_id, config.device_id).map(|c| c.profile);
        let mmio_size = profile.map_or(0x10000, |p| p.mmio_space_size) as usize;
        let code_size = profile.map_or(0, |p| p.code_size) as usize;

        let mut cfg = [0u8; CONFIG_SIZE];
        cfg[0..2].copy_from_slice(&config.vendor_id.to_le_bytes());
        cfg[2..4].copy_from_slice(&config.device_id.to_le_bytes());

        Self {
            config,
            profile,
            cfg,
            bar: vec![0; BAR_SIZE],
            internal: vec![0; mmio_size],
            code: vec![0; code_size],
            mmio_latch: Latch::default(),
            code_latch: Latch::default(),
            hw_addr: 0,
            busy: 0,
            pc: 0,
            writes: 0,
            code_writes: 0,
            mmio_writes: Vec::new(),
            elapsed_us: 0,
        }
    }

    pub fn generation(&self) -> Generation {
        self.profile.map_or(Generation::None, |p| p.generation)
    }

    pub fn has_bar(&self) -> bool {
        self.generation() == Generation::Gen2
    }

    fn faults(&self) -> &Faults {
        &self.config.faults
    }

    fn code_ctrl(&self) -> CodeCtrl {
        self.profile.map_or(CodeCtrl::empty(), |p| {
            CodeCtrl::from_bits_retain(self.internal[p.code_ctrl as usize])
        })
    }

    fn ports_open(&self) -> bool {
        match self.generation() {
            Generation::Gen1 => true,
            Generation::Gen2 => {
                self.cfg[regs::CODE_PORT_ENABLE as usize] as u64 == regs::CODE_PORT_ENABLE_ON
            }
            Generation::None => false,
        }
    }

    fn code_writable(&self) -> bool {
        self.ports_open() && self.code_ctrl().contains(CodeCtrl::WRITE_ENABLE)
    }

    fn code_readable(&self) -> bool {
        self.ports_open() && self.code_ctrl().contains(CodeCtrl::READ_ENABLE)
    }

    fn cpu_halted(&self) -> bool {
        self.profile.is_some_and(|p| {
            CpuExecCtrl::from_bits_retain(self.internal[p.cpu_exec_ctrl as usize])
                .contains(CpuExecCtrl::HALT)
        })
    }

    /// Current program counter; a running CPU moves on one step per sample
    fn sample_pc(&mut self) -> u16 {
        let pc = self.pc;
        if !self.cpu_halted() {
            self.pc = self.pc.wrapping_add(1);
        }
        pc
    }

    fn internal_write(&mut self, addr: u32, value: u8) {
        let addr = addr as usize % self.internal.len();
        self.internal[addr] = value;
        self.mmio_writes.push((addr as u32, value));
    }

    fn store_code_word(&mut self, offset: u32, word: u16) {
        let offset = offset as usize;
        if offset + 2 <= self.code.len() {
            self.code[offset..offset + 2].copy_from_slice(&word.to_le_bytes());
            self.code_writes += 1;
        }
    }

    fn load_code_word(&self, offset: u32) -> u16 {
        let o = offset as usize;
        if o + 2 > self.code.len() {
            return 0;
        }
        let word = u16::from_le_bytes([self.code[o], self.code[o + 1]]);
        if self.faults().corrupt_readback == Some(offset) {
            word ^ 0x5a5a
        } else {
            word
        }
    }

    pub fn delay(&mut self, us: u32) {
        self.elapsed_us += us as u64;
    }

    // ------------------------------------------------------------------
    // Configuration space
    // ------------------------------------------------------------------

    pub fn config_read(&mut self, offset: u16, width: Width) -> Result<u64> {
        let off = offset as usize;
        if off + width.bytes() > CONFIG_SIZE {
            return Err(Error::ReadError {
                offset: offset as u32,
            });
        }
        if self.faults().unreachable {
            return Ok(width.mask());
        }

        if self.generation() == Generation::Gen1 {
            match offset {
                regs::MMIO_ACCESS_ADDR => return Ok(self.mmio_latch.read() as u64),
                regs::MMIO_ACCESS_READ_DATA => {
                    return Ok(self.internal[self.mmio_latch.value as usize] as u64)
                }
                regs::CODE_RAM_ADDR => return Ok(self.code_latch.read() as u64),
                regs::PC_STATUS => return Ok(self.sample_pc() as u64),
                _ => {}
            }
        }

        Ok(read_le(&self.cfg, off, width))
    }

    pub fn config_write(&mut self, offset: u16, width: Width, value: u64) -> Result<()> {
        let off = offset as usize;
        if off + width.bytes() > CONFIG_SIZE {
            return Err(Error::WriteError {
                offset: offset as u32,
            });
        }
        self.writes += 1;
        if self.faults().unreachable {
            return Ok(());
        }

        if offset == regs::CONTROLLER_RESET && value & regs::CONTROLLER_RESET_ASSERT != 0 {
            self.pc = 0;
        }

        let delay = self.config.latch_delay;
        let stuck = self.faults().stuck_latch;

        if self.generation() == Generation::Gen1 {
            match offset {
                regs::MMIO_ACCESS_ADDR => {
                    self.mmio_latch.write(value as u32 & 0xffff, delay, stuck);
                    return Ok(());
                }
                regs::MMIO_ACCESS_WRITE_DATA => {
                    self.internal_write(self.mmio_latch.value, value as u8);
                    return Ok(());
                }
                regs::CODE_RAM_ADDR => {
                    self.code_latch.write(value as u32 & 0xffff, delay, stuck);
                    return Ok(());
                }
                regs::CODE_RAM_DATA_LOWER_BANK | regs::CODE_RAM_DATA_UPPER_BANK => {
                    if self.faults().fail_code_write {
                        return Err(Error::WriteError {
                            offset: offset as u32,
                        });
                    }
                    if self.code_writable() {
                        let bank = if offset == regs::CODE_RAM_DATA_UPPER_BANK {
                            regs::CODE_RAM_BANK_BIT
                        } else {
                            0
                        };
                        let addr = (self.code_latch.value & regs::CODE_RAM_ADDR_MASK) | bank;
                        self.store_code_word(addr, value as u16);
                    }
                    return Ok(());
                }
                _ => {}
            }
        }

        write_le(&mut self.cfg, off, width, value);
        Ok(())
    }

    // ------------------------------------------------------------------
    // BAR0
    // ------------------------------------------------------------------

    /// Lane A code offset of the latched slot
    fn slot_offset(&self) -> u32 {
        let slot = self.code_latch.value;
        ((slot & 0x8000) << 1) | (slot & 0x7ffe)
    }

    pub fn bar_read(&mut self, offset: usize, width: Width) -> Result<u64> {
        check_bar_access(offset, width, BAR_SIZE)?;

        Ok(match offset {
            regs::HW_MMIO_STATUS => {
                if self.faults().stuck_busy {
                    1
                } else if self.busy > 0 {
                    self.busy -= 1;
                    1
                } else {
                    0
                }
            }
            regs::HW_MMIO_DATA => self.internal[self.hw_addr as usize] as u64,
            regs::HW_PC_STATUS => self.sample_pc() as u64,
            regs::HW_CODE_ADDR => self.code_latch.read() as u64,
            regs::HW_CODE_DATA => {
                if self.code_readable() {
                    let a = self.slot_offset();
                    let lane_a = self.load_code_word(a) as u64;
                    let lane_b = self.load_code_word(a + 0x8000) as u64;
                    lane_a | lane_b << 16
                } else {
                    0
                }
            }
            _ => read_le(&self.bar, offset, width),
        })
    }

    pub fn bar_write(&mut self, offset: usize, width: Width, value: u64) -> Result<()> {
        check_bar_access(offset, width, BAR_SIZE)?;
        self.writes += 1;

        let busy = self.config.busy_cycles;
        match offset {
            regs::HW_MMIO_ADDR_LOW_BANK => {
                self.hw_addr = value as u32 & 0xffff;
                self.busy = busy;
            }
            regs::HW_MMIO_ADDR_HIGH_BANK => {
                self.hw_addr = regs::HW_MMIO_BANK_BIT | (value as u32 & 0xffff);
                self.busy = busy;
            }
            regs::HW_MMIO_DATA => {
                self.internal_write(self.hw_addr, value as u8);
                self.busy = busy;
            }
            regs::HW_CODE_ADDR => {
                let delay = self.config.latch_delay;
                let stuck = self.faults().stuck_latch;
                self.code_latch.write(value as u32 & 0xffff, delay, stuck);
            }
            regs::HW_CODE_DATA => {
                if self.faults().fail_code_write {
                    return Err(Error::WriteError {
                        offset: offset as u32,
                    });
                }
                if self.code_writable() {
                    let a = self.slot_offset();
                    self.store_code_word(a, value as u16);
                    self.store_code_word(a + 0x8000, (value >> 16) as u16);
                }
            }
            _ => write_le(&mut self.bar, offset, width, value),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latch_delay() {
        let mut latch = Latch::default();
        latch.write(0x1234, 3, false);
        assert_eq!(latch.read(), 0);
        assert_eq!(latch.read(), 0);
        assert_eq!(latch.read(), 0x1234);

        latch.write(0x5678, 0, true);
        assert_eq!(latch.read(), 0x1234);
    }
}
