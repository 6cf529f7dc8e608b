//! Generation 2: BAR0 access engine
//!
//! Internal MMIO is reached through a small engine in BAR0 that reports a
//! busy flag while a transfer is in flight. Bit 16 of the internal address
//! does not fit the 16-bit address register; it selects which of two
//! address registers is written.
//!
//! Code RAM is 96 KiB, organised as 16-bit lanes that are transferred two
//! at a time. A slot pairs the word at offset `i` with the word at
//! `i + 0x8000`, and bit 16 of `i` is folded into bit 15 of the slot
//! address:
//!
//! ```text
//! slot address   lane A (data[15:0])   lane B (data[31:16])
//! 0x0000-0x7ffe  0x00000-0x07ffe       0x08000-0x0fffe
//! 0x8000-0xfffe  0x10000-0x17ffe       0x18000-0x1fffe (past the end)
//! ```
//!
//! A slot the image only half covers is read first and its other lane
//! written back unchanged, so code RAM outside the image is left alone.
//! The loader keeps read access enabled for the whole write phase.

use crate::code::{CodeImage, LoadProgress};
use crate::device::RawHandles;
use crate::error::Result;
use crate::identity::Generation;
use crate::poll::{poll_until, PollConfig};
use crate::port::{RawConfigPort, RawMemoryPort, Width};
use crate::protocol::IndirectAccessProtocol;
use crate::regs::{self, EngineStatus};

/// Code RAM size of generation 2 parts
pub const CODE_SIZE: u32 = 0x18000;

/// Distance between the two lanes of a slot
pub const LANE_STRIDE: u32 = 0x8000;

/// BAR0 and config space registers used by generation 2 parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gen2Ports {
    /// Config space byte gating the code RAM ports
    pub code_port_enable: u16,
    /// Engine status
    pub status: usize,
    /// Internal address register, low bank
    pub mmio_addr_low: usize,
    /// Internal address register, high bank
    pub mmio_addr_high: usize,
    /// Internal data register
    pub mmio_data: usize,
    /// Code RAM slot address
    pub code_addr: usize,
    /// Code RAM slot data
    pub code_data: usize,
}

impl Gen2Ports {
    /// Register layout of ASM2142/ASM3142/ASM3242
    pub const DEFAULT: Self = Self {
        code_port_enable: regs::CODE_PORT_ENABLE,
        status: regs::HW_MMIO_STATUS,
        mmio_addr_low: regs::HW_MMIO_ADDR_LOW_BANK,
        mmio_addr_high: regs::HW_MMIO_ADDR_HIGH_BANK,
        mmio_data: regs::HW_MMIO_DATA,
        code_addr: regs::HW_CODE_ADDR,
        code_data: regs::HW_CODE_DATA,
    };
}

/// BAR0 engine protocol of 128 KiB parts
#[derive(Debug)]
pub struct Gen2Protocol {
    /// Register layout
    pub ports: Gen2Ports,
}

/// Lane A offsets of every slot, in transfer order
///
/// Walks `i` by 2 and jumps from `0x8000` to `0x10000`, since the words in
/// between are lane B of the first pass.
pub fn slot_offsets() -> impl Iterator<Item = u32> {
    let mut i = 0u32;
    core::iter::from_fn(move || {
        if i >= CODE_SIZE {
            return None;
        }
        let offset = i;
        i += 2;
        if i & LANE_STRIDE != 0 {
            i += 0x10000 - LANE_STRIDE;
        }
        Some(offset)
    })
}

/// Slot address for a lane A offset
pub fn slot_address(offset: u32) -> u16 {
    (((offset >> 1) & 0x8000) | (offset & 0x7ffe)) as u16
}

/// Index into an image of `len` bytes at `base` for a code offset
fn image_index(base: u32, len: usize, offset: u32) -> Option<usize> {
    if offset >= CODE_SIZE {
        return None;
    }
    let rel = ((offset + CODE_SIZE - base) % CODE_SIZE) as usize;
    (rel < len).then_some(rel)
}

/// Slots touched by an image, with the image index of each lane
fn touched_slots(base: u32, len: usize) -> impl Iterator<Item = (u32, [Option<usize>; 2])> {
    slot_offsets().filter_map(move |offset| {
        let lanes = [
            image_index(base, len, offset),
            image_index(base, len, offset + LANE_STRIDE),
        ];
        lanes.iter().any(Option::is_some).then_some((offset, lanes))
    })
}

/// Slot value with the lanes covered by `data` replaced
fn merge_slot(current: u32, data: &[u8], lanes: [Option<usize>; 2]) -> u32 {
    lanes
        .iter()
        .enumerate()
        .fold(current, |value, (lane, index)| match *index {
            Some(i) => {
                let shift = 16 * lane;
                let word = u16::from_le_bytes([data[i], data[i + 1]]) as u32;
                (value & !(0xffff << shift)) | word << shift
            }
            None => value,
        })
}

/// Wait for the engine to finish the previous transfer
fn wait_idle(bar: &mut dyn RawMemoryPort, status: usize, poll: &PollConfig) -> Result<()> {
    poll_until(bar, poll, status as u32, |bar| {
        let flags = EngineStatus::from_bits_retain(bar.read(status, Width::Byte)? as u8);
        Ok(!flags.contains(EngineStatus::BUSY))
    })
}

impl Gen2Protocol {
    /// Latch an internal MMIO address, leaving the engine idle
    fn select(&self, bar: &mut dyn RawMemoryPort, poll: &PollConfig, addr: u32) -> Result<()> {
        let addr_reg = if addr & regs::HW_MMIO_BANK_BIT != 0 {
            self.ports.mmio_addr_high
        } else {
            self.ports.mmio_addr_low
        };

        wait_idle(bar, self.ports.status, poll)?;
        bar.write(addr_reg, Width::Word, (addr & 0xffff) as u64)?;
        wait_idle(bar, self.ports.status, poll)
    }

    /// Latch a code RAM slot
    fn select_slot(&self, bar: &mut dyn RawMemoryPort, poll: &PollConfig, offset: u32) -> Result<()> {
        bar.write_confirmed(
            self.ports.code_addr,
            Width::Word,
            slot_address(offset) as u64,
            poll,
        )
    }
}

impl IndirectAccessProtocol for Gen2Protocol {
    fn generation(&self) -> Generation {
        Generation::Gen2
    }

    fn code_size(&self) -> u32 {
        CODE_SIZE
    }

    fn read_byte(&self, io: &mut RawHandles, poll: &PollConfig, addr: u32) -> Result<u8> {
        let bar = io.bar()?;
        self.select(bar, poll, addr)?;
        Ok(bar.read(self.ports.mmio_data, Width::Byte)? as u8)
    }

    fn write_byte(
        &self,
        io: &mut RawHandles,
        poll: &PollConfig,
        addr: u32,
        value: u8,
    ) -> Result<()> {
        let bar = io.bar()?;
        self.select(bar, poll, addr)?;
        bar.write(self.ports.mmio_data, Width::Byte, value as u64)?;
        wait_idle(bar, self.ports.status, poll)
    }

    fn can_read_code(&self) -> bool {
        true
    }

    fn set_code_ports(&self, io: &mut RawHandles, enable: bool) -> Result<()> {
        let value = if enable { regs::CODE_PORT_ENABLE_ON } else { 0 };
        io.config()
            .write(self.ports.code_port_enable, Width::Byte, value)
    }

    fn write_code(
        &self,
        io: &mut RawHandles,
        poll: &PollConfig,
        image: &CodeImage<'_>,
        progress: &mut dyn LoadProgress,
    ) -> Result<()> {
        let bar = io.bar()?;
        let data = image.data();

        progress.writing(data.len());
        let mut written = 0;

        for (offset, lanes) in touched_slots(image.base(), data.len()) {
            self.select_slot(bar, poll, offset)?;
            let uncovered = [offset, offset + LANE_STRIDE]
                .iter()
                .zip(lanes)
                .any(|(lane, index)| index.is_none() && *lane < CODE_SIZE);
            let current = if uncovered {
                bar.read(self.ports.code_data, Width::Dword)? as u32
            } else {
                0
            };
            let value = merge_slot(current, data, lanes);

            bar.write(self.ports.code_data, Width::Dword, value as u64)?;

            written += 2 * lanes.iter().flatten().count();
            progress.write_progress(written);
        }

        Ok(())
    }

    fn read_code(
        &self,
        io: &mut RawHandles,
        poll: &PollConfig,
        base: u32,
        buf: &mut [u8],
        progress: &mut dyn LoadProgress,
    ) -> Result<()> {
        let bar = io.bar()?;

        progress.verifying(buf.len());
        let mut read = 0;

        for (offset, lanes) in touched_slots(base, buf.len()) {
            self.select_slot(bar, poll, offset)?;
            let value = bar.read(self.ports.code_data, Width::Dword)? as u32;

            for (lane, index) in lanes.iter().enumerate() {
                if let Some(i) = *index {
                    let word = (value >> (16 * lane)) as u16;
                    buf[i..i + 2].copy_from_slice(&word.to_le_bytes());
                    read += 2;
                }
            }
            progress.verify_progress(read);
        }

        Ok(())
    }
}
