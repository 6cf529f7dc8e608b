//! Register offsets and bit definitions
//!
//! Three address spaces are involved:
//!
//! - PCI configuration space of the controller (host side)
//! - BAR0 of the controller (host side, generation 2 only)
//! - the internal XDATA/MMIO space of the 8051 (reached indirectly)

use bitflags::bitflags;

// ============================================================================
// Generation 1 configuration space ports
// ============================================================================

/// Code RAM word address (bits 14:1), confirmed by reading back
pub const CODE_RAM_ADDR: u16 = 0xE2;
/// Code RAM data, lower 32 KiB bank
pub const CODE_RAM_DATA_LOWER_BANK: u16 = 0xE4;
/// Code RAM data, upper 32 KiB bank
pub const CODE_RAM_DATA_UPPER_BANK: u16 = 0xE6;
/// Internal MMIO address, confirmed by reading back
pub const MMIO_ACCESS_ADDR: u16 = 0xE8;
/// Internal MMIO write data
pub const MMIO_ACCESS_WRITE_DATA: u16 = 0xEA;
/// Internal MMIO read data
pub const MMIO_ACCESS_READ_DATA: u16 = 0xEB;
/// Program counter status; reads of the lower code data port return it
pub const PC_STATUS: u16 = CODE_RAM_DATA_LOWER_BANK;
/// Controller reset control
pub const CONTROLLER_RESET: u16 = 0xEC;
/// Value of [`CONTROLLER_RESET`] that asserts reset
pub const CONTROLLER_RESET_ASSERT: u64 = 1 << 31;

/// Bits of a generation 1 code offset that go into [`CODE_RAM_ADDR`]
pub const CODE_RAM_ADDR_MASK: u32 = 0x7ffe;
/// Bit of a generation 1 code offset that selects the upper bank
pub const CODE_RAM_BANK_BIT: u32 = 1 << 15;

// ============================================================================
// Generation 2 configuration space / BAR0 ports
// ============================================================================

/// Config space byte gating the BAR0 code RAM ports
pub const CODE_PORT_ENABLE: u16 = 0xF8;
/// Value of [`CODE_PORT_ENABLE`] that opens the code RAM ports
pub const CODE_PORT_ENABLE_ON: u64 = 0x01;

/// Indirect access engine status
pub const HW_MMIO_STATUS: usize = 0x3010;
/// Internal MMIO address for the low 64 KiB
pub const HW_MMIO_ADDR_LOW_BANK: usize = 0x3012;
/// Internal MMIO address for the high 64 KiB
pub const HW_MMIO_ADDR_HIGH_BANK: usize = 0x3014;
/// Program counter status
pub const HW_PC_STATUS: usize = 0x300A;
/// Internal MMIO data
pub const HW_MMIO_DATA: usize = 0x3016;
/// Code RAM slot address, confirmed by reading back
pub const HW_CODE_ADDR: usize = 0x3020;
/// Code RAM slot data (two 16-bit lanes)
pub const HW_CODE_DATA: usize = 0x3024;

/// Bit of a generation 2 internal address that selects the high bank
pub const HW_MMIO_BANK_BIT: u32 = 1 << 16;

bitflags! {
    /// Generation 2 engine status ([`HW_MMIO_STATUS`])
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EngineStatus: u8 {
        /// A transfer is still in flight
        const BUSY = 1 << 0;
    }
}

// ============================================================================
// Internal registers (8051 XDATA)
// ============================================================================

/// Boot mode applied at the next CPU reset (64 KiB parts)
pub const CPU_MODE_NEXT_64K: u32 = 0xF340;
/// CPU execution control (64 KiB parts)
pub const CPU_EXEC_CTRL_64K: u32 = 0xF342;
/// Code RAM access control (64 KiB parts)
pub const CODE_CTRL_64K: u32 = 0xF343;

/// Boot mode applied at the next CPU reset (128 KiB parts)
pub const CPU_MODE_NEXT_128K: u32 = 0x18540;
/// CPU execution control (128 KiB parts)
pub const CPU_EXEC_CTRL_128K: u32 = 0x18542;
/// Code RAM access control (128 KiB parts)
pub const CODE_CTRL_128K: u32 = 0x18543;

bitflags! {
    /// CPU execution control
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CpuExecCtrl: u8 {
        /// Hold the CPU in reset
        const HALT = 1 << 1;
    }
}

bitflags! {
    /// Boot mode for the next CPU reset
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CpuModeNext: u8 {
        /// Run the CPU from a divided clock
        const HALF_SPEED = 1 << 0;
        /// Boot from code RAM instead of ROM
        const BOOT_FROM_CODE_RAM = 1 << 1;
    }
}

bitflags! {
    /// Code RAM access control
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CodeCtrl: u8 {
        /// Allow the host to write code RAM
        const WRITE_ENABLE = 1 << 1;
        /// Allow the host to read code RAM (generation 2)
        const READ_ENABLE = 1 << 2;
    }
}
