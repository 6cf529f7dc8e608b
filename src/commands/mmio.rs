//! Internal MMIO register commands

use xhcfw_core::{Device, Width};

fn hex_digits(width: Width) -> usize {
    width.bytes() * 2
}

/// Read an internal register through the indirect bridge
pub fn run_mmio_read(
    device: &mut Device,
    addr: u32,
    width: u8,
) -> Result<u64, Box<dyn std::error::Error>> {
    let width = Width::try_from(width)?;
    let value = device.bridge()?.read(addr, width)?;
    println!(
        "{:#07x}: {:#0w$x}",
        addr,
        value,
        w = hex_digits(width) + 2
    );
    Ok(value)
}

/// Write an internal register through the indirect bridge
pub fn run_mmio_write(
    device: &mut Device,
    addr: u32,
    value: u64,
    width: u8,
    confirm: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let width = Width::try_from(width)?;
    if value > width.mask() {
        return Err(format!(
            "Value {:#x} does not fit in {} byte(s)",
            value,
            width.bytes()
        )
        .into());
    }

    device.bridge()?.write(addr, width, value, confirm)?;
    log::info!(
        "Wrote {:#0w$x} to {:#07x}{}",
        value,
        addr,
        if confirm { " (confirmed)" } else { "" },
        w = hex_digits(width) + 2
    );
    Ok(())
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backends::open_device;

    #[test]
    fn test_mmio_write_then_read() {
        let mut device = open_device("dummy:chip=asm1142").unwrap();
        run_mmio_write(&mut device, 0x5000, 0xbeef, 2, true).unwrap();
        assert_eq!(run_mmio_read(&mut device, 0x5000, 2).unwrap(), 0xbeef);
        assert_eq!(run_mmio_read(&mut device, 0x5001, 1).unwrap(), 0xbe);
    }

    #[test]
    fn test_mmio_rejects_bad_width_and_value() {
        let mut device = open_device("dummy:chip=asm3142").unwrap();
        assert!(run_mmio_read(&mut device, 0, 3).is_err());
        assert!(run_mmio_read(&mut device, 0, 8).is_err());
        assert!(run_mmio_write(&mut device, 0, 0x100, 1, false).is_err());
    }

    #[test]
    fn test_mmio_needs_host_access() {
        let mut device = open_device("dummy:chip=asm1042").unwrap();
        let err = run_mmio_read(&mut device, 0xf342, 1).unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }
}
