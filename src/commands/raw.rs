//! Direct configuration space and BAR0 reads

use xhcfw_core::{Device, RawConfigPort, RawMemoryPort, Width};

use crate::cli::Space;

/// Read one register without going through the indirect bridge
pub fn run_raw_read(
    device: &mut Device,
    space: Space,
    offset: u32,
    width: u8,
) -> Result<u64, Box<dyn std::error::Error>> {
    let width = Width::try_from(width)?;

    let value = match space {
        Space::Config => {
            let offset = u16::try_from(offset)
                .map_err(|_| format!("Config space offset {:#x} out of range", offset))?;
            device.config_port().read(offset, width)?
        }
        Space::Bar => device.bar_port()?.read(offset as usize, width)?,
    };

    println!(
        "{:?} {:#06x}: {:#0w$x}",
        space,
        offset,
        value,
        w = width.bytes() * 2 + 2
    );
    Ok(value)
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backends::open_device;

    #[test]
    fn test_raw_read_ids() {
        let mut device = open_device("dummy:chip=asm3242").unwrap();
        assert_eq!(
            run_raw_read(&mut device, Space::Config, 0, 4).unwrap(),
            0x3242_1b21
        );
        assert_eq!(run_raw_read(&mut device, Space::Bar, 0x3010, 1).unwrap(), 0);
    }

    #[test]
    fn test_raw_read_errors() {
        let mut device = open_device("dummy:chip=asm1142").unwrap();
        // config space has no 8 byte accesses
        assert!(run_raw_read(&mut device, Space::Config, 0, 8).is_err());
        assert!(run_raw_read(&mut device, Space::Config, 0x10000, 1).is_err());
        // generation 1 parts are opened without BAR0
        assert!(run_raw_read(&mut device, Space::Bar, 0, 4).is_err());
    }
}
