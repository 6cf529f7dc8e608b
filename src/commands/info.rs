//! Info command implementation

use xhcfw_core::Device;

use super::list::format_size;

/// Print what is known about an opened controller
///
/// Works for unrecognized devices too; only the identification lines are
/// printed then.
pub fn run_info(device: &Device) -> Result<(), Box<dyn std::error::Error>> {
    println!("Chip: {}", device.name());
    println!(
        "PCI ID:     {:04x}:{:04x}",
        device.vendor_id(),
        device.device_id()
    );

    match device.profile() {
        Ok(profile) => {
            println!("Generation: {}", profile.generation);
            println!(
                "MMIO space: {} ({:#x} bytes)",
                format_size(profile.mmio_space_size),
                profile.mmio_space_size
            );
            if profile.has_code() {
                println!(
                    "Code RAM:   {} ({:#x} bytes)",
                    format_size(profile.code_size),
                    profile.code_size
                );
            } else {
                println!("Code RAM:   not accessible from the host");
            }
        }
        Err(e) => {
            println!("Generation: unknown ({})", e);
        }
    }

    Ok(())
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backends::open_device;

    #[test]
    fn test_info_unrecognized_device() {
        let device = open_device("dummy:did=0x9999").unwrap();
        assert_eq!(device.name(), "Unknown");
        run_info(&device).unwrap();
    }
}
