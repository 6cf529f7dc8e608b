//! List commands implementation

use crate::backends;
use xhcfw_core::identity;

/// List all compiled-in backends
pub fn list_backends() {
    println!("{}", backends::backend_help());
}

/// List all supported controllers
pub fn list_chips() {
    println!("Supported controllers:");
    println!();
    println!(
        "{:<16} {:>10} {:>6} {:>10} {:>10}",
        "Name", "ID", "Gen", "MMIO", "Code RAM"
    );
    println!("{}", "-".repeat(56));

    for chip in identity::chips() {
        let id_str = format!("{:04x}:{:04x}", chip.vendor_id, chip.device_id);
        let code_str = if chip.profile.has_code() {
            format_size(chip.profile.code_size)
        } else {
            "-".to_string()
        };

        println!(
            "{:<16} {:>10} {:>6} {:>10} {:>10}",
            chip.name,
            id_str,
            chip.profile.generation.to_string(),
            format_size(chip.profile.mmio_space_size),
            code_str
        );
    }
}

pub(crate) fn format_size(bytes: u32) -> String {
    if bytes >= 1024 * 1024 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
