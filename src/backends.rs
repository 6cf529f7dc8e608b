//! Backend registration and dispatch
//!
//! A backend is selected with a string of the form `name[:key=value,...]`.
//! The keys `timeout_ms`, `interval_us` and `settle_us` are shared by all
//! backends and build the [`PollConfig`]; everything else is passed on.

use xhcfw_core::{Device, PollConfig};

/// Information about a backend
pub struct BackendInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<BackendInfo> {
    let mut backends = Vec::new();

    #[cfg(feature = "sysfs")]
    backends.push(BackendInfo {
        name: "sysfs",
        aliases: &["pci", "internal"],
        description: "Linux sysfs PCI access (dev=<dddd:bb:ss.f>,unbind=<0|1>) - requires root",
    });

    #[cfg(feature = "dummy")]
    backends.push(BackendInfo {
        name: "dummy",
        aliases: &[],
        description: "Emulated controller for testing (chip=<asm1042a|asm1142|asm3142|...>)",
    });

    backends
}

/// Generate help text listing all available backends
pub fn backend_help() -> String {
    let backends = available_backends();

    if backends.is_empty() {
        return "No backends available (recompile with backend features enabled)".to_string();
    }

    let mut help = String::from("Available backends:\n");
    for b in &backends {
        help.push_str(&format!("  {:8} - {}\n", b.name, b.description));
        if !b.aliases.is_empty() {
            help.push_str(&format!("  {:8}   (aliases: {})\n", "", b.aliases.join(", ")));
        }
    }
    help.push_str("\nShared options: timeout_ms=<ms>, interval_us=<us>, settle_us=<us>\n");
    help
}

/// Generate a short list of backend names for CLI help
pub fn backend_names_short() -> String {
    let backends = available_backends();
    let names: Vec<&str> = backends.iter().map(|b| b.name).collect();
    names.join(", ")
}

/// Parsed backend parameters
#[derive(Debug)]
pub struct BackendParams {
    /// Backend name as given
    pub name: String,
    /// Backend specific key-value parameters, in the order given
    pub params: Vec<(String, String)>,
    /// Polling configuration built from the shared keys
    pub poll: PollConfig,
}

impl BackendParams {
    /// Parameters as borrowed pairs
    pub fn options(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, Box<dyn std::error::Error>> {
    value
        .parse::<u32>()
        .map_err(|e| format!("Invalid value for {}: '{}' ({})", key, value, e).into())
}

/// Parse a backend string into name, parameters and poll configuration
///
/// Format: "name" or "name:key1=value1,key2=value2"
pub fn parse_backend_params(s: &str) -> Result<BackendParams, Box<dyn std::error::Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    let mut params = Vec::new();
    let mut poll = PollConfig::default();

    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            let Some((key, value)) = opt.split_once('=') else {
                return Err(
                    format!("Invalid parameter format: '{}' (expected key=value)", opt).into(),
                );
            };
            match key {
                "timeout_ms" => {
                    let ms = parse_u32(key, value)?;
                    poll = poll.with_timeout_us(ms.saturating_mul(1000));
                }
                "interval_us" => poll = poll.with_interval_us(parse_u32(key, value)?),
                "settle_us" => poll = poll.with_settle_us(parse_u32(key, value)?),
                _ => params.push((key.to_string(), value.to_string())),
            }
        }
    }

    Ok(BackendParams {
        name: name.to_string(),
        params,
        poll,
    })
}

/// Open a controller through a backend
///
/// # Example
/// ```ignore
/// let mut device = open_device("dummy:chip=asm3142")?;
/// println!("Chip: {}", device.name());
/// ```
pub fn open_device(backend: &str) -> Result<Device, Box<dyn std::error::Error>> {
    let params = parse_backend_params(backend)?;
    log::debug!("Backend {} with {:?}", params.name, params.poll);

    match params.name.as_str() {
        #[cfg(feature = "sysfs")]
        "sysfs" | "pci" | "internal" => open_sysfs(&params),

        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&params),

        _ => Err(format!(
            "Unknown backend: {} (available: {})",
            params.name,
            backend_names_short()
        )
        .into()),
    }
}

#[cfg(feature = "sysfs")]
fn open_sysfs(params: &BackendParams) -> Result<Device, Box<dyn std::error::Error>> {
    let options = xhcfw_sysfs::SysfsOptions::from_options(&params.options())?;
    log::info!("Opening {} via sysfs...", options.dev);

    let device = xhcfw_sysfs::open_device(&options, params.poll).map_err(|e| {
        format!(
            "Failed to open {}: {}\nMake sure the device exists and you are running as root.",
            options.dev, e
        )
    })?;
    Ok(device)
}

#[cfg(feature = "dummy")]
fn open_dummy(params: &BackendParams) -> Result<Device, Box<dyn std::error::Error>> {
    let config = xhcfw_dummy::DummyConfig::from_options(&params.options())?;
    let controller = xhcfw_dummy::DummyController::new(config);
    Ok(controller.open(params.poll)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_only() {
        let p = parse_backend_params("dummy").unwrap();
        assert_eq!(p.name, "dummy");
        assert!(p.params.is_empty());
        assert_eq!(p.poll, PollConfig::default());
    }

    #[test]
    fn test_parse_params_keep_order_and_colons() {
        let p = parse_backend_params("sysfs:dev=0000:03:00.0,unbind=1").unwrap();
        assert_eq!(p.name, "sysfs");
        assert_eq!(
            p.options(),
            vec![("dev", "0000:03:00.0"), ("unbind", "1")]
        );
    }

    #[test]
    fn test_parse_shared_poll_keys() {
        let p = parse_backend_params("dummy:chip=asm1142,timeout_ms=5,interval_us=10,settle_us=0")
            .unwrap();
        assert_eq!(p.options(), vec![("chip", "asm1142")]);
        assert_eq!(
            p.poll,
            PollConfig::new()
                .with_timeout_us(5000)
                .with_interval_us(10)
                .with_settle_us(0)
        );
    }

    #[test]
    fn test_parse_rejects_bad_params() {
        assert!(parse_backend_params("dummy:chip").is_err());
        assert!(parse_backend_params("dummy:timeout_ms=soon").is_err());
    }

    #[test]
    fn test_unknown_backend() {
        assert!(open_device("ch341a").is_err());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy() {
        let device = open_device("dummy:chip=asm1142").unwrap();
        assert_eq!(device.name(), "ASM1142");
        assert!(open_device("dummy:chip=asm9999").is_err());
    }
}
