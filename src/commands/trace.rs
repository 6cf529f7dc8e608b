//! Program counter tracing

use std::io::Write;
use std::time::Instant;
use xhcfw_core::Device;

/// Sample the 8051 program counter `samples` times and print every sample
pub fn run_trace(
    device: &mut Device,
    samples: usize,
    reset: bool,
) -> Result<Vec<u16>, Box<dyn std::error::Error>> {
    let mut tracer = device.pc_tracer()?;
    log::debug!("Sampling program counter via {:?}", tracer.source());

    if reset {
        println!("Resetting device...");
        tracer.reset()?;
        println!("Reset complete!");
    }

    let started = Instant::now();
    let trace = tracer.collect(samples)?;
    let micros = started.elapsed().as_micros();

    let rate = if micros > 0 {
        trace.len() as u128 * 1_000_000 / micros
    } else {
        0
    };
    println!(
        "Logged {} samples in {}.{:06} seconds ({} samples per second)",
        trace.len(),
        micros / 1_000_000,
        micros % 1_000_000,
        rate
    );

    let mut out = std::io::stdout().lock();
    for pc in &trace {
        writeln!(out, "{:#06x}", pc)?;
    }
    Ok(trace)
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backends::open_device;

    #[test]
    fn test_trace_counts_samples() {
        let mut device = open_device("dummy:chip=asm3142").unwrap();
        assert_eq!(run_trace(&mut device, 4, false).unwrap(), [0, 1, 2, 3]);
        assert!(run_trace(&mut device, 0, false).unwrap().is_empty());
    }

    #[test]
    fn test_trace_reset_restarts_count() {
        let mut device = open_device("dummy:chip=asm1042a").unwrap();
        run_trace(&mut device, 5, false).unwrap();
        assert_eq!(run_trace(&mut device, 2, true).unwrap(), [0, 1]);

        // Reset goes through config space only
        let mut device = open_device("dummy:chip=asm3242").unwrap();
        assert!(run_trace(&mut device, 1, true).is_err());
    }
}
