//! xhcfw - ASMedia xHCI controller firmware loader
//!
//! Loads code into the 8051 of ASMedia USB 3 host controllers and pokes at
//! its internal registers from the host.
//!
//! # Architecture
//!
//! Backends only provide raw configuration space and BAR0 access; the
//! generation specific indirect protocols live in `xhcfw-core`:
//! - **Generation 1** (ASM1042A, ASM1142) - config space ping-pong
//! - **Generation 2** (ASM2142/ASM3142, ASM3242) - BAR0 access engine
//!
//! This allows the same command implementations to work regardless of the
//! backend (sysfs on real hardware, or the dummy emulator).

mod backends;
mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Info { backend } => {
            let device = backends::open_device(&backend)?;
            commands::run_info(&device)
        }
        Commands::Load {
            backend,
            input,
            full_speed,
        } => {
            let mut device = backends::open_device(&backend)?;
            commands::run_load(&mut device, &input, full_speed)
        }
        Commands::CodeWrite {
            backend,
            input,
            address,
        } => {
            let mut device = backends::open_device(&backend)?;
            commands::run_code_write(&mut device, &input, address)
        }
        Commands::CodeRead {
            backend,
            output,
            address,
            length,
        } => {
            let mut device = backends::open_device(&backend)?;
            commands::run_code_read(&mut device, &output, address, length)
        }
        Commands::MmioRead {
            backend,
            addr,
            width,
        } => {
            let mut device = backends::open_device(&backend)?;
            commands::run_mmio_read(&mut device, addr, width).map(|_| ())
        }
        Commands::MmioWrite {
            backend,
            addr,
            value,
            width,
            confirm,
        } => {
            let mut device = backends::open_device(&backend)?;
            commands::run_mmio_write(&mut device, addr, value, width, confirm)
        }
        Commands::RawRead {
            backend,
            space,
            offset,
            width,
        } => {
            let mut device = backends::open_device(&backend)?;
            commands::run_raw_read(&mut device, space, offset, width).map(|_| ())
        }
        Commands::Trace {
            backend,
            samples,
            reset,
        } => {
            let mut device = backends::open_device(&backend)?;
            commands::run_trace(&mut device, samples, reset).map(|_| ())
        }
        Commands::ListChips => {
            commands::list_chips();
            Ok(())
        }
        Commands::ListBackends => {
            commands::list_backends();
            Ok(())
        }
    }
}
