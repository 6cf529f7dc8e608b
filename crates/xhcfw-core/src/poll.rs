//! Bounded polling
//!
//! Every wait in the access protocols (address echo, engine busy flag,
//! write-then-reread confirmation) goes through [`poll_until`]. The time
//! budget is consumed by the retry delays themselves, so a loop always
//! terminates even if the hardware never answers.

use crate::error::{Error, Result};

/// Default confirmation timeout (1 second)
pub const DEFAULT_TIMEOUT_US: u32 = 1_000_000;
/// Default delay between two polls (1 ms)
pub const DEFAULT_INTERVAL_US: u32 = 1_000;
/// Default quiescence delay after a generation 1 data transfer
pub const DEFAULT_SETTLE_US: u32 = 1;

/// Something that can block the calling thread for a while
pub trait Delay {
    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

/// Timing parameters for polling loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Total time a single polling loop may spend waiting
    pub timeout_us: u32,
    /// Delay between two polls. Each retry costs at least 1 µs of budget.
    pub interval_us: u32,
    /// Delay after each generation 1 data transfer
    pub settle_us: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout_us: DEFAULT_TIMEOUT_US,
            interval_us: DEFAULT_INTERVAL_US,
            settle_us: DEFAULT_SETTLE_US,
        }
    }
}

impl PollConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout in microseconds
    pub fn with_timeout_us(mut self, timeout_us: u32) -> Self {
        self.timeout_us = timeout_us;
        self
    }

    /// Set the retry interval in microseconds
    pub fn with_interval_us(mut self, interval_us: u32) -> Self {
        self.interval_us = interval_us;
        self
    }

    /// Set the settle delay in microseconds
    pub fn with_settle_us(mut self, settle_us: u32) -> Self {
        self.settle_us = settle_us;
        self
    }

    /// Upper bound on the number of retries a loop can make
    pub fn max_retries(&self) -> u32 {
        self.timeout_us / self.interval_us.max(1)
    }
}

/// Poll `done` until it returns true or the time budget runs out
///
/// `offset` only identifies the polled location in the timeout error.
pub fn poll_until<P, F>(port: &mut P, poll: &PollConfig, offset: u32, mut done: F) -> Result<()>
where
    P: Delay + ?Sized,
    F: FnMut(&mut P) -> Result<bool>,
{
    let step = poll.interval_us.max(1);
    let mut remaining = poll.timeout_us;

    loop {
        if done(port)? {
            return Ok(());
        }

        if remaining == 0 {
            log::debug!("polling {:#x} timed out after {} us", offset, poll.timeout_us);
            return Err(Error::ConfirmationTimeout { offset });
        }

        port.delay_us(step);
        remaining = remaining.saturating_sub(step);
    }
}
