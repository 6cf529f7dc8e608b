//! CLI command implementations
//!
//! Every command takes an opened [`xhcfw_core::Device`]; the backend that
//! produced it does not matter here.
//!
//! ## Code RAM commands
//!
//! `load` goes through the CPU lifecycle (halt, write, boot mode, release).
//! `code-write` and `code-read` only touch code RAM and leave the CPU alone.

mod info;
mod list;
mod load;
mod mmio;
mod raw;
mod trace;

pub use info::run_info;
pub use list::{list_backends, list_chips};
pub use load::{run_code_read, run_code_write, run_load};
pub use mmio::{run_mmio_read, run_mmio_write};
pub use raw::run_raw_read;
pub use trace::run_trace;
