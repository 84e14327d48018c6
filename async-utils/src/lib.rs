//! Async utilities shared by the playground crates.
//!
//! - [`OrCancelExt`] races a future against a `CancellationToken`.
//! - [`Debouncer`] coalesces bursts of values into one delayed delivery.

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod cancel;
mod debounce;

pub use cancel::CancelErr;
pub use cancel::OrCancelExt;
pub use debounce::Debouncer;
