//! Opwatch bridge for feeding progress from async tasks.
//!
//! Scope and reporter handles are single-threaded by design. This crate
//! adds an unbounded channel so work running on other tasks or threads
//! can push fractional reports into a reporter owned elsewhere.

#![warn(missing_docs)]

mod relay;

// Re-exports
pub use relay::{channel, ProgressRelay, ProgressSender};
