//! Command executor module.
//!
//! Runs short-lived helper processes with a timeout.

mod output;
mod subprocess;

pub use subprocess::{HelperCommand, HelperOutput};
