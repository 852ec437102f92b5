//! Error types for DevNest.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
