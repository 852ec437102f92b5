//! Configuration module for DevNest.
//!
//! Handles loading and validating the bootstrap configuration from TOML files.

mod settings;

pub use settings::*;
