//! DevNest Library
//!
//! This crate provides the core of the DevNest local development stack
//! manager: service discovery and lifecycle, settings persistence with
//! native/WSL execution modes, and per-site virtual hosts.

pub mod config;
pub mod error;
pub mod executor;
pub mod fsio;
pub mod ini;
pub mod lifecycle;
pub mod paths;
pub mod resolver;
pub mod services;
pub mod settings;
pub mod sites;
pub mod templates;
pub mod validation;
pub mod vhost;
