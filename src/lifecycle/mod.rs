//! Service lifecycle module.
//!
//! Launches service processes, supervises them on background tasks and
//! stops them gracefully with a forced-kill fallback.

mod manager;
mod process;
mod source;

pub use manager::ServiceManager;
pub use process::OUTPUT_TARGET;
pub use source::{CommandSource, SettingsCommandSource};
