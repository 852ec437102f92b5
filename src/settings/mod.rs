//! Settings module.
//!
//! Provides the in-memory settings aggregate, the shared store that
//! publishes changes, and the manager that persists it to INI files.

mod debounce;
mod generate;
mod model;
mod persistence;
mod store;

pub use debounce::Debouncer;
pub use model::{ApacheSettings, GeneralSettings, MongoDbSettings, ServiceSettings, SettingsModel};
pub use persistence::SettingsManager;
pub use store::{ChangeReceiver, SettingsChange, SettingsStore};
