//! Where launch commands come from.

use std::sync::Arc;

use crate::resolver::{resolver_for, LaunchCommand};
use crate::services::ServiceInstance;
use crate::settings::SettingsManager;

/// Supplies the command an instance is started with.
pub trait CommandSource: Send + Sync {
    /// `None` means the instance cannot start right now.
    fn command_for(&self, instance: &ServiceInstance) -> Option<LaunchCommand>;
}

/// Resolves commands from the current settings and execution mode.
///
/// Resolution happens on every start against the active root, so a mode
/// switch or a newly generated config file is picked up without refreshing
/// the registry. The instance's scanned `path` is not consulted.
pub struct SettingsCommandSource {
    settings: Arc<SettingsManager>,
}

impl SettingsCommandSource {
    pub fn new(settings: Arc<SettingsManager>) -> Self {
        Self { settings }
    }
}

impl CommandSource for SettingsCommandSource {
    fn command_for(&self, instance: &ServiceInstance) -> Option<LaunchCommand> {
        let paths = self.settings.paths();
        let model = self.settings.store().snapshot();
        let install = paths.install_dir(instance.service_type, &instance.name);
        resolver_for(paths.config()).resolve(instance.service_type, &install, &model)
    }
}
