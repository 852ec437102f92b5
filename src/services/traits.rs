//! Service descriptor traits.
//!
//! Defines the interface every service type implements, so that adding a
//! type means adding one descriptor instead of touching shared code.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::ini::IniSection;
use crate::paths::{ExecutionMode, PathResolver};
use crate::settings::SettingsModel;
use crate::sites::SiteModel;

use super::types::ServiceType;

/// Inputs for building a launch plan.
pub struct LaunchContext<'a> {
    /// Installation directory of the version being launched.
    pub install_path: &'a Path,
    pub settings: &'a SettingsModel,
    pub paths: &'a PathResolver,
}

impl LaunchContext<'_> {
    pub fn mode(&self) -> ExecutionMode {
        self.paths.mode()
    }

    /// Render a path for the launched process (Linux-side in WSL mode).
    pub fn arg_path(&self, path: &Path) -> String {
        self.paths.process_path(path)
    }
}

/// What to launch, before the execution strategy wraps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    /// Executable as found on disk.
    pub executable: PathBuf,
    pub working_dir: PathBuf,
    pub args: Vec<String>,
    /// Files that must exist for the launch to make sense.
    pub requires: Vec<PathBuf>,
}

impl LaunchPlan {
    pub fn new(executable: PathBuf, working_dir: PathBuf) -> Self {
        Self {
            executable,
            working_dir,
            args: Vec::new(),
            requires: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn require(mut self, path: PathBuf) -> Self {
        self.requires.push(path);
        self
    }
}

/// Inputs for regenerating derived configuration.
pub struct GenerationContext<'a> {
    /// Installation directory of the selected version.
    pub install_path: &'a Path,
    pub settings: &'a SettingsModel,
    pub paths: &'a PathResolver,
    pub sites: &'a [SiteModel],
}

/// One step of configuration regeneration.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    /// Render a template to `dest`.
    Render {
        template: &'static str,
        context: Value,
        dest: PathBuf,
    },
    /// Copy `from` to `to` unless `to` already exists.
    CopyIfMissing { from: PathBuf, to: PathBuf },
    /// Create a directory tree.
    EnsureDir(PathBuf),
    /// Remove every file in a directory, creating it if missing.
    ClearDir(PathBuf),
}

/// Describes one manageable service type.
///
/// # Example
///
/// ```ignore
/// pub struct RedisService;
///
/// impl ServiceDescriptor for RedisService {
///     fn service_type(&self) -> ServiceType { ServiceType::Redis }
///     fn display_name(&self) -> &'static str { "Redis" }
///     fn default_port(&self) -> Option<u16> { Some(6379) }
///     fn executable(&self, mode: ExecutionMode) -> &'static str { ... }
///     fn launch(&self, ctx: &LaunchContext<'_>) -> LaunchPlan { ... }
/// }
/// ```
pub trait ServiceDescriptor: Send + Sync {
    fn service_type(&self) -> ServiceType;

    /// Human-readable name (e.g. "Apache HTTP Server").
    fn display_name(&self) -> &'static str;

    /// Default listen port, `None` for services without one.
    fn default_port(&self) -> Option<u16>;

    fn default_auto_start(&self) -> bool {
        false
    }

    /// INI key holding the port.
    fn port_key(&self) -> &'static str {
        "Port"
    }

    /// Executable file name for the given execution mode.
    fn executable(&self, mode: ExecutionMode) -> &'static str;

    /// Build the launch plan for one installed version.
    fn launch(&self, ctx: &LaunchContext<'_>) -> LaunchPlan;

    /// Parse service-specific keys.
    fn read_extra(&self, _section: &IniSection, _settings: &mut SettingsModel) {}

    /// Serialize service-specific keys.
    fn write_extra(&self, _settings: &SettingsModel, _section: &mut IniSection) {}

    /// Derived configuration to regenerate after the settings are saved.
    fn artifacts(&self, _ctx: &GenerationContext<'_>) -> Vec<Artifact> {
        Vec::new()
    }

    /// Parse this type's INI section into the settings model.
    fn read_section(&self, section: &IniSection, settings: &mut SettingsModel) {
        let port_key = self.port_key();
        let has_port = self.default_port().is_some();
        let service = settings.service_mut(self.service_type());

        if let Some(version) = section.get("Version") {
            service.selected_version = version.trim().to_string();
        }
        if has_port {
            if let Some(port) = section.get_u16(port_key) {
                service.port = Some(port);
            }
        }
        if let Some(auto_start) = section.get_bool("AutoStart") {
            service.auto_start = auto_start;
        }

        self.read_extra(section, settings);
    }

    /// Serialize this type's block as an INI section.
    fn write_section(&self, settings: &SettingsModel) -> IniSection {
        let ty = self.service_type();
        let service = settings.service(ty);
        let mut section = IniSection::new(ty.as_str());

        section.set("Version", &service.selected_version);
        if let Some(port) = service.port {
            section.set(self.port_key(), port);
        }
        section.set_bool("AutoStart", service.auto_start);

        self.write_extra(settings, &mut section);
        section
    }
}
