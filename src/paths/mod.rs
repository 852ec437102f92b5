//! Path resolution.
//!
//! Maps an installation root and an execution mode to the canonical
//! directories of the stack:
//!
//! ```text
//! <root>/bin/<ServiceType>/<version>/...
//! <root>/www/<site>/...
//! <root>/etc/<server>/sites-enabled/...
//! <root>/config  <root>/data  <root>/logs  <root>/templates
//! ```
//!
//! Everything here is pure: no filesystem access and no shared state. A
//! mode switch is expressed by building a new [`PathResolver`] from a
//! [`PathConfig`] with a different [`ExecutionMode`].

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::services::ServiceType;

/// Settings file used in native mode.
pub const NATIVE_SETTINGS_FILE: &str = "win.settings.ini";
/// Settings file used in WSL mode.
pub const WSL_SETTINGS_FILE: &str = "wsl.settings.ini";
/// Mode-independent settings file.
pub const BASE_SETTINGS_FILE: &str = "settings.ini";

/// Native-Windows vs. WSL-backed resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum ExecutionMode {
    #[default]
    Native,
    Wsl,
}

impl ExecutionMode {
    pub fn from_use_wsl(use_wsl: bool) -> Self {
        if use_wsl {
            ExecutionMode::Wsl
        } else {
            ExecutionMode::Native
        }
    }

    pub fn is_wsl(self) -> bool {
        self == ExecutionMode::Wsl
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Native => write!(f, "native"),
            ExecutionMode::Wsl => write!(f, "wsl"),
        }
    }
}

/// Roots for both execution modes plus the active mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConfig {
    pub native_root: PathBuf,
    /// WSL root as reachable from the Windows side.
    pub wsl_root: PathBuf,
    /// The WSL root as seen from inside Linux.
    pub wsl_linux_root: String,
    pub wsl_distro: String,
    pub mode: ExecutionMode,
}

impl PathConfig {
    /// Native-only configuration rooted at `root`.
    pub fn native(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            wsl_root: root.join("wsl"),
            native_root: root,
            wsl_linux_root: "/opt/devnest".to_string(),
            wsl_distro: "Ubuntu".to_string(),
            mode: ExecutionMode::Native,
        }
    }

    /// Same roots, different mode.
    pub fn with_mode(&self, mode: ExecutionMode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }
}

/// Canonical sub-path lookup for one [`PathConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    config: PathConfig,
}

impl PathResolver {
    pub fn new(config: PathConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PathConfig {
        &self.config
    }

    pub fn mode(&self) -> ExecutionMode {
        self.config.mode
    }

    /// Active root for the current mode.
    pub fn root(&self) -> &Path {
        match self.config.mode {
            ExecutionMode::Native => &self.config.native_root,
            ExecutionMode::Wsl => &self.config.wsl_root,
        }
    }

    pub fn bin(&self) -> PathBuf {
        self.root().join("bin")
    }

    /// Directory holding every installed version of `service_type`.
    pub fn bin_for(&self, service_type: ServiceType) -> PathBuf {
        self.bin().join(service_type.as_str())
    }

    /// Installation directory of one version.
    pub fn install_dir(&self, service_type: ServiceType, version: &str) -> PathBuf {
        self.bin_for(service_type).join(version)
    }

    pub fn data(&self) -> PathBuf {
        self.root().join("data")
    }

    pub fn logs(&self) -> PathBuf {
        self.root().join("logs")
    }

    pub fn www(&self) -> PathBuf {
        self.root().join("www")
    }

    pub fn etc(&self) -> PathBuf {
        self.root().join("etc")
    }

    /// `etc/<server>/sites-enabled`, where `server` is e.g. `apache2` or `nginx`.
    pub fn sites_enabled(&self, server: &str) -> PathBuf {
        self.etc().join(server).join("sites-enabled")
    }

    /// Templates always ship with the native installation.
    pub fn templates(&self) -> PathBuf {
        self.config.native_root.join("templates")
    }

    /// Settings and catalogs always live under the native root.
    pub fn config_dir(&self) -> PathBuf {
        self.config.native_root.join("config")
    }

    /// Mode-specific settings file.
    pub fn settings_file(&self) -> PathBuf {
        let name = match self.config.mode {
            ExecutionMode::Native => NATIVE_SETTINGS_FILE,
            ExecutionMode::Wsl => WSL_SETTINGS_FILE,
        };
        self.config_dir().join(name)
    }

    /// Settings shared by both modes, including the WSL flag itself.
    pub fn base_settings_file(&self) -> PathBuf {
        self.config_dir().join(BASE_SETTINGS_FILE)
    }

    pub fn services_catalog(&self) -> PathBuf {
        self.config_dir().join("services.ini")
    }

    pub fn sites_catalog(&self) -> PathBuf {
        self.config_dir().join("sites.ini")
    }

    /// Render a path the way the launched process must see it.
    ///
    /// In native mode this is the path itself. In WSL mode paths under the
    /// WSL root are rewritten onto the Linux-side root with `/` separators;
    /// paths outside it are returned unchanged.
    pub fn process_path(&self, path: &Path) -> String {
        match self.config.mode {
            ExecutionMode::Native => path.display().to_string(),
            ExecutionMode::Wsl => self.to_linux(path),
        }
    }

    /// Map a path under the WSL root to its Linux-side equivalent.
    pub fn to_linux(&self, path: &Path) -> String {
        let Ok(relative) = path.strip_prefix(&self.config.wsl_root) else {
            return path.display().to_string();
        };

        let mut linux = self.config.wsl_linux_root.trim_end_matches('/').to_string();
        for component in relative.components() {
            if let Component::Normal(part) = component {
                linux.push('/');
                linux.push_str(&part.to_string_lossy());
            }
        }
        if linux.is_empty() {
            linux.push('/');
        }
        linux
    }
}
