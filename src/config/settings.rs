//! Bootstrap configuration for DevNest.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::DevNestError;
use crate::paths::{ExecutionMode, PathConfig};

/// Main bootstrap configuration structure.
///
/// Describes where the stack lives on disk and how the process behaves.
/// User-facing service settings are kept separately in INI files.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub wsl: WslConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub timings: TimingsConfig,
}

/// Paths configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Native installation root containing `bin`, `www`, `etc` and friends.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

/// WSL configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WslConfig {
    /// The WSL root as seen from Windows (e.g. `\\wsl.localhost\Ubuntu\opt\devnest`).
    #[serde(default = "default_wsl_root")]
    pub root: PathBuf,
    /// The same directory as seen from inside the distribution.
    #[serde(default = "default_wsl_linux_root")]
    pub linux_root: String,
    /// Distribution passed to `wsl.exe -d`.
    #[serde(default = "default_wsl_distro")]
    pub distro: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Timing knobs for persistence and process supervision.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingsConfig {
    /// Quiescence period before settings are written to disk.
    #[serde(default = "default_autosave_debounce_ms")]
    pub autosave_debounce_ms: u64,
    /// How long a graceful stop may take before the process is killed.
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
    /// Attempts for file reads and writes.
    #[serde(default = "default_io_retry_attempts")]
    pub io_retry_attempts: u32,
    /// Base delay between attempts, multiplied by the attempt number.
    #[serde(default = "default_io_retry_base_delay_ms")]
    pub io_retry_base_delay_ms: u64,
}

// Default value functions
fn default_root() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_wsl_root() -> PathBuf {
    PathBuf::from(r"\\wsl.localhost\Ubuntu\opt\devnest")
}

fn default_wsl_linux_root() -> String {
    "/opt/devnest".to_string()
}

fn default_wsl_distro() -> String {
    "Ubuntu".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_autosave_debounce_ms() -> u64 {
    500
}

fn default_stop_grace_secs() -> u64 {
    5
}

fn default_io_retry_attempts() -> u32 {
    5
}

fn default_io_retry_base_delay_ms() -> u64 {
    50
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

impl Default for WslConfig {
    fn default() -> Self {
        Self {
            root: default_wsl_root(),
            linux_root: default_wsl_linux_root(),
            distro: default_wsl_distro(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for TimingsConfig {
    fn default() -> Self {
        Self {
            autosave_debounce_ms: default_autosave_debounce_ms(),
            stop_grace_secs: default_stop_grace_secs(),
            io_retry_attempts: default_io_retry_attempts(),
            io_retry_base_delay_ms: default_io_retry_base_delay_ms(),
        }
    }
}

impl TimingsConfig {
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    pub fn io_retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.io_retry_base_delay_ms)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file is not an error: the defaults describe a stack rooted
    /// next to the executable.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DevNestError> {
        let path = path.as_ref();
        if !path.exists() {
            let config = AppConfig::default();
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| DevNestError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            DevNestError::Config { message } => DevNestError::Config {
                message: format!("{} ({})", message, path.display()),
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, DevNestError> {
        let config: AppConfig = toml::from_str(content).map_err(|e| DevNestError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Path configuration for the given execution mode.
    pub fn path_config(&self, mode: ExecutionMode) -> PathConfig {
        PathConfig {
            native_root: self.paths.root.clone(),
            wsl_root: self.wsl.root.clone(),
            wsl_linux_root: self.wsl.linux_root.clone(),
            wsl_distro: self.wsl.distro.clone(),
            mode,
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), DevNestError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(DevNestError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(DevNestError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        if self.timings.io_retry_attempts == 0 {
            return Err(DevNestError::Config {
                message: "timings.io_retry_attempts must be at least 1".to_string(),
            });
        }

        if !self.wsl.linux_root.starts_with('/') {
            return Err(DevNestError::Config {
                message: format!(
                    "wsl.linux_root must be an absolute Linux path, got '{}'",
                    self.wsl.linux_root
                ),
            });
        }

        Ok(())
    }
}
