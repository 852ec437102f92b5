//! Launch command resolution.
//!
//! Turns a service type, an installation directory and the current settings
//! into the exact command line and working directory a service is started
//! with. Two strategies implement [`CommandResolver`]:
//!
//! - [`NativeResolver`] runs the Windows binary directly.
//! - [`WslResolver`] runs the Linux binary through `wsl.exe`, with every
//!   path argument mapped to its Linux-side location.
//!
//! Resolution never fails loudly: an empty selected version or a missing
//! executable simply yields `None`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::paths::{ExecutionMode, PathConfig, PathResolver};
use crate::services::{descriptor, LaunchContext, LaunchPlan, ServiceType};
use crate::settings::SettingsModel;

/// Launcher used for WSL-backed services.
pub const WSL_LAUNCHER: &str = "wsl.exe";

/// A fully resolved launch command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl LaunchCommand {
    /// Render as a single command-line string.
    pub fn command_line(&self) -> String {
        let mut line = quote(&self.program.display().to_string(), false);
        for arg in &self.args {
            line.push(' ');
            line.push_str(&quote(arg, true));
        }
        line
    }
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

fn quote(value: &str, quote_paths: bool) -> String {
    let needs_quotes = value.is_empty()
        || value.chars().any(char::is_whitespace)
        || (quote_paths && (value.contains('\\') || value.contains('/')));
    if needs_quotes {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

/// Strategy for turning a service into a launch command.
pub trait CommandResolver: Send + Sync {
    fn mode(&self) -> ExecutionMode;

    /// Resolve the launch command, or `None` if the service cannot start.
    fn resolve(
        &self,
        service_type: ServiceType,
        install_path: &Path,
        settings: &SettingsModel,
    ) -> Option<LaunchCommand>;
}

/// Build and validate the descriptor's launch plan.
fn checked_plan(
    paths: &PathResolver,
    service_type: ServiceType,
    install_path: &Path,
    settings: &SettingsModel,
) -> Option<LaunchPlan> {
    if !settings.service(service_type).has_selection() {
        debug!(service = %service_type, "No version selected, nothing to resolve");
        return None;
    }

    let plan = descriptor(service_type).launch(&LaunchContext {
        install_path,
        settings,
        paths,
    });

    if !plan.executable.is_file() {
        debug!(
            service = %service_type,
            executable = %plan.executable.display(),
            "Executable not found"
        );
        return None;
    }

    if let Some(missing) = plan.requires.iter().find(|p| !p.exists()) {
        debug!(
            service = %service_type,
            missing = %missing.display(),
            "Required file not generated yet"
        );
        return None;
    }

    Some(plan)
}

/// Runs native Windows binaries directly.
pub struct NativeResolver {
    paths: PathResolver,
}

impl NativeResolver {
    pub fn new(config: &PathConfig) -> Self {
        Self {
            paths: PathResolver::new(config.with_mode(ExecutionMode::Native)),
        }
    }
}

impl CommandResolver for NativeResolver {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Native
    }

    fn resolve(
        &self,
        service_type: ServiceType,
        install_path: &Path,
        settings: &SettingsModel,
    ) -> Option<LaunchCommand> {
        let plan = checked_plan(&self.paths, service_type, install_path, settings)?;
        Some(LaunchCommand {
            program: plan.executable,
            args: plan.args,
            working_dir: plan.working_dir,
        })
    }
}

/// Runs Linux binaries inside a WSL distribution.
pub struct WslResolver {
    paths: PathResolver,
}

impl WslResolver {
    pub fn new(config: &PathConfig) -> Self {
        Self {
            paths: PathResolver::new(config.with_mode(ExecutionMode::Wsl)),
        }
    }
}

impl CommandResolver for WslResolver {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Wsl
    }

    fn resolve(
        &self,
        service_type: ServiceType,
        install_path: &Path,
        settings: &SettingsModel,
    ) -> Option<LaunchCommand> {
        let plan = checked_plan(&self.paths, service_type, install_path, settings)?;

        let mut args = vec![
            "-d".to_string(),
            self.paths.config().wsl_distro.clone(),
            "--cd".to_string(),
            self.paths.to_linux(&plan.working_dir),
            "--exec".to_string(),
            self.paths.to_linux(&plan.executable),
        ];
        args.extend(plan.args);

        Some(LaunchCommand {
            program: PathBuf::from(WSL_LAUNCHER),
            args,
            working_dir: plan.working_dir,
        })
    }
}

/// Pick the strategy for the configured mode.
pub fn resolver_for(config: &PathConfig) -> Box<dyn CommandResolver> {
    match config.mode {
        ExecutionMode::Native => Box::new(NativeResolver::new(config)),
        ExecutionMode::Wsl => Box::new(WslResolver::new(config)),
    }
}
