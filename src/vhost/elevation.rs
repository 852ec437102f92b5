//! Elevated file replacement for the hosts file.

use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{DevNestError, DevNestResult, ProcessErrorKind};
use crate::executor::HelperCommand;

/// Replaces a protected file with the content of another file, with
/// elevated rights.
///
/// Called from a blocking context via `spawn_blocking`.
pub trait Elevation: Send + Sync {
    fn replace_file(&self, source: &Path, dest: &Path) -> DevNestResult<()>;
}

/// Platform helper: a UAC prompt through PowerShell on Windows, `pkexec`
/// elsewhere.
pub struct PlatformElevation {
    timeout: Duration,
}

impl Default for PlatformElevation {
    fn default() -> Self {
        Self {
            // Long enough for the user to answer the prompt.
            timeout: Duration::from_secs(120),
        }
    }
}

impl PlatformElevation {
    fn helper(&self, source: &Path, dest: &Path) -> HelperCommand {
        if cfg!(windows) {
            let inner = format!(
                "Copy-Item -LiteralPath '{}' -Destination '{}' -Force",
                ps_quote(&source.display().to_string()),
                ps_quote(&dest.display().to_string())
            );
            let outer = format!(
                "Start-Process powershell -Verb RunAs -Wait -WindowStyle Hidden \
                 -ArgumentList '-NoProfile','-Command','{}'",
                ps_quote(&inner)
            );
            HelperCommand::new("powershell", self.timeout)
                .args(["-NoProfile", "-NonInteractive", "-Command", outer.as_str()])
        } else {
            let source = source.display().to_string();
            let dest = dest.display().to_string();
            HelperCommand::new("pkexec", self.timeout)
                .args(["cp", "--", source.as_str(), dest.as_str()])
        }
    }
}

impl Elevation for PlatformElevation {
    fn replace_file(&self, source: &Path, dest: &Path) -> DevNestResult<()> {
        info!(dest = %dest.display(), "Requesting elevated write");

        let result = self.helper(source, dest).run()?;
        if result.success() {
            return Ok(());
        }

        let message = result.diagnostic(5);
        warn!(
            exit_code = ?result.exit_code,
            output = %message,
            "Elevated helper failed"
        );
        Err(DevNestError::Process {
            kind: ProcessErrorKind::ExecutionFailed {
                message: format!("elevated copy exited with {:?}: {}", result.exit_code, message),
            },
        })
    }
}

/// Double single quotes for a PowerShell single-quoted string.
fn ps_quote(value: &str) -> String {
    value.replace('\'', "''")
}
