//! Short-lived helper processes.
//!
//! Used for the elevated hosts-file copy and for `taskkill` on Windows.
//! Helpers run directly (no shell) with captured output and a deadline.

use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{DevNestError, DevNestResult, ProcessErrorKind};

use super::output::sanitize_output;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What a finished helper left behind.
#[derive(Debug, Clone)]
pub struct HelperOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl HelperOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Trimmed stderr, or stdout when the helper wrote nothing to stderr.
    pub fn diagnostic(&self, max_lines: usize) -> String {
        let text = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        sanitize_output(text, max_lines)
    }
}

/// One helper invocation.
pub struct HelperCommand {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl HelperCommand {
    /// The helper is killed if it runs longer than `timeout`.
    pub fn new(program: &str, timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            timeout,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_string()));
        self
    }

    /// Run to completion, blocking the calling thread.
    pub fn run(self) -> DevNestResult<HelperOutput> {
        debug!(program = %self.program, args = ?self.args, "Running helper");

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DevNestError::Process {
                kind: ProcessErrorKind::SpawnFailed {
                    program: self.program.clone(),
                    message: e.to_string(),
                },
            })?;

        let started = Instant::now();
        let child = self.wait_until_deadline(child, started)?;
        let output = child.wait_with_output().map_err(|e| self.failed(e))?;

        let result = HelperOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(
            program = %self.program,
            exit_code = ?result.exit_code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Helper finished"
        );
        Ok(result)
    }

    /// [`run`](Self::run) on the blocking pool.
    pub async fn run_async(self) -> DevNestResult<HelperOutput> {
        let program = self.program.clone();
        tokio::task::spawn_blocking(move || self.run())
            .await
            .map_err(|e| DevNestError::Process {
                kind: ProcessErrorKind::ExecutionFailed {
                    message: format!("{} helper task failed: {}", program, e),
                },
            })?
    }

    fn wait_until_deadline(&self, mut child: Child, started: Instant) -> DevNestResult<Child> {
        loop {
            if child.try_wait().map_err(|e| self.failed(e))?.is_some() {
                return Ok(child);
            }
            if started.elapsed() >= self.timeout {
                warn!(program = %self.program, timeout = ?self.timeout, "Helper timed out, killing it");
                if let Err(e) = child.kill() {
                    warn!(program = %self.program, error = %e, "Failed to kill helper");
                }
                let _ = child.wait();
                return Err(DevNestError::Process {
                    kind: ProcessErrorKind::Timeout {
                        timeout_secs: self.timeout.as_secs(),
                    },
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn failed(&self, e: std::io::Error) -> DevNestError {
        DevNestError::Process {
            kind: ProcessErrorKind::ExecutionFailed {
                message: format!("{}: {}", self.program, e),
            },
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> HelperCommand {
        HelperCommand::new("sh", Duration::from_secs(5)).args(["-c", script])
    }

    #[test]
    fn test_captures_stdout_and_exit_code() {
        let output = sh("echo copied").run().unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "copied");
    }

    #[test]
    fn test_diagnostic_prefers_stderr() {
        let output = sh("echo progress; echo 'Permission denied' >&2; exit 126")
            .run()
            .unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, Some(126));
        assert_eq!(output.diagnostic(5), "Permission denied");

        let quiet = sh("echo 'Request cancelled'; exit 1").run().unwrap();
        assert_eq!(quiet.diagnostic(5), "Request cancelled");
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let err = HelperCommand::new("devnest-no-such-helper", Duration::from_secs(1))
            .run()
            .unwrap_err();
        assert!(matches!(
            err,
            DevNestError::Process {
                kind: ProcessErrorKind::SpawnFailed { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_deadline_kills_helper() {
        let started = Instant::now();
        let err = HelperCommand::new("sleep", Duration::from_millis(200))
            .args(["5"])
            .run_async()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DevNestError::Process {
                kind: ProcessErrorKind::Timeout { .. }
            }
        ));
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
