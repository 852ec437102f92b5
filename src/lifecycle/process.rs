//! OS process plumbing for managed services.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{DevNestError, DevNestResult, ProcessErrorKind};
use crate::resolver::LaunchCommand;

/// Tracing target for forwarded service output.
pub const OUTPUT_TARGET: &str = "devnest::service_output";

/// Spawn `command` with piped output and no console window.
pub(crate) fn spawn(command: &LaunchCommand) -> DevNestResult<Child> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .current_dir(&command.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    cmd.spawn().map_err(|e| DevNestError::Process {
        kind: ProcessErrorKind::SpawnFailed {
            program: command.program.display().to_string(),
            message: e.to_string(),
        },
    })
}

/// Forward the child's stdout and stderr to tracing and to `log_file`.
///
/// A log file that cannot be opened only disables the file copy.
pub(crate) async fn forward_output(child: &mut Child, service: &str, log_file: &Path) {
    let file = match open_log(log_file).await {
        Ok(file) => Some(Arc::new(Mutex::new(file))),
        Err(e) => {
            warn!(path = %log_file.display(), error = %e, "Cannot open service log");
            None
        }
    };

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(pump(stdout, service.to_string(), "stdout", file.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(pump(stderr, service.to_string(), "stderr", file));
    }
}

async fn open_log(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    OpenOptions::new().create(true).append(true).open(path).await
}

async fn pump<R>(reader: R, service: String, stream: &'static str, file: Option<Arc<Mutex<File>>>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                info!(target: OUTPUT_TARGET, service = %service, stream = stream, "{}", line);
                if let Some(file) = &file {
                    let mut file = file.lock().await;
                    let written = async {
                        file.write_all(line.as_bytes()).await?;
                        file.write_all(b"\n").await
                    }
                    .await;
                    if let Err(e) = written {
                        debug!(service = %service, error = %e, "Service log write failed");
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(service = %service, stream = stream, error = %e, "Output stream closed");
                break;
            }
        }
    }
}

/// Owns a running child on a background task.
///
/// The task resolves when the child exits, either on its own or after a
/// kill request, then runs `on_exit`.
pub(crate) struct Supervised {
    pub(crate) pid: Option<u32>,
    pub(crate) exited: watch::Receiver<bool>,
    kill: Option<oneshot::Sender<()>>,
    pub(crate) monitor: JoinHandle<()>,
}

impl Supervised {
    pub(crate) fn new<F>(mut child: Child, service: String, on_exit: F) -> Self
    where
        F: FnOnce(Option<ExitStatus>) + Send + 'static,
    {
        let pid = child.id();
        let (exited_tx, exited_rx) = watch::channel(false);
        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();

        let monitor = tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                Ok(()) = &mut kill_rx => {
                    if let Err(e) = child.start_kill() {
                        warn!(service = %service, error = %e, "Kill failed");
                    }
                    child.wait().await
                }
            };

            let status = match status {
                Ok(status) => {
                    info!(service = %service, status = %status, "Service process exited");
                    Some(status)
                }
                Err(e) => {
                    warn!(service = %service, error = %e, "Failed to wait for service process");
                    None
                }
            };
            let _ = exited_tx.send(true);
            on_exit(status);
        });

        Self {
            pid,
            exited: exited_rx,
            kill: Some(kill_tx),
            monitor,
        }
    }

    pub(crate) fn has_exited(&self) -> bool {
        *self.exited.borrow() || self.monitor.is_finished()
    }

    /// Wait up to `limit` for the child to exit.
    pub(crate) async fn wait_exit(&mut self, limit: Duration) -> bool {
        if self.has_exited() {
            return true;
        }
        match tokio::time::timeout(limit, self.exited.wait_for(|done| *done)).await {
            Ok(_) => true,
            Err(_) => false,
        }
    }

    /// Ask the monitor to kill the child. Only the first call has an effect.
    pub(crate) fn force_kill(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

/// Ask a process to exit on its own.
#[cfg(unix)]
pub(crate) async fn request_exit(pid: u32) -> DevNestResult<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|_| DevNestError::Process {
        kind: ProcessErrorKind::TerminateFailed {
            service: pid.to_string(),
            message: "pid out of range".to_string(),
        },
    })?;

    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(DevNestError::Process {
            kind: ProcessErrorKind::TerminateFailed {
                service: pid.to_string(),
                message: format!("SIGTERM failed: {}", e),
            },
        }),
    }
}

/// Ask a process to exit on its own.
#[cfg(windows)]
pub(crate) async fn request_exit(pid: u32) -> DevNestResult<()> {
    use crate::executor::HelperCommand;

    // Without /F taskkill sends a close request instead of terminating.
    let pid_arg = pid.to_string();
    let result = HelperCommand::new("taskkill", Duration::from_secs(10))
        .args(["/PID", pid_arg.as_str()])
        .run_async()
        .await?;

    if result.success() {
        Ok(())
    } else {
        Err(DevNestError::Process {
            kind: ProcessErrorKind::TerminateFailed {
                service: pid.to_string(),
                message: result.diagnostic(3),
            },
        })
    }
}
