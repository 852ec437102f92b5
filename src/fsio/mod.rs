//! File I/O with bounded retries.
//!
//! Settings and generated config files are regularly held open by editors,
//! antivirus scanners or the services themselves. Reads and writes are
//! retried with a progressive delay before the error is surfaced.

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use tokio::fs;
use tracing::{debug, warn};

use crate::error::DevNestResult;

/// Retry policy for file operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            base_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Delay after the given (1-based) failed attempt.
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Errors that will not go away by waiting.
fn is_permanent(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::NotFound | ErrorKind::PermissionDenied | ErrorKind::InvalidInput
    )
}

/// Read a file to a string, retrying transient failures.
pub async fn read_to_string_retry(path: &Path, policy: RetryPolicy) -> DevNestResult<String> {
    let mut attempt = 1;
    loop {
        match fs::read_to_string(path).await {
            Ok(content) => return Ok(content),
            Err(e) if is_permanent(e.kind()) || attempt >= policy.attempts => {
                return Err(e.into());
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    path = %path.display(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Read failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Write a file, creating its parent directory and retrying transient failures.
///
/// `PermissionDenied` is returned immediately so callers with an elevation
/// fallback can react to it.
pub async fn write_retry(path: &Path, content: &[u8], policy: RetryPolicy) -> DevNestResult<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }

    let mut attempt = 1;
    loop {
        match fs::write(path, content).await {
            Ok(()) => {
                debug!(path = %path.display(), bytes = content.len(), "File written");
                return Ok(());
            }
            Err(e) if is_permanent(e.kind()) || attempt >= policy.attempts => {
                return Err(e.into());
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    path = %path.display(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Write failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Create a directory and its parents if missing.
pub async fn ensure_dir(path: &Path) -> DevNestResult<()> {
    if fs::metadata(path).await.is_err() {
        debug!(path = %path.display(), "Creating directory");
        fs::create_dir_all(path).await?;
    }
    Ok(())
}

/// Names of the immediate sub-directories of `dir`, sorted.
///
/// A missing directory yields an empty list.
pub async fn list_subdirs(dir: &Path) -> DevNestResult<Vec<String>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}
