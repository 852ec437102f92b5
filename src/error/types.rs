//! Error types for DevNest.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the stack manager.
#[derive(Error, Debug)]
pub enum DevNestError {
    /// Application configuration errors (bootstrap TOML).
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Malformed INI content.
    #[error("INI error in {path}:{line}: {message}")]
    Ini {
        path: String,
        line: usize,
        message: String,
    },

    /// Template-related errors.
    #[error("Template error: {message}")]
    Template { message: String },

    /// Generation of a derived configuration artifact failed.
    #[error("Failed to generate {path} for {service}: {message}")]
    ConfigGeneration {
        service: String,
        path: PathBuf,
        message: String,
    },

    /// Process launch or termination errors.
    #[error("Process error: {kind}")]
    Process { kind: ProcessErrorKind },

    /// Validation errors.
    #[error("Validation error: {kind}")]
    Validation { kind: ValidationErrorKind },

    /// A site operation left the system in an unknown state.
    #[error("Site '{site}': {message}")]
    Site { site: String, message: String },

    /// Writing the hosts file needs elevated rights and the fallback failed.
    /// `action` is "Add" or "Remove".
    #[error(
        "Administrator privileges required to update the hosts file. \
         {action} this line manually: {entry}"
    )]
    PrivilegeRequired { action: &'static str, entry: String },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Process error kinds.
#[derive(Error, Debug)]
pub enum ProcessErrorKind {
    #[error("Failed to spawn {program}: {message}")]
    SpawnFailed { program: String, message: String },

    #[error("Failed to terminate {service}: {message}")]
    TerminateFailed { service: String, message: String },

    #[error("Command execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Command timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

/// Validation error kinds.
#[derive(Error, Debug)]
pub enum ValidationErrorKind {
    #[error("Unknown service type: {name}")]
    UnknownServiceType { name: String },

    #[error("Unknown service instance: {name}")]
    UnknownInstance { name: String },

    #[error("Invalid site name '{name}': {message}")]
    InvalidSiteName { name: String, message: String },

    #[error("Site '{name}' has no directory under {}", www.display())]
    UnknownSite { name: String, www: PathBuf },

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },
}

impl DevNestError {
    /// Shorthand for a [`DevNestError::Site`] wrapping another error.
    pub fn site(site: impl Into<String>, err: impl std::fmt::Display) -> Self {
        DevNestError::Site {
            site: site.into(),
            message: err.to_string(),
        }
    }

    /// True when the underlying I/O error is an access-denied failure.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, DevNestError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied)
    }
}

/// Result type alias for DevNest operations.
pub type DevNestResult<T> = Result<T, DevNestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privilege_message_contains_entry() {
        let err = DevNestError::PrivilegeRequired {
            action: "Add",
            entry: "127.0.0.1\tblog.dev\t#DevNest".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("Administrator privileges required"));
        assert!(message.contains("Add this line manually: 127.0.0.1\tblog.dev"));
    }

    #[test]
    fn test_permission_denied_detection() {
        let err = DevNestError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert!(err.is_permission_denied());

        let err = DevNestError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(!err.is_permission_denied());
    }

    #[test]
    fn test_site_wrapper_keeps_subject() {
        let err = DevNestError::site("blog", "template missing");
        assert_eq!(err.to_string(), "Site 'blog': template missing");
    }
}
