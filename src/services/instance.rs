//! Installed service instances.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::resolver::LaunchCommand;

use super::types::ServiceType;

/// Runtime status of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum ServiceStatus {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Starting => "starting",
            ServiceStatus::Running => "running",
            ServiceStatus::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// One installed, versioned copy of a service.
///
/// The OS process is owned by the lifecycle manager; the instance only
/// carries an opaque running token while a process is attached.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInstance {
    /// Installed version folder name.
    pub name: String,
    pub display_name: String,
    pub service_type: ServiceType,
    pub path: PathBuf,
    /// Resolved launch command. Derived, never persisted.
    pub command: Option<LaunchCommand>,
    pub status: ServiceStatus,
    /// Whether this version is the one configured in settings.
    pub is_selected: bool,
    /// A start or stop is in flight.
    pub is_loading: bool,
    pub running_token: Option<Uuid>,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
}

impl ServiceInstance {
    pub fn new(service_type: ServiceType, name: impl Into<String>, path: PathBuf) -> Self {
        let name = name.into();
        Self {
            display_name: format!("{} {}", service_type, name),
            name,
            service_type,
            path,
            command: None,
            status: ServiceStatus::Stopped,
            is_selected: false,
            is_loading: false,
            running_token: None,
            pid: None,
            started_at: None,
        }
    }

    /// Identity across enumerations: `<Type>/<version>`.
    pub fn key(&self) -> String {
        instance_key(self.service_type, &self.name)
    }

    pub fn is_running(&self) -> bool {
        self.status == ServiceStatus::Running
    }

    /// Drop runtime state after the process is gone.
    pub(crate) fn mark_stopped(&mut self) {
        self.status = ServiceStatus::Stopped;
        self.running_token = None;
        self.pid = None;
        self.started_at = None;
    }
}

/// Build the key used to address an instance.
pub fn instance_key(service_type: ServiceType, name: &str) -> String {
    format!("{}/{}", service_type.as_str(), name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_instance_is_stopped() {
        let instance = ServiceInstance::new(
            ServiceType::Apache,
            "2.4.58",
            PathBuf::from("/stack/bin/Apache/2.4.58"),
        );
        assert_eq!(instance.status, ServiceStatus::Stopped);
        assert_eq!(instance.key(), "Apache/2.4.58");
        assert_eq!(instance.display_name, "Apache 2.4.58");
        assert!(instance.running_token.is_none());
    }

    #[test]
    fn test_mark_stopped_clears_runtime_state() {
        let mut instance =
            ServiceInstance::new(ServiceType::Redis, "7.2", PathBuf::from("/r"));
        instance.status = ServiceStatus::Running;
        instance.running_token = Some(Uuid::new_v4());
        instance.pid = Some(42);

        instance.mark_stopped();
        assert_eq!(instance.status, ServiceStatus::Stopped);
        assert!(instance.running_token.is_none());
        assert!(instance.pid.is_none());
    }
}
