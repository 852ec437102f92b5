//! Service lifecycle manager.
//!
//! Tracks every installed instance and the processes attached to them.
//! Each instance moves through `Stopped -> Starting -> Running -> Stopping
//! -> Stopped`; a start or stop observed while another transition of the
//! same instance is in flight is rejected, not queued.

use std::collections::HashMap;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{DevNestError, DevNestResult, ProcessErrorKind, ValidationErrorKind};
use crate::services::{ServiceInstance, ServiceRegistry, ServiceStatus};
use crate::settings::SettingsManager;

use super::process::{self, Supervised};
use super::source::{CommandSource, SettingsCommandSource};

/// How long to wait for a process after it was killed.
const KILL_WAIT: Duration = Duration::from_secs(5);

type InstanceMap = Arc<Mutex<HashMap<String, ServiceInstance>>>;

struct ProcessEntry {
    token: Uuid,
    process: Supervised,
}

type ProcessMap = Arc<tokio::sync::Mutex<HashMap<String, ProcessEntry>>>;

/// Clears `is_loading` on every exit path of a transition.
struct LoadingGuard {
    instances: InstanceMap,
    key: String,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(instance) = instances.get_mut(&self.key) {
            instance.is_loading = false;
        }
    }
}

/// Starts, stops and supervises service processes.
pub struct ServiceManager {
    registry: ServiceRegistry,
    commands: Arc<dyn CommandSource>,
    stop_grace: Duration,
    instances: InstanceMap,
    processes: ProcessMap,
}

impl ServiceManager {
    pub fn new(settings: Arc<SettingsManager>, stop_grace: Duration) -> Self {
        let commands = Arc::new(SettingsCommandSource::new(Arc::clone(&settings)));
        Self::with_command_source(settings, commands, stop_grace)
    }

    /// Manager whose launch commands come from `commands`.
    pub fn with_command_source(
        settings: Arc<SettingsManager>,
        commands: Arc<dyn CommandSource>,
        stop_grace: Duration,
    ) -> Self {
        Self {
            registry: ServiceRegistry::new(settings),
            commands,
            stop_grace,
            instances: Arc::new(Mutex::new(HashMap::new())),
            processes: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Re-enumerate installed instances.
    ///
    /// Runtime state of instances that are still installed is kept. An
    /// instance that disappeared from disk is dropped unless a process is
    /// still attached to it. Returns the number of tracked instances.
    pub async fn refresh_services(&self) -> usize {
        let discovered = self.registry.get_installed_services().await;

        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        let mut next: HashMap<String, ServiceInstance> = HashMap::new();

        for mut instance in discovered {
            let key = instance.key();
            if let Some(existing) = instances.remove(&key) {
                instance.status = existing.status;
                instance.is_loading = existing.is_loading;
                instance.running_token = existing.running_token;
                instance.pid = existing.pid;
                instance.started_at = existing.started_at;
            }
            next.insert(key, instance);
        }

        for (key, instance) in instances.drain() {
            if instance.running_token.is_some() {
                warn!(service = %key, "Running instance no longer installed, keeping it");
                next.insert(key, instance);
            }
        }

        *instances = next;
        debug!(count = instances.len(), "Service list refreshed");
        instances.len()
    }

    /// Rescan installed instances whenever the execution mode changes.
    ///
    /// Paths, selection flags and listed commands then follow the new root.
    /// The task runs until aborted.
    pub fn follow_mode_changes(self: &Arc<Self>) -> JoinHandle<()> {
        let mut modes = self.registry.settings().watch_mode();
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while modes.changed().await.is_ok() {
                let mode = *modes.borrow_and_update();
                info!(mode = %mode, "Execution mode changed, rescanning services");
                manager.refresh_services().await;
            }
        })
    }

    /// Every tracked instance, sorted by key.
    pub fn services(&self) -> Vec<ServiceInstance> {
        let instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<ServiceInstance> = instances.values().cloned().collect();
        list.sort_by_key(|instance| instance.key());
        list
    }

    pub fn get(&self, key: &str) -> Option<ServiceInstance> {
        self.instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Start an instance.
    ///
    /// Returns `Ok(false)` without side effects if the instance is busy or
    /// already running, and `Ok(false)` with the instance `Stopped` if no
    /// command can be resolved or the launch fails.
    pub async fn start(&self, key: &str) -> DevNestResult<bool> {
        let instance = {
            let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
            let instance = instances.get_mut(key).ok_or_else(|| unknown_instance(key))?;
            if instance.is_loading || instance.is_running() {
                debug!(service = key, status = %instance.status, "Start ignored");
                return Ok(false);
            }
            instance.is_loading = true;
            instance.status = ServiceStatus::Starting;
            instance.clone()
        };
        let _guard = self.loading_guard(key);

        let Some(command) = self.commands.command_for(&instance) else {
            info!(service = key, "No launch command, cannot start");
            self.update(key, |i| i.mark_stopped());
            return Ok(false);
        };

        info!(service = key, command = %command, "Starting service");
        let mut child = match process::spawn(&command) {
            Ok(child) => child,
            Err(e) => {
                error!(service = key, error = %e, "Failed to launch service");
                self.update(key, |i| i.mark_stopped());
                return Ok(false);
            }
        };

        let log_name = format!(
            "{}-{}.log",
            instance.service_type.as_str().to_lowercase(),
            instance.name
        );
        let log_file = self.registry.settings().paths().logs().join(log_name);
        process::forward_output(&mut child, key, &log_file).await;

        let token = Uuid::new_v4();
        let pid = child.id();

        // Attach before the monitor can observe an exit.
        self.update(key, |i| {
            i.status = ServiceStatus::Running;
            i.running_token = Some(token);
            i.pid = pid;
            i.started_at = Some(Utc::now());
            i.command = Some(command.clone());
        });

        let mut processes = self.processes.lock().await;
        let on_exit = self.exit_handler(key.to_string(), token);
        processes.insert(
            key.to_string(),
            ProcessEntry {
                token,
                process: Supervised::new(child, key.to_string(), on_exit),
            },
        );

        info!(service = key, pid = ?pid, "Service started");
        Ok(true)
    }

    /// Stop an instance.
    ///
    /// Returns `Ok(false)` without side effects if the instance is busy or
    /// not running. The instance always ends `Stopped`; `Ok(false)` is also
    /// returned if terminating a live process failed.
    pub async fn stop(&self, key: &str) -> DevNestResult<bool> {
        {
            let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
            let instance = instances.get_mut(key).ok_or_else(|| unknown_instance(key))?;
            if instance.is_loading || !instance.is_running() {
                debug!(service = key, status = %instance.status, "Stop ignored");
                return Ok(false);
            }
            instance.is_loading = true;
            instance.status = ServiceStatus::Stopping;
        }
        let _guard = self.loading_guard(key);

        let entry = self.processes.lock().await.remove(key);
        let result = match entry {
            Some(entry) => self.terminate(key, entry.process).await,
            None => Ok(()),
        };

        self.update(key, |i| i.mark_stopped());

        match result {
            Ok(()) => {
                info!(service = key, "Service stopped");
                Ok(true)
            }
            Err(e) => {
                error!(service = key, error = %e, "Failed to stop service");
                Ok(false)
            }
        }
    }

    /// Stop every running instance concurrently and wait for all of them.
    ///
    /// Returns the keys that were stopped.
    pub async fn stop_all(self: &Arc<Self>) -> Vec<String> {
        let running: Vec<String> = {
            let instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
            instances
                .values()
                .filter(|i| i.is_running() && !i.is_loading)
                .map(|i| i.key())
                .collect()
        };

        info!(count = running.len(), "Stopping all services");
        let mut set = JoinSet::new();
        for key in running {
            let manager = Arc::clone(self);
            set.spawn(async move {
                let stopped = manager.stop(&key).await.unwrap_or(false);
                (key, stopped)
            });
        }

        let mut stopped = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((key, true)) => stopped.push(key),
                Ok((key, false)) => warn!(service = %key, "Service did not stop cleanly"),
                Err(e) => error!(error = %e, "Stop task failed"),
            }
        }
        stopped.sort();
        stopped
    }

    /// Reconcile instance status with the attached processes.
    ///
    /// Instances with a transition in flight are left alone.
    pub async fn refresh_status(&self) {
        let mut processes = self.processes.lock().await;
        let exited: Vec<String> = processes
            .iter()
            .filter(|(_, entry)| entry.process.has_exited())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &exited {
            processes.remove(key);
        }

        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        for (key, instance) in instances.iter_mut() {
            if instance.is_loading {
                continue;
            }
            match processes.get(key) {
                Some(entry) if instance.running_token == Some(entry.token) => {
                    instance.status = ServiceStatus::Running;
                }
                _ => {
                    if instance.status != ServiceStatus::Stopped {
                        debug!(service = %key, "Process gone, marking stopped");
                    }
                    instance.mark_stopped();
                }
            }
        }
    }

    /// Start or stop an instance by key or by version name.
    pub async fn toggle(&self, name: &str) -> DevNestResult<bool> {
        let key = self.resolve(name)?;
        let running = self.get(&key).is_some_and(|i| i.is_running());
        if running {
            self.stop(&key).await
        } else {
            self.start(&key).await
        }
    }

    /// Start every selected instance whose settings ask for auto-start.
    ///
    /// Returns the keys that were started.
    pub async fn start_autostart(&self) -> Vec<String> {
        let settings = self.registry.settings().store().snapshot();
        let candidates: Vec<String> = self
            .services()
            .into_iter()
            .filter(|i| i.is_selected && settings.service(i.service_type).auto_start)
            .map(|i| i.key())
            .collect();

        let mut started = Vec::new();
        for key in candidates {
            match self.start(&key).await {
                Ok(true) => started.push(key),
                Ok(false) => debug!(service = %key, "Auto-start skipped"),
                Err(e) => warn!(service = %key, error = %e, "Auto-start failed"),
            }
        }
        started
    }

    /// Resolve a key (`Apache/2.4.58`), a display name or a bare version.
    ///
    /// An ambiguous version prefers the selected instance.
    pub fn resolve(&self, name: &str) -> DevNestResult<String> {
        let instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        if instances.contains_key(name) {
            return Ok(name.to_string());
        }

        let matches: Vec<&ServiceInstance> = instances
            .values()
            .filter(|i| {
                i.key().eq_ignore_ascii_case(name)
                    || i.display_name.eq_ignore_ascii_case(name)
                    || i.name.eq_ignore_ascii_case(name)
            })
            .collect();

        match matches.as_slice() {
            [only] => Ok(only.key()),
            [] => Err(unknown_instance(name)),
            many => many
                .iter()
                .find(|i| i.is_selected)
                .map(|i| i.key())
                .ok_or_else(|| DevNestError::Validation {
                    kind: ValidationErrorKind::InvalidParameter {
                        param: "name".to_string(),
                        message: format!("'{}' matches several services, use <Type>/<version>", name),
                    },
                }),
        }
    }

    async fn terminate(&self, key: &str, mut process: Supervised) -> DevNestResult<()> {
        if process.has_exited() {
            return Ok(());
        }

        if let Some(pid) = process.pid {
            if let Err(e) = process::request_exit(pid).await {
                warn!(service = key, error = %e, "Graceful stop request failed");
            }
        }

        if process.wait_exit(self.stop_grace).await {
            return Ok(());
        }

        warn!(
            service = key,
            grace_secs = self.stop_grace.as_secs(),
            "Service did not exit, killing"
        );
        process.force_kill();
        if process.wait_exit(KILL_WAIT).await {
            Ok(())
        } else {
            Err(DevNestError::Process {
                kind: ProcessErrorKind::TerminateFailed {
                    service: key.to_string(),
                    message: "process survived kill".to_string(),
                },
            })
        }
    }

    /// Runs on the monitor task when the process exits.
    fn exit_handler(
        &self,
        key: String,
        token: Uuid,
    ) -> impl FnOnce(Option<ExitStatus>) + Send + 'static {
        let instances = Arc::clone(&self.instances);
        let processes = Arc::clone(&self.processes);
        move |_status| {
            {
                let mut instances = instances.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(instance) = instances.get_mut(&key) {
                    if instance.running_token == Some(token)
                        && instance.status == ServiceStatus::Running
                    {
                        instance.mark_stopped();
                        info!(service = %key, "Service exited");
                    }
                }
            }

            // Detach the handle unless a newer process replaced it.
            tokio::spawn(async move {
                let mut processes = processes.lock().await;
                if processes.get(&key).is_some_and(|entry| entry.token == token) {
                    processes.remove(&key);
                }
            });
        }
    }

    fn loading_guard(&self, key: &str) -> LoadingGuard {
        LoadingGuard {
            instances: Arc::clone(&self.instances),
            key: key.to_string(),
        }
    }

    fn update<F>(&self, key: &str, f: F)
    where
        F: FnOnce(&mut ServiceInstance),
    {
        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(instance) = instances.get_mut(key) {
            f(instance);
        }
    }
}

fn unknown_instance(name: &str) -> DevNestError {
    DevNestError::Validation {
        kind: ValidationErrorKind::UnknownInstance {
            name: name.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsio::RetryPolicy;
    use crate::paths::PathConfig;
    use crate::services::ServiceType;
    use std::path::PathBuf;

    fn manager() -> ServiceManager {
        let settings = Arc::new(SettingsManager::new(
            PathConfig::native("/nonexistent/devnest"),
            Duration::from_millis(10),
            RetryPolicy::new(1, Duration::from_millis(1)),
        ));
        ServiceManager::new(settings, Duration::from_secs(1))
    }

    fn track(manager: &ServiceManager, ty: ServiceType, version: &str, selected: bool) {
        let mut instance = ServiceInstance::new(ty, version, PathBuf::from(version));
        instance.is_selected = selected;
        manager
            .instances
            .lock()
            .unwrap()
            .insert(instance.key(), instance);
    }

    #[test]
    fn test_resolve_by_key_name_and_version() {
        let manager = manager();
        track(&manager, ServiceType::Redis, "7.2.4", true);

        assert_eq!(manager.resolve("Redis/7.2.4").unwrap(), "Redis/7.2.4");
        assert_eq!(manager.resolve("redis 7.2.4").unwrap(), "Redis/7.2.4");
        assert_eq!(manager.resolve("7.2.4").unwrap(), "Redis/7.2.4");
        assert!(manager.resolve("7.4.0").is_err());
    }

    #[test]
    fn test_ambiguous_version_prefers_selected() {
        let manager = manager();
        track(&manager, ServiceType::Php, "8.3.4", false);
        track(&manager, ServiceType::Node, "8.3.4", true);
        assert_eq!(manager.resolve("8.3.4").unwrap(), "Node/8.3.4");

        let manager = self::manager();
        track(&manager, ServiceType::Php, "8.3.4", false);
        track(&manager, ServiceType::Node, "8.3.4", false);
        assert!(manager.resolve("8.3.4").is_err());
    }

    #[test]
    fn test_loading_guard_clears_flag() {
        let manager = manager();
        track(&manager, ServiceType::Redis, "7.2.4", false);
        manager.update("Redis/7.2.4", |i| i.is_loading = true);

        drop(manager.loading_guard("Redis/7.2.4"));
        assert!(!manager.get("Redis/7.2.4").unwrap().is_loading);
    }

    #[tokio::test]
    async fn test_refresh_drops_uninstalled_idle_instances() {
        let manager = manager();
        track(&manager, ServiceType::Redis, "7.2.4", false);
        assert_eq!(manager.refresh_services().await, 0);
        assert!(manager.services().is_empty());
    }
}
