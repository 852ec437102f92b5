//! Settings persistence manager.
//!
//! Loads the settings aggregate from the INI files under `<root>/config`,
//! keeps the disk copy in sync with the in-memory [`SettingsStore`] through
//! a debounced auto-save, and regenerates derived service configuration
//! after every save.
//!
//! Two files are involved:
//!
//! - `settings.ini` holds the mode-independent flags, including `UseWSL`.
//! - `win.settings.ini` / `wsl.settings.ini` hold the per-service blocks of
//!   the active execution mode.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::{DevNestError, DevNestResult};
use crate::fsio::{self, RetryPolicy};
use crate::ini::{IniDocument, IniSection};
use crate::paths::{ExecutionMode, PathConfig, PathResolver};
use crate::services::{descriptor, installed_versions, load_catalog, ServiceDefinition, ServiceType};
use crate::templates::TemplateEngine;

use super::debounce::Debouncer;
use super::generate::ConfigGenerator;
use super::model::{GeneralSettings, SettingsModel};
use super::store::{SettingsChange, SettingsStore};

const GENERAL_SECTION: &str = "General";

/// Owns the settings files and the auto-save pipeline.
pub struct SettingsManager {
    paths: RwLock<PathConfig>,
    store: Arc<SettingsStore>,
    /// Held for the whole of a load or a save.
    file_lock: Mutex<()>,
    loaded: AtomicBool,
    templates: TemplateEngine,
    retry: RetryPolicy,
    debouncer: Debouncer,
    generation_lock: Arc<Mutex<()>>,
    save_count: AtomicU64,
    /// Mode of the model currently in the store.
    mode_tx: watch::Sender<ExecutionMode>,
}

impl SettingsManager {
    /// Create a manager for the given roots.
    ///
    /// Templates are loaded from `<native_root>/templates`; if that fails the
    /// built-in templates are used.
    pub fn new(config: PathConfig, debounce: Duration, retry: RetryPolicy) -> Self {
        let template_dir = PathResolver::new(config.clone()).templates();
        let templates = TemplateEngine::new(&template_dir).unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to built-in templates");
            TemplateEngine::builtin().unwrap_or_else(|_| TemplateEngine::empty())
        });

        let (mode_tx, _) = watch::channel(config.mode);
        Self {
            paths: RwLock::new(config),
            store: Arc::new(SettingsStore::default()),
            file_lock: Mutex::new(()),
            loaded: AtomicBool::new(false),
            templates,
            retry,
            debouncer: Debouncer::new(debounce),
            generation_lock: Arc::new(Mutex::new(())),
            save_count: AtomicU64::new(0),
            mode_tx,
        }
    }

    /// Create a manager from the application config, starting in native
    /// mode. The first [`load`](Self::load) switches to WSL if the base
    /// settings file says so.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.path_config(ExecutionMode::Native),
            config.timings.autosave_debounce(),
            RetryPolicy::new(
                config.timings.io_retry_attempts,
                config.timings.io_retry_base_delay(),
            ),
        )
    }

    /// Path resolver for the active mode.
    pub fn paths(&self) -> PathResolver {
        PathResolver::new(self.paths.read().unwrap_or_else(|e| e.into_inner()).clone())
    }

    pub fn store(&self) -> &Arc<SettingsStore> {
        &self.store
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn templates(&self) -> &TemplateEngine {
        &self.templates
    }

    /// Number of completed writes of the mode settings file.
    pub fn save_count(&self) -> u64 {
        self.save_count.load(Ordering::SeqCst)
    }

    /// Follow the execution mode.
    ///
    /// A change is published only once the store holds the model loaded
    /// from the new root.
    pub fn watch_mode(&self) -> watch::Receiver<ExecutionMode> {
        self.mode_tx.subscribe()
    }

    /// Installable packages from `services.ini`.
    pub async fn catalog(&self) -> Vec<ServiceDefinition> {
        load_catalog(&self.paths(), self.retry).await
    }

    /// Load settings into the store and return a copy.
    ///
    /// With `use_cache` a previously loaded model is returned as is. Never
    /// fails: on read or parse errors the defaults are returned.
    pub async fn load(&self, use_cache: bool) -> SettingsModel {
        if use_cache && self.loaded.load(Ordering::SeqCst) {
            return self.store.snapshot();
        }

        let _guard = self.file_lock.lock().await;
        self.store.set_initializing(true);
        let model = self.load_locked().await;
        self.store.replace(model.clone());
        self.loaded.store(true, Ordering::SeqCst);
        self.store.set_initializing(false);
        self.publish_mode();
        model
    }

    /// Persist `settings` and regenerate derived configuration in the
    /// background.
    pub async fn save(&self, settings: &SettingsModel) -> DevNestResult<()> {
        {
            let _guard = self.file_lock.lock().await;
            self.write_files(&self.paths(), settings).await?;
        }
        self.spawn_regeneration(settings.clone());
        Ok(())
    }

    /// Persist whatever the store currently holds.
    pub async fn save_current(&self) -> DevNestResult<()> {
        let snapshot = self.store.snapshot();
        self.save(&snapshot).await
    }

    /// Subscribe to the store and persist changes.
    ///
    /// Ordinary changes restart the debounce timer. A flip of the WSL flag
    /// bypasses the timer and switches the execution mode at once. The task
    /// ends when the store's subscriber is replaced or dropped.
    pub fn start_auto_save(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.store.subscribe();
        let manager = Arc::clone(self);

        tokio::spawn(async move {
            debug!("Auto-save started");
            while let Some(change) = changes.recv().await {
                match change {
                    SettingsChange::ExecutionMode(use_wsl) => {
                        if let Err(e) = manager.switch_execution_mode(use_wsl).await {
                            error!(error = %e, use_wsl = use_wsl, "Execution mode switch failed");
                        }
                    }
                    other => {
                        debug!(change = ?other, "Settings changed, scheduling save");
                        let saver = Arc::clone(&manager);
                        manager.debouncer.schedule(async move {
                            if let Err(e) = saver.save_current().await {
                                error!(error = %e, "Auto-save failed");
                            }
                        });
                    }
                }
            }
            manager.debouncer.cancel();
            debug!("Auto-save stopped");
        })
    }

    /// Switch between native and WSL roots.
    ///
    /// Notifications are suppressed for the duration. Pending edits are
    /// flushed to the old mode's file, the base file is written with the new
    /// flag, the path base is swapped and the whole model is reloaded from
    /// the new root.
    pub async fn switch_execution_mode(&self, use_wsl: bool) -> DevNestResult<()> {
        self.store.set_initializing(true);
        let result = self.switch_locked(use_wsl).await;
        self.store.set_initializing(false);

        match &result {
            Ok(()) => info!(mode = %self.paths().mode(), "Execution mode switched"),
            Err(_) => {
                // Keep the in-memory flag consistent with the active root.
                let active = self.paths().mode().is_wsl();
                self.store.set_initializing(true);
                self.store.update_general(|general| general.use_wsl = active);
                self.store.set_initializing(false);
                self.publish_mode();
            }
        }
        result
    }

    /// Regenerate derived configuration for `settings` and wait for it.
    ///
    /// Returns the per-artifact failures; they are logged and never abort
    /// the run.
    pub async fn regenerate_configs(&self, settings: &SettingsModel) -> Vec<DevNestError> {
        self.generator().run(settings).await
    }

    fn generator(&self) -> ConfigGenerator {
        ConfigGenerator {
            paths: self.paths(),
            templates: self.templates.clone(),
            retry: self.retry,
            run_lock: Arc::clone(&self.generation_lock),
        }
    }

    fn spawn_regeneration(&self, settings: SettingsModel) {
        let generator = self.generator();
        tokio::spawn(async move {
            generator.run(&settings).await;
        });
    }

    fn set_mode(&self, mode: ExecutionMode) {
        let mut config = self.paths.write().unwrap_or_else(|e| e.into_inner());
        config.mode = mode;
    }

    fn publish_mode(&self) {
        let mode = self.paths().mode();
        self.mode_tx.send_if_modified(|current| {
            if *current == mode {
                return false;
            }
            *current = mode;
            true
        });
    }

    async fn switch_locked(&self, use_wsl: bool) -> DevNestResult<()> {
        let _guard = self.file_lock.lock().await;
        let target = ExecutionMode::from_use_wsl(use_wsl);
        let old_paths = self.paths();

        if self.debouncer.is_pending() {
            self.debouncer.cancel();
            let pending = self.store.snapshot();
            self.write_mode_file(&old_paths, &pending).await?;
        }

        let mut general = self.store.read().general.clone();
        general.use_wsl = use_wsl;
        self.write_base_file(&old_paths, &general).await?;

        if old_paths.mode() != target {
            self.set_mode(target);
        }

        let model = self.load_locked().await;
        self.store.replace(model);
        self.publish_mode();
        Ok(())
    }

    async fn load_locked(&self) -> SettingsModel {
        match self.read_files().await {
            Ok(model) => model,
            Err(e) => {
                warn!(error = %e, "Failed to load settings, using defaults");
                SettingsModel::default()
            }
        }
    }

    async fn read_files(&self) -> DevNestResult<SettingsModel> {
        let mut model = SettingsModel::default();
        let mut persist = false;

        let base_path = self.paths().base_settings_file();
        if base_path.exists() {
            let text = fsio::read_to_string_retry(&base_path, self.retry).await?;
            let doc = IniDocument::parse_named(&text, &base_path.display().to_string())?;
            if let Some(section) = doc.section(GENERAL_SECTION) {
                read_base_general(section, &mut model.general);
            }
        }

        let mode = ExecutionMode::from_use_wsl(model.general.use_wsl);
        if mode != self.paths().mode() {
            info!(mode = %mode, "Base settings select a different execution mode");
            self.set_mode(mode);
        }
        let paths = self.paths();

        let file = paths.settings_file();
        if file.exists() {
            let text = fsio::read_to_string_retry(&file, self.retry).await?;
            let doc = IniDocument::parse_named(&text, &file.display().to_string())?;
            if let Some(section) = doc.section(GENERAL_SECTION) {
                read_mode_general(section, &mut model.general);
            }
            for service_type in ServiceType::ALL {
                if let Some(section) = doc.section(service_type.as_str()) {
                    descriptor(service_type).read_section(section, &mut model);
                }
            }
            debug!(path = %file.display(), "Settings loaded");
        } else {
            info!(path = %file.display(), "No settings file, writing defaults");
            persist = true;
        }

        if self.populate_versions(&paths, &mut model).await {
            persist = true;
        }

        if persist {
            self.write_files(&paths, &model).await?;
            self.spawn_regeneration(model.clone());
        }

        Ok(model)
    }

    /// Fill the transient version lists and repair selections that do not
    /// match an installed version. Returns true if a selection changed.
    async fn populate_versions(&self, paths: &PathResolver, model: &mut SettingsModel) -> bool {
        let catalog = load_catalog(paths, self.retry).await;
        let mut repaired = false;

        for service_type in ServiceType::ALL {
            let installed = installed_versions(paths, service_type).await;
            let installable: Vec<String> = catalog
                .iter()
                .filter(|def| def.service_type == service_type)
                .filter(|def| !installed.iter().any(|v| v.eq_ignore_ascii_case(&def.name)))
                .map(|def| def.name.clone())
                .collect();

            let service = model.service_mut(service_type);
            if let Some(first) = installed.first() {
                if !installed.iter().any(|v| service.is_selected(v)) {
                    info!(
                        service = %service_type,
                        previous = %service.selected_version,
                        selected = %first,
                        "Selecting first installed version"
                    );
                    service.selected_version = first.clone();
                    repaired = true;
                }
            }
            service.available_versions = installed;
            service.installable_versions = installable;
        }

        repaired
    }

    async fn write_files(&self, paths: &PathResolver, settings: &SettingsModel) -> DevNestResult<()> {
        self.write_base_file(paths, &settings.general).await?;
        self.write_mode_file(paths, settings).await
    }

    async fn write_base_file(&self, paths: &PathResolver, general: &GeneralSettings) -> DevNestResult<()> {
        let mut doc = IniDocument::new();
        doc.put_section(write_base_general(general));

        let path = paths.base_settings_file();
        fsio::write_retry(&path, doc.to_string().as_bytes(), self.retry).await?;
        debug!(path = %path.display(), "Base settings written");
        Ok(())
    }

    async fn write_mode_file(&self, paths: &PathResolver, settings: &SettingsModel) -> DevNestResult<()> {
        let mut doc = IniDocument::new();
        let mut general = IniSection::new(GENERAL_SECTION);
        general.set_bool("AutoCreateDatabase", settings.general.auto_create_database);
        doc.put_section(general);

        for service_type in ServiceType::ALL {
            doc.put_section(descriptor(service_type).write_section(settings));
        }

        let path = paths.settings_file();
        fsio::write_retry(&path, doc.to_string().as_bytes(), self.retry).await?;
        let count = self.save_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!(path = %path.display(), count = count, "Settings saved");
        Ok(())
    }
}

fn read_base_general(section: &IniSection, general: &mut GeneralSettings) {
    if let Some(v) = section.get_bool("StartWithWindows") {
        general.start_with_windows = v;
    }
    if let Some(v) = section.get_bool("MinimizeToTray") {
        general.minimize_to_tray = v;
    }
    if let Some(v) = section.get_bool("AutoVirtualHosts") {
        general.auto_virtual_hosts = v;
    }
    if let Some(v) = section.get_bool("EnableNgrok") {
        general.enable_ngrok = v;
    }
    if let Some(v) = section.get_bool("UseWSL") {
        general.use_wsl = v;
    }
}

fn write_base_general(general: &GeneralSettings) -> IniSection {
    let mut section = IniSection::new(GENERAL_SECTION);
    section.set_bool("StartWithWindows", general.start_with_windows);
    section.set_bool("MinimizeToTray", general.minimize_to_tray);
    section.set_bool("AutoVirtualHosts", general.auto_virtual_hosts);
    section.set_bool("EnableNgrok", general.enable_ngrok);
    section.set_bool("UseWSL", general.use_wsl);
    section
}

fn read_mode_general(section: &IniSection, general: &mut GeneralSettings) {
    if let Some(v) = section.get_bool("AutoCreateDatabase") {
        general.auto_create_database = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(root: &std::path::Path) -> SettingsManager {
        SettingsManager::new(
            PathConfig::native(root),
            Duration::from_millis(20),
            RetryPolicy::new(2, Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn test_missing_files_write_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        let model = manager.load(false).await;
        assert_eq!(model.apache.common.port, Some(80));
        assert!(manager.paths().settings_file().exists());
        assert!(manager.paths().base_settings_file().exists());
        assert_eq!(manager.save_count(), 1);
    }

    #[tokio::test]
    async fn test_cached_load_skips_disk() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        manager.load(false).await;

        manager.store().update_service(ServiceType::Redis, |s| s.port = Some(6390));
        let cached = manager.load(true).await;
        assert_eq!(cached.redis.port, Some(6390));

        let fresh = manager.load(false).await;
        assert_eq!(fresh.redis.port, Some(6379));
    }

    #[tokio::test]
    async fn test_malformed_file_degrades_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        std::fs::create_dir_all(manager.paths().config_dir()).unwrap();
        std::fs::write(manager.paths().settings_file(), "[Apache\nVersion=1\n").unwrap();

        let model = manager.load(false).await;
        assert_eq!(model, SettingsModel::default());
        // The broken file is left for the user to inspect.
        assert_eq!(manager.save_count(), 0);
    }

    #[tokio::test]
    async fn test_base_file_selects_mode() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        std::fs::create_dir_all(manager.paths().config_dir()).unwrap();
        std::fs::write(
            manager.paths().base_settings_file(),
            "[General]\nUseWSL=True\n",
        )
        .unwrap();

        let model = manager.load(false).await;
        assert!(model.general.use_wsl);
        assert_eq!(manager.paths().mode(), ExecutionMode::Wsl);
        assert!(manager.paths().settings_file().ends_with("wsl.settings.ini"));
    }

    #[tokio::test]
    async fn test_mode_change_published_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        manager.load(false).await;

        let mut modes = manager.watch_mode();
        assert_eq!(*modes.borrow_and_update(), ExecutionMode::Native);

        manager.switch_execution_mode(true).await.unwrap();
        assert!(modes.has_changed().unwrap());
        assert_eq!(*modes.borrow_and_update(), ExecutionMode::Wsl);
        assert!(manager.store().read().general.use_wsl);

        // Reloading in the same mode publishes nothing.
        manager.load(false).await;
        assert!(!modes.has_changed().unwrap());
    }

    #[test]
    fn test_general_split_between_files() {
        let general = GeneralSettings {
            start_with_windows: true,
            auto_create_database: true,
            use_wsl: true,
            ..GeneralSettings::default()
        };
        let section = write_base_general(&general);
        assert_eq!(section.get("UseWSL"), Some("True"));
        assert!(section.get("AutoCreateDatabase").is_none());

        let mut parsed = GeneralSettings::default();
        read_base_general(&section, &mut parsed);
        assert!(parsed.start_with_windows);
        assert!(parsed.use_wsl);
        assert!(!parsed.auto_create_database);
    }
}
