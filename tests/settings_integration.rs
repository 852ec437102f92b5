//! Integration tests for settings persistence.
//!
//! Each test works on a throwaway stack root with real INI files on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use devnest::fsio::RetryPolicy;
use devnest::ini::IniDocument;
use devnest::paths::{ExecutionMode, PathConfig};
use devnest::resolver::{resolver_for, WSL_LAUNCHER};
use devnest::services::ServiceType;
use devnest::settings::SettingsManager;

fn manager(root: &Path, debounce: Duration) -> Arc<SettingsManager> {
    Arc::new(SettingsManager::new(
        PathConfig::native(root),
        debounce,
        RetryPolicy::new(3, Duration::from_millis(1)),
    ))
}

fn install(root: &Path, service: &str, version: &str) {
    std::fs::create_dir_all(root.join("bin").join(service).join(version))
        .expect("Failed to create install dir");
}

fn read_ini(path: &Path) -> IniDocument {
    let text = std::fs::read_to_string(path).expect("Failed to read settings file");
    IniDocument::parse(&text).expect("Settings file should parse")
}

/// Poll `check` until it holds or `limit` passes.
async fn eventually<F: Fn() -> bool>(limit: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn test_first_load_selects_installed_version() {
    let dir = TempDir::new().unwrap();
    install(dir.path(), "Apache", "2.4.58");

    let settings = manager(dir.path(), Duration::from_millis(20));
    let model = settings.load(false).await;

    assert_eq!(model.apache.common.selected_version, "2.4.58");
    assert_eq!(model.apache.common.available_versions, vec!["2.4.58".to_string()]);

    let doc = read_ini(&settings.paths().settings_file());
    assert_eq!(doc.get("Apache", "Version"), Some("2.4.58"));
    assert!(settings.paths().settings_file().ends_with("win.settings.ini"));
}

#[tokio::test]
async fn test_save_then_load_round_trip() {
    let dir = TempDir::new().unwrap();
    install(dir.path(), "Apache", "2.4.58");
    install(dir.path(), "Redis", "7.2.4");
    install(dir.path(), "MySQL", "8.0.36");

    let settings = manager(dir.path(), Duration::from_millis(20));
    settings.load(false).await;

    settings
        .store()
        .update_service(ServiceType::Redis, |s| {
            s.port = Some(6390);
            s.auto_start = true;
        });
    settings.store().update_general(|g| {
        g.start_with_windows = true;
        g.auto_create_database = true;
    });
    let saved = settings.store().snapshot();
    settings.save(&saved).await.unwrap();

    let reopened = manager(dir.path(), Duration::from_millis(20));
    let loaded = reopened.load(false).await;

    assert_eq!(loaded, saved);
    assert_eq!(loaded.redis.port, Some(6390));
    assert!(loaded.redis.auto_start);
    assert!(loaded.general.start_with_windows);
    assert!(loaded.general.auto_create_database);
}

#[tokio::test]
async fn test_unknown_selection_falls_back_to_first_installed() {
    let dir = TempDir::new().unwrap();
    install(dir.path(), "PHP", "8.2.17");
    install(dir.path(), "PHP", "8.3.4");

    let config = dir.path().join("config");
    std::fs::create_dir_all(&config).unwrap();
    std::fs::write(config.join("win.settings.ini"), "[PHP]\nVersion=7.4.0\n").unwrap();

    let settings = manager(dir.path(), Duration::from_millis(20));
    let model = settings.load(false).await;

    assert_eq!(model.php.selected_version, "8.2.17");
    let doc = read_ini(&settings.paths().settings_file());
    assert_eq!(doc.get("PHP", "Version"), Some("8.2.17"));
}

#[tokio::test]
async fn test_installable_versions_exclude_installed() {
    let dir = TempDir::new().unwrap();
    install(dir.path(), "Redis", "7.2.4");

    let config = dir.path().join("config");
    std::fs::create_dir_all(&config).unwrap();
    std::fs::write(
        config.join("services.ini"),
        "[Redis]\n\
         a.name = 7.2.4\n\
         a.url = https://example.org/redis-7.2.4.zip\n\
         b.name = 7.4.0\n\
         b.url = https://example.org/redis-7.4.0.zip\n",
    )
    .unwrap();

    let settings = manager(dir.path(), Duration::from_millis(20));
    let model = settings.load(false).await;

    assert_eq!(model.redis.installable_versions, vec!["7.4.0".to_string()]);
    assert_eq!(settings.catalog().await.len(), 2);
}

#[tokio::test]
async fn test_burst_of_changes_is_saved_once() {
    let dir = TempDir::new().unwrap();
    let settings = manager(dir.path(), Duration::from_millis(100));
    settings.load(false).await;
    let auto_save = settings.start_auto_save();

    let before = settings.save_count();
    for port in 6380..6390 {
        settings
            .store()
            .update_service(ServiceType::Redis, |s| s.port = Some(port));
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(eventually(Duration::from_secs(2), || settings.save_count() > before).await);
    // Give a second write the chance to show up if the debounce were broken.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(settings.save_count(), before + 1);

    let doc = read_ini(&settings.paths().settings_file());
    assert_eq!(doc.get("Redis", "Port"), Some("6389"));

    settings.store().unsubscribe();
    auto_save.await.unwrap();
}

#[tokio::test]
async fn test_switch_to_wsl_changes_root_and_file() {
    let dir = TempDir::new().unwrap();
    install(dir.path(), "Apache", "2.4.58");
    install(&dir.path().join("wsl"), "Apache", "2.4.59");
    let wsl_httpd = dir.path().join("wsl/bin/Apache/2.4.59/bin/httpd");
    std::fs::create_dir_all(wsl_httpd.parent().unwrap()).unwrap();
    std::fs::write(&wsl_httpd, b"").unwrap();

    let settings = manager(dir.path(), Duration::from_millis(20));
    let native = settings.load(false).await;
    assert_eq!(native.apache.common.selected_version, "2.4.58");

    settings.switch_execution_mode(true).await.unwrap();

    let paths = settings.paths();
    assert_eq!(paths.mode(), ExecutionMode::Wsl);
    assert_eq!(paths.root(), dir.path().join("wsl").as_path());
    assert!(paths.settings_file().ends_with("wsl.settings.ini"));
    assert!(paths.settings_file().exists());

    let model = settings.store().snapshot();
    assert!(model.general.use_wsl);
    assert_eq!(model.apache.common.selected_version, "2.4.59");

    let base = read_ini(&paths.base_settings_file());
    assert_eq!(base.get("General", "UseWSL"), Some("True"));

    // Commands now go through wsl.exe with Linux-side paths.
    let command = resolver_for(paths.config())
        .resolve(
            ServiceType::Apache,
            &paths.install_dir(ServiceType::Apache, "2.4.59"),
            &model,
        )
        .expect("Apache should resolve in WSL mode");
    assert_eq!(command.program, PathBuf::from(WSL_LAUNCHER));
    assert!(command
        .args
        .contains(&"/opt/devnest/bin/Apache/2.4.59/bin/httpd".to_string()));

    // And back again.
    settings.switch_execution_mode(false).await.unwrap();
    assert_eq!(settings.paths().mode(), ExecutionMode::Native);
    assert_eq!(
        settings.store().snapshot().apache.common.selected_version,
        "2.4.58"
    );
}

#[tokio::test]
async fn test_wsl_flag_flip_switches_through_auto_save() {
    let dir = TempDir::new().unwrap();
    let settings = manager(dir.path(), Duration::from_secs(30));
    settings.load(false).await;
    let auto_save = settings.start_auto_save();

    // Pending under a long debounce when the switch arrives.
    settings
        .store()
        .update_service(ServiceType::Redis, |s| s.port = Some(6391));
    tokio::time::sleep(Duration::from_millis(20)).await;
    settings.store().set_use_wsl(true);

    let switched = eventually(Duration::from_secs(2), || {
        settings.paths().mode() == ExecutionMode::Wsl
    })
    .await;
    assert!(switched);

    let native_file = dir.path().join("config").join("win.settings.ini");
    let flushed = eventually(Duration::from_secs(2), || {
        std::fs::read_to_string(&native_file)
            .map(|text| text.contains("6391"))
            .unwrap_or(false)
    })
    .await;
    assert!(flushed, "pending edit should land in the old mode's file");

    settings.store().unsubscribe();
    auto_save.await.unwrap();
}

#[tokio::test]
async fn test_cached_load_returns_in_memory_model() {
    let dir = TempDir::new().unwrap();
    let settings = manager(dir.path(), Duration::from_millis(20));

    settings.load(false).await;
    settings
        .store()
        .update_general(|g| g.enable_ngrok = true);

    assert!(settings.load(true).await.general.enable_ngrok);
    assert!(!settings.load(false).await.general.enable_ngrok);
}
