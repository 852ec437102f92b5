//! Derived configuration generation.
//!
//! Turns the [`Artifact`] lists produced by the service descriptors into
//! files on disk. Failures are collected and logged; one bad artifact never
//! stops the others.

use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::DevNestError;
use crate::fsio::{self, RetryPolicy};
use crate::paths::PathResolver;
use crate::services::{descriptor, Artifact, GenerationContext, ServiceType};
use crate::sites;
use crate::templates::TemplateEngine;

use super::model::SettingsModel;

/// Everything needed to regenerate configuration, detached from the
/// manager so it can run on a spawned task.
#[derive(Clone)]
pub(crate) struct ConfigGenerator {
    pub(crate) paths: PathResolver,
    pub(crate) templates: TemplateEngine,
    pub(crate) retry: RetryPolicy,
    /// Serializes runs; two saves in a row must not interleave a clear and a render.
    pub(crate) run_lock: Arc<Mutex<()>>,
}

impl ConfigGenerator {
    /// Regenerate artifacts for every service with an installed selection.
    ///
    /// Returns the failures, each already logged.
    pub(crate) async fn run(&self, settings: &SettingsModel) -> Vec<DevNestError> {
        let _guard = self.run_lock.lock().await;

        let site_list = match sites::list_sites(&self.paths.www()).await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "Failed to list sites, generating without vhosts");
                Vec::new()
            }
        };

        let mut failures = Vec::new();
        let mut applied = 0usize;

        for service_type in ServiceType::ALL {
            let selected = settings.selected_version(service_type);
            if selected.is_empty() {
                continue;
            }
            let install_path = self.paths.install_dir(service_type, selected);
            if !install_path.is_dir() {
                debug!(
                    service = %service_type,
                    version = selected,
                    "Selected version not installed, skipping generation"
                );
                continue;
            }

            let ctx = GenerationContext {
                install_path: &install_path,
                settings,
                paths: &self.paths,
                sites: &site_list,
            };

            for artifact in descriptor(service_type).artifacts(&ctx) {
                match self.apply(service_type, &artifact).await {
                    Ok(()) => applied += 1,
                    Err(e) => {
                        warn!(service = %service_type, error = %e, "Config generation failed");
                        failures.push(e);
                    }
                }
            }
        }

        info!(
            applied = applied,
            failed = failures.len(),
            sites = site_list.len(),
            "Configuration regenerated"
        );
        failures
    }

    async fn apply(&self, service_type: ServiceType, artifact: &Artifact) -> Result<(), DevNestError> {
        let wrap = |path: &Path, e: DevNestError| DevNestError::ConfigGeneration {
            service: service_type.to_string(),
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        match artifact {
            Artifact::Render {
                template,
                context,
                dest,
            } => {
                let content = self
                    .templates
                    .render(template, context)
                    .map_err(|e| wrap(dest, e))?;
                fsio::write_retry(dest, content.as_bytes(), self.retry)
                    .await
                    .map_err(|e| wrap(dest, e))?;
                debug!(path = %dest.display(), template = template, "Rendered");
            }
            Artifact::CopyIfMissing { from, to } => {
                if to.exists() {
                    return Ok(());
                }
                if !from.exists() {
                    debug!(path = %from.display(), "Copy source missing, skipping");
                    return Ok(());
                }
                fs::copy(from, to)
                    .await
                    .map_err(|e| wrap(to, e.into()))?;
                info!(from = %from.display(), to = %to.display(), "Copied default config");
            }
            Artifact::EnsureDir(dir) => {
                fsio::ensure_dir(dir).await.map_err(|e| wrap(dir, e))?;
            }
            Artifact::ClearDir(dir) => {
                clear_dir(dir).await.map_err(|e| wrap(dir, e))?;
            }
        }
        Ok(())
    }
}

/// Remove every regular file in `dir`, creating the directory if missing.
async fn clear_dir(dir: &Path) -> Result<(), DevNestError> {
    fsio::ensure_dir(dir).await?;
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            fs::remove_file(entry.path()).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::PathConfig;

    fn generator(root: &Path) -> ConfigGenerator {
        ConfigGenerator {
            paths: PathResolver::new(PathConfig::native(root)),
            templates: TemplateEngine::builtin().unwrap(),
            retry: RetryPolicy::default(),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    #[tokio::test]
    async fn test_apache_generation_clears_stale_vhosts() {
        let dir = tempfile::tempdir().unwrap();
        let gen = generator(dir.path());
        let paths = &gen.paths;

        std::fs::create_dir_all(paths.install_dir(ServiceType::Apache, "2.4.58").join("conf")).unwrap();
        std::fs::create_dir_all(paths.www().join("blog")).unwrap();
        let enabled = paths.sites_enabled("apache2");
        std::fs::create_dir_all(&enabled).unwrap();
        std::fs::write(enabled.join("auto.gone.dev.conf"), "stale").unwrap();

        let mut settings = SettingsModel::default();
        settings.apache.common.selected_version = "2.4.58".to_string();
        settings.apache.common.port = Some(8080);

        let failures = gen.run(&settings).await;
        assert!(failures.is_empty());

        let httpd = std::fs::read_to_string(
            paths
                .install_dir(ServiceType::Apache, "2.4.58")
                .join("conf")
                .join("httpd.conf"),
        )
        .unwrap();
        assert!(httpd.contains("Listen 8080"));

        assert!(!enabled.join("auto.gone.dev.conf").exists());
        assert!(enabled.join("auto.blog.dev.conf").exists());
    }

    #[tokio::test]
    async fn test_php_ini_copied_once() {
        let dir = tempfile::tempdir().unwrap();
        let gen = generator(dir.path());
        let install = gen.paths.install_dir(ServiceType::Php, "8.3.4");
        std::fs::create_dir_all(&install).unwrap();
        std::fs::write(install.join("php.ini-development"), "memory_limit=128M").unwrap();

        let mut settings = SettingsModel::default();
        settings.php.selected_version = "8.3.4".to_string();

        assert!(gen.run(&settings).await.is_empty());
        assert_eq!(
            std::fs::read_to_string(install.join("php.ini")).unwrap(),
            "memory_limit=128M"
        );

        // An edited php.ini is left alone.
        std::fs::write(install.join("php.ini"), "memory_limit=1G").unwrap();
        assert!(gen.run(&settings).await.is_empty());
        assert_eq!(
            std::fs::read_to_string(install.join("php.ini")).unwrap(),
            "memory_limit=1G"
        );
    }

    #[tokio::test]
    async fn test_render_failure_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut gen = generator(dir.path());
        gen.templates = TemplateEngine::empty();

        let install = gen.paths.install_dir(ServiceType::MongoDb, "7.0.5");
        std::fs::create_dir_all(install.join("bin")).unwrap();
        let mut settings = SettingsModel::default();
        settings.mongodb.common.selected_version = "7.0.5".to_string();

        let failures = gen.run(&settings).await;
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            failures[0],
            DevNestError::ConfigGeneration { ref service, .. } if service == "MongoDB"
        ));
        // Directory artifacts still ran.
        assert!(gen.paths.data().join("mongodb").is_dir());
    }
}
