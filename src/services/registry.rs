//! Service registry.
//!
//! Enumerates installed instances by walking `bin/<Type>/<version>` and
//! installable packages by reading the services catalog.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::fsio::{self, RetryPolicy};
use crate::paths::PathResolver;
use crate::resolver::resolver_for;
use crate::settings::SettingsManager;

use super::catalog::{parse_catalog, ServiceDefinition};
use super::instance::ServiceInstance;
use super::types::ServiceType;

/// Registry of installed and installable services.
///
/// Holds no state of its own: every call re-reads the disk and the current
/// settings, so a mode switch is picked up immediately.
pub struct ServiceRegistry {
    settings: Arc<SettingsManager>,
}

impl ServiceRegistry {
    pub fn new(settings: Arc<SettingsManager>) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Arc<SettingsManager> {
        &self.settings
    }

    /// Every installed version of every known service type.
    ///
    /// Commands are resolved against the current settings; instances whose
    /// command cannot be resolved are still listed, with `command: None`.
    pub async fn get_installed_services(&self) -> Vec<ServiceInstance> {
        let paths = self.settings.paths();
        let settings = self.settings.store().snapshot();
        let resolver = resolver_for(paths.config());

        let type_dirs = match fsio::list_subdirs(&paths.bin()).await {
            Ok(dirs) => dirs,
            Err(e) => {
                warn!(path = %paths.bin().display(), error = %e, "Failed to scan bin directory");
                return Vec::new();
            }
        };

        let mut instances = Vec::new();
        for dir in type_dirs {
            let service_type = match dir.parse::<ServiceType>() {
                Ok(ty) => ty,
                Err(_) => {
                    debug!(directory = %dir, "Ignoring unknown service directory");
                    continue;
                }
            };

            let selection = settings.service(service_type);
            for version in installed_versions(&paths, service_type).await {
                let path = paths.install_dir(service_type, &version);
                let mut instance = ServiceInstance::new(service_type, &version, path);
                instance.command = resolver.resolve(service_type, &instance.path, &settings);
                instance.is_selected = selection.is_selected(&version);
                instances.push(instance);
            }
        }

        info!(
            count = instances.len(),
            mode = %paths.mode(),
            "Installed services enumerated"
        );
        instances
    }

    /// Catalog entries from `services.ini`.
    pub async fn get_available_service_definitions(&self) -> Vec<ServiceDefinition> {
        load_catalog(&self.settings.paths(), self.settings.retry_policy()).await
    }
}

/// Installed version folders for one service type, sorted.
pub async fn installed_versions(paths: &PathResolver, service_type: ServiceType) -> Vec<String> {
    let dir = paths.bin_for(service_type);
    match fsio::list_subdirs(&dir).await {
        Ok(versions) => versions,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Failed to scan service directory");
            Vec::new()
        }
    }
}

/// Read and parse the services catalog. Failures yield an empty catalog.
pub async fn load_catalog(paths: &PathResolver, policy: RetryPolicy) -> Vec<ServiceDefinition> {
    let path = paths.services_catalog();
    if !Path::new(&path).exists() {
        debug!(path = %path.display(), "No services catalog");
        return Vec::new();
    }

    let parsed = match fsio::read_to_string_retry(&path, policy).await {
        Ok(text) => parse_catalog(&text),
        Err(e) => Err(e),
    };

    match parsed {
        Ok(definitions) => definitions,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load services catalog");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::PathConfig;

    #[tokio::test]
    async fn test_installed_versions_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathResolver::new(PathConfig::native(dir.path()));
        std::fs::create_dir_all(paths.install_dir(ServiceType::Php, "8.3.4")).unwrap();
        std::fs::create_dir_all(paths.install_dir(ServiceType::Php, "8.2.17")).unwrap();

        let versions = installed_versions(&paths, ServiceType::Php).await;
        assert_eq!(versions, vec!["8.2.17".to_string(), "8.3.4".to_string()]);
        assert!(installed_versions(&paths, ServiceType::Node).await.is_empty());
    }

    #[tokio::test]
    async fn test_load_catalog_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathResolver::new(PathConfig::native(dir.path()));
        assert!(load_catalog(&paths, RetryPolicy::default()).await.is_empty());
    }

    #[tokio::test]
    async fn test_load_catalog_from_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathResolver::new(PathConfig::native(dir.path()));
        std::fs::create_dir_all(paths.config_dir()).unwrap();
        std::fs::write(
            paths.services_catalog(),
            "[Redis]\nr.name = 7.2.4\nr.url = https://example.org/r.zip\n",
        )
        .unwrap();

        let catalog = load_catalog(&paths, RetryPolicy::default()).await;
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].service_type, ServiceType::Redis);
    }
}
