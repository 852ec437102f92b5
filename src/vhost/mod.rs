//! Virtual host management.
//!
//! Each site `<name>` under `www` is served as `<name>.dev`: an Apache vhost
//! file `etc/apache2/sites-enabled/auto.<name>.dev.conf` plus a tagged hosts
//! file line pointing the domain at loopback.

mod elevation;
mod hosts;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{DevNestError, DevNestResult, ValidationErrorKind};
use crate::fsio;
use crate::paths::PathResolver;
use crate::services::{Artifact, ServiceType, APACHE_SERVER_DIR};
use crate::settings::{SettingsManager, SettingsModel};
use crate::sites;
use crate::validation::validate_site_name;

pub use elevation::{Elevation, PlatformElevation};
pub use hosts::{has_domain, hosts_entry, with_entry, without_entry, HostsFile, HOSTS_TAG};

/// Template for one site's vhost.
pub const VHOST_TEMPLATE: &str = "apache/vhost.conf.tera";

/// Top-level domain given to every site.
pub const SITE_TLD: &str = "dev";

/// `<site>.dev`
pub fn site_domain(site: &str) -> String {
    format!("{}.{}", site, SITE_TLD)
}

/// Generated vhost file for `site`.
pub fn vhost_path(paths: &PathResolver, site: &str) -> PathBuf {
    paths
        .sites_enabled(APACHE_SERVER_DIR)
        .join(format!("auto.{}.conf", site_domain(site)))
}

/// Template variables for one site's vhost.
fn vhost_context(paths: &PathResolver, settings: &SettingsModel, site: &str) -> Value {
    json!({
        "site_name": site,
        "hostname": site_domain(site),
        "port": settings.service(ServiceType::Apache).port.unwrap_or(80),
        "project_dir": paths.process_path(&paths.www().join(site)),
    })
}

/// Render step for one site's vhost.
pub fn vhost_artifact(paths: &PathResolver, settings: &SettingsModel, site: &str) -> Artifact {
    Artifact::Render {
        template: VHOST_TEMPLATE,
        context: vhost_context(paths, settings, site),
        dest: vhost_path(paths, site),
    }
}

/// Creates and removes per-site vhosts and hosts entries.
pub struct VirtualHostManager {
    settings: Arc<SettingsManager>,
    hosts: HostsFile,
    elevation: Arc<dyn Elevation>,
}

impl VirtualHostManager {
    /// Manager editing the system hosts file.
    pub fn new(settings: Arc<SettingsManager>) -> Self {
        Self::with_hosts(
            settings,
            HostsFile::system(),
            Arc::new(PlatformElevation::default()),
        )
    }

    pub fn with_hosts(
        settings: Arc<SettingsManager>,
        hosts: HostsFile,
        elevation: Arc<dyn Elevation>,
    ) -> Self {
        Self {
            settings,
            hosts,
            elevation,
        }
    }

    pub fn hosts(&self) -> &HostsFile {
        &self.hosts
    }

    /// Write the vhost file (unless present) and the hosts entry.
    ///
    /// The site must exist under `www`: Apache config regeneration rewrites
    /// `sites-enabled` from that listing. Calling this again for the same
    /// site changes nothing.
    pub async fn create_virtual_host(&self, site: &str) -> DevNestResult<()> {
        validate_site_name(site)?;

        let paths = self.settings.paths();
        let www = paths.www();
        if !www.join(site).is_dir() {
            return Err(DevNestError::Validation {
                kind: ValidationErrorKind::UnknownSite {
                    name: site.to_string(),
                    www,
                },
            });
        }

        let file = vhost_path(&paths, site);
        if file.exists() {
            debug!(site = site, path = %file.display(), "Vhost already present");
        } else {
            self.write_vhost(&paths, site)
                .await
                .map_err(|e| DevNestError::site(site, e))?;
            info!(site = site, path = %file.display(), "Vhost created");
        }

        self.update_hosts(site, HostsEdit::Add).await
    }

    /// Delete the vhost file and every hosts line mapping the site.
    pub async fn remove_virtual_host(&self, site: &str) -> DevNestResult<()> {
        validate_site_name(site)?;

        let file = vhost_path(&self.settings.paths(), site);
        match tokio::fs::remove_file(&file).await {
            Ok(()) => info!(site = site, path = %file.display(), "Vhost removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(DevNestError::site(site, e)),
        }

        self.update_hosts(site, HostsEdit::Remove).await
    }

    /// Create vhosts for every site under `www`. Returns how many sites
    /// were processed; per-site failures are logged and skipped.
    pub async fn regenerate_all(&self) -> DevNestResult<usize> {
        let paths = self.settings.paths();
        let list = sites::list_sites(&paths.www()).await?;

        let mut created = 0;
        for site in &list {
            match self.create_virtual_host(&site.name).await {
                Ok(()) => created += 1,
                Err(e) => warn!(site = %site.name, error = %e, "Failed to create vhost"),
            }
        }
        Ok(created)
    }

    async fn write_vhost(&self, paths: &PathResolver, site: &str) -> DevNestResult<()> {
        let settings = self.settings.store().snapshot();
        let context = vhost_context(paths, &settings, site);
        let content = self.settings.templates().render(VHOST_TEMPLATE, &context)?;
        fsio::write_retry(
            &vhost_path(paths, site),
            content.as_bytes(),
            self.settings.retry_policy(),
        )
        .await
    }

    async fn update_hosts(&self, site: &str, edit: HostsEdit) -> DevNestResult<()> {
        let domain = site_domain(site);
        let content = self
            .hosts
            .read()
            .await
            .map_err(|e| DevNestError::site(site, e))?;

        let updated = match edit {
            HostsEdit::Add => with_entry(&content, &domain),
            HostsEdit::Remove => without_entry(&content, &domain),
        };
        let Some(updated) = updated else {
            debug!(domain = %domain, "Hosts file already up to date");
            return Ok(());
        };

        match self.hosts.write(&updated).await {
            Ok(()) => {
                info!(domain = %domain, action = edit.action(), "Hosts file updated");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                warn!(
                    path = %self.hosts.path().display(),
                    "Hosts file not writable, trying elevated helper"
                );
                self.elevated_write(&updated, &domain, edit).await
            }
            Err(e) => Err(DevNestError::site(site, e)),
        }
    }

    async fn elevated_write(&self, content: &str, domain: &str, edit: HostsEdit) -> DevNestResult<()> {
        let privilege_error = || DevNestError::PrivilegeRequired {
            action: edit.action(),
            entry: hosts_entry(domain),
        };

        let staged = std::env::temp_dir().join(format!("devnest-hosts-{}", uuid::Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&staged, content).await {
            warn!(error = %e, "Failed to stage hosts file");
            return Err(privilege_error());
        }

        let elevation = Arc::clone(&self.elevation);
        let dest = self.hosts.path().to_path_buf();
        let source = staged.clone();
        let result = tokio::task::spawn_blocking(move || elevation.replace_file(&source, &dest)).await;

        if let Err(e) = tokio::fs::remove_file(&staged).await {
            debug!(error = %e, "Failed to remove staged hosts file");
        }

        match result {
            Ok(Ok(())) => {
                info!(domain = domain, action = edit.action(), "Hosts file updated with elevation");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Elevated hosts update failed");
                Err(privilege_error())
            }
            Err(e) => {
                warn!(error = %e, "Elevation task failed");
                Err(privilege_error())
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum HostsEdit {
    Add,
    Remove,
}

impl HostsEdit {
    fn action(self) -> &'static str {
        match self {
            HostsEdit::Add => "Add",
            HostsEdit::Remove => "Remove",
        }
    }
}
