//! Apache service descriptor.

use std::path::PathBuf;

use serde_json::json;

use crate::ini::IniSection;
use crate::paths::{ExecutionMode, PathResolver};
use crate::settings::SettingsModel;
use crate::vhost;

use super::traits::{Artifact, GenerationContext, LaunchContext, LaunchPlan, ServiceDescriptor};
use super::types::ServiceType;

/// Template for the main server configuration.
pub const HTTPD_TEMPLATE: &str = "apache/httpd.conf.tera";

/// Server name used under `etc/`.
pub const SERVER_DIR: &str = "apache2";

/// Apache HTTP Server.
pub struct ApacheService;

impl ApacheService {
    /// Effective document root: the configured one, or `<root>/www`.
    pub fn document_root(settings: &SettingsModel, paths: &PathResolver) -> PathBuf {
        if settings.apache.document_root.is_empty() {
            paths.www()
        } else {
            PathBuf::from(&settings.apache.document_root)
        }
    }
}

impl ServiceDescriptor for ApacheService {
    fn service_type(&self) -> ServiceType {
        ServiceType::Apache
    }

    fn display_name(&self) -> &'static str {
        "Apache HTTP Server"
    }

    fn default_port(&self) -> Option<u16> {
        Some(80)
    }

    fn default_auto_start(&self) -> bool {
        true
    }

    fn port_key(&self) -> &'static str {
        "ListenPort"
    }

    fn executable(&self, mode: ExecutionMode) -> &'static str {
        match mode {
            ExecutionMode::Native => "httpd.exe",
            ExecutionMode::Wsl => "httpd",
        }
    }

    fn launch(&self, ctx: &LaunchContext<'_>) -> LaunchPlan {
        let bin = ctx.install_path.join("bin");
        // FOREGROUND keeps httpd attached so exit can be observed.
        LaunchPlan::new(bin.join(self.executable(ctx.mode())), bin)
            .arg("-d")
            .arg(ctx.arg_path(ctx.install_path))
            .arg("-D")
            .arg("FOREGROUND")
    }

    fn read_extra(&self, section: &IniSection, settings: &mut SettingsModel) {
        if let Some(root) = section.get("DocumentRoot") {
            settings.apache.document_root = root.to_string();
        }
    }

    fn write_extra(&self, settings: &SettingsModel, section: &mut IniSection) {
        section.set("DocumentRoot", &settings.apache.document_root);
    }

    fn artifacts(&self, ctx: &GenerationContext<'_>) -> Vec<Artifact> {
        let paths = ctx.paths;
        let settings = ctx.settings;

        let php_path = if settings.php.has_selection() {
            paths.process_path(&paths.install_dir(ServiceType::Php, &settings.php.selected_version))
        } else {
            String::new()
        };

        let context = json!({
            "server_root": paths.process_path(ctx.install_path),
            "log_path": paths.process_path(&paths.logs().join("apache")),
            "listen_port": settings.apache.common.port.unwrap_or(80),
            "document_root": paths.process_path(&Self::document_root(settings, paths)),
            "php_path": php_path,
            "php_port": settings.php.port.unwrap_or(super::php::FASTCGI_PORT),
            "etc_path": paths.process_path(&paths.etc().join(SERVER_DIR)),
        });

        let mut artifacts = vec![
            Artifact::EnsureDir(paths.logs().join("apache")),
            Artifact::Render {
                template: HTTPD_TEMPLATE,
                context,
                dest: ctx.install_path.join("conf").join("httpd.conf"),
            },
            // Stale vhosts for removed sites must not survive a save.
            Artifact::ClearDir(paths.sites_enabled(SERVER_DIR)),
        ];

        for site in ctx.sites {
            artifacts.push(vhost::vhost_artifact(paths, settings, &site.name));
        }

        artifacts
    }
}
