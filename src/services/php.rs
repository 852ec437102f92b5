//! PHP (FastCGI) service descriptor.

use crate::paths::ExecutionMode;

use super::traits::{Artifact, GenerationContext, LaunchContext, LaunchPlan, ServiceDescriptor};
use super::types::ServiceType;

/// Port php-cgi binds its FastCGI listener to unless configured otherwise.
pub const FASTCGI_PORT: u16 = 9000;

/// PHP running as a FastCGI server.
///
/// Supports multiple installed versions; the web servers proxy to whichever
/// is selected.
pub struct PhpService;

impl ServiceDescriptor for PhpService {
    fn service_type(&self) -> ServiceType {
        ServiceType::Php
    }

    fn display_name(&self) -> &'static str {
        "PHP FastCGI"
    }

    fn default_port(&self) -> Option<u16> {
        Some(FASTCGI_PORT)
    }

    fn default_auto_start(&self) -> bool {
        true
    }

    fn executable(&self, mode: ExecutionMode) -> &'static str {
        match mode {
            ExecutionMode::Native => "php-cgi.exe",
            ExecutionMode::Wsl => "php-cgi",
        }
    }

    fn launch(&self, ctx: &LaunchContext<'_>) -> LaunchPlan {
        let root = ctx.install_path.to_path_buf();
        let port = ctx.settings.php.port.unwrap_or(FASTCGI_PORT);
        LaunchPlan::new(root.join(self.executable(ctx.mode())), root)
            .arg("-b")
            .arg(format!("127.0.0.1:{}", port))
    }

    fn artifacts(&self, ctx: &GenerationContext<'_>) -> Vec<Artifact> {
        vec![Artifact::CopyIfMissing {
            from: ctx.install_path.join("php.ini-development"),
            to: ctx.install_path.join("php.ini"),
        }]
    }
}
