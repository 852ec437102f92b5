//! Nginx service descriptor.

use crate::paths::ExecutionMode;

use super::traits::{LaunchContext, LaunchPlan, ServiceDescriptor};
use super::types::ServiceType;

/// Nginx web server.
pub struct NginxService;

impl ServiceDescriptor for NginxService {
    fn service_type(&self) -> ServiceType {
        ServiceType::Nginx
    }

    fn display_name(&self) -> &'static str {
        "Nginx Web Server"
    }

    fn default_port(&self) -> Option<u16> {
        Some(80)
    }

    fn executable(&self, mode: ExecutionMode) -> &'static str {
        match mode {
            ExecutionMode::Native => "nginx.exe",
            ExecutionMode::Wsl => "nginx",
        }
    }

    fn launch(&self, ctx: &LaunchContext<'_>) -> LaunchPlan {
        let root = ctx.install_path.to_path_buf();
        LaunchPlan::new(root.join(self.executable(ctx.mode())), root)
            .arg("-g")
            .arg("daemon off;")
    }
}
