//! MySQL service descriptor.

use serde_json::json;

use crate::paths::ExecutionMode;

use super::traits::{Artifact, GenerationContext, LaunchContext, LaunchPlan, ServiceDescriptor};
use super::types::ServiceType;

/// Template for `my.ini`.
pub const MY_INI_TEMPLATE: &str = "mysql/my.ini.tera";

/// MySQL database service.
///
/// This covers both MySQL and MariaDB installations.
pub struct MysqlService;

impl ServiceDescriptor for MysqlService {
    fn service_type(&self) -> ServiceType {
        ServiceType::MySql
    }

    fn display_name(&self) -> &'static str {
        "MySQL"
    }

    fn default_port(&self) -> Option<u16> {
        Some(3306)
    }

    fn default_auto_start(&self) -> bool {
        true
    }

    fn executable(&self, mode: ExecutionMode) -> &'static str {
        match mode {
            ExecutionMode::Native => "mysqld.exe",
            ExecutionMode::Wsl => "mysqld",
        }
    }

    fn launch(&self, ctx: &LaunchContext<'_>) -> LaunchPlan {
        let bin = ctx.install_path.join("bin");
        LaunchPlan::new(bin.join(self.executable(ctx.mode())), bin).arg("--console")
    }

    fn artifacts(&self, ctx: &GenerationContext<'_>) -> Vec<Artifact> {
        let paths = ctx.paths;
        let version = &ctx.settings.mysql.selected_version;
        let data_dir = paths.data().join("mysql").join(version);

        let context = json!({
            "base_dir": paths.process_path(ctx.install_path),
            "data_dir": paths.process_path(&data_dir),
            "port": ctx.settings.mysql.port.unwrap_or(3306),
            "log_path": paths.process_path(&paths.logs().join("mysql.log")),
        });

        vec![
            Artifact::EnsureDir(data_dir),
            Artifact::Render {
                template: MY_INI_TEMPLATE,
                context,
                dest: ctx.install_path.join("my.ini"),
            },
        ]
    }
}
