//! PostgreSQL service descriptor.

use std::path::{Path, PathBuf};

use crate::paths::{ExecutionMode, PathResolver};

use super::traits::{LaunchContext, LaunchPlan, ServiceDescriptor};
use super::types::ServiceType;

/// PostgreSQL database service.
pub struct PostgresqlService;

impl PostgresqlService {
    /// Cluster directory for one installed version.
    pub fn data_dir(paths: &PathResolver, install_path: &Path) -> PathBuf {
        let version = install_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        paths.data().join("postgresql").join(version)
    }
}

impl ServiceDescriptor for PostgresqlService {
    fn service_type(&self) -> ServiceType {
        ServiceType::PostgreSql
    }

    fn display_name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn default_port(&self) -> Option<u16> {
        Some(5432)
    }

    fn executable(&self, mode: ExecutionMode) -> &'static str {
        match mode {
            ExecutionMode::Native => "postgres.exe",
            ExecutionMode::Wsl => "postgres",
        }
    }

    fn launch(&self, ctx: &LaunchContext<'_>) -> LaunchPlan {
        let bin = ctx.install_path.join("bin");
        let plan = LaunchPlan::new(bin.join(self.executable(ctx.mode())), bin);

        // Without an initialised cluster postgres falls back to PGDATA.
        let data_dir = Self::data_dir(ctx.paths, ctx.install_path);
        if data_dir.is_dir() {
            plan.arg("-D").arg(ctx.arg_path(&data_dir))
        } else {
            plan
        }
    }
}
