//! MongoDB service descriptor.

use std::path::PathBuf;

use serde_json::json;

use crate::ini::IniSection;
use crate::paths::{ExecutionMode, PathResolver};
use crate::settings::SettingsModel;

use super::traits::{Artifact, GenerationContext, LaunchContext, LaunchPlan, ServiceDescriptor};
use super::types::ServiceType;

/// Template for `mongod.cfg`.
pub const MONGOD_TEMPLATE: &str = "mongodb/mongod.cfg.tera";

/// MongoDB document database.
pub struct MongodbService;

impl MongodbService {
    pub fn data_dir(settings: &SettingsModel, paths: &PathResolver) -> PathBuf {
        if settings.mongodb.data_dir.is_empty() {
            paths.data().join("mongodb")
        } else {
            PathBuf::from(&settings.mongodb.data_dir)
        }
    }

    pub fn log_path(settings: &SettingsModel, paths: &PathResolver) -> PathBuf {
        if settings.mongodb.log_path.is_empty() {
            paths.logs().join("mongodb.log")
        } else {
            PathBuf::from(&settings.mongodb.log_path)
        }
    }

    /// Generated config file, next to the binary.
    pub fn config_file(install_path: &std::path::Path) -> PathBuf {
        install_path.join("bin").join("mongod.cfg")
    }
}

impl ServiceDescriptor for MongodbService {
    fn service_type(&self) -> ServiceType {
        ServiceType::MongoDb
    }

    fn display_name(&self) -> &'static str {
        "MongoDB"
    }

    fn default_port(&self) -> Option<u16> {
        Some(27017)
    }

    fn executable(&self, mode: ExecutionMode) -> &'static str {
        match mode {
            ExecutionMode::Native => "mongod.exe",
            ExecutionMode::Wsl => "mongod",
        }
    }

    fn launch(&self, ctx: &LaunchContext<'_>) -> LaunchPlan {
        let bin = ctx.install_path.join("bin");
        let config = Self::config_file(ctx.install_path);
        LaunchPlan::new(bin.join(self.executable(ctx.mode())), bin)
            .arg("--config")
            .arg(ctx.arg_path(&config))
            .require(config)
    }

    fn read_extra(&self, section: &IniSection, settings: &mut SettingsModel) {
        if let Some(dir) = section.get("DataPath") {
            settings.mongodb.data_dir = dir.to_string();
        }
        if let Some(log) = section.get("LogPath") {
            settings.mongodb.log_path = log.to_string();
        }
    }

    fn write_extra(&self, settings: &SettingsModel, section: &mut IniSection) {
        section.set("DataPath", &settings.mongodb.data_dir);
        section.set("LogPath", &settings.mongodb.log_path);
    }

    fn artifacts(&self, ctx: &GenerationContext<'_>) -> Vec<Artifact> {
        let data_dir = Self::data_dir(ctx.settings, ctx.paths);
        let log_path = Self::log_path(ctx.settings, ctx.paths);

        let context = json!({
            "data_dir": ctx.paths.process_path(&data_dir),
            "log_path": ctx.paths.process_path(&log_path),
            "port": ctx.settings.mongodb.common.port.unwrap_or(27017),
        });

        let mut artifacts = vec![Artifact::EnsureDir(data_dir)];
        if let Some(log_dir) = log_path.parent() {
            artifacts.push(Artifact::EnsureDir(log_dir.to_path_buf()));
        }
        artifacts.push(Artifact::Render {
            template: MONGOD_TEMPLATE,
            context,
            dest: Self::config_file(ctx.install_path),
        });
        artifacts
    }
}
