//! In-memory settings aggregate.

use serde::Serialize;

use crate::services::ServiceType;

/// Global flags shared by every service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneralSettings {
    pub start_with_windows: bool,
    pub minimize_to_tray: bool,
    pub auto_virtual_hosts: bool,
    pub auto_create_database: bool,
    pub use_wsl: bool,
    pub enable_ngrok: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            start_with_windows: false,
            minimize_to_tray: true,
            auto_virtual_hosts: true,
            auto_create_database: false,
            use_wsl: false,
            enable_ngrok: false,
        }
    }
}

/// Settings every service type carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceSettings {
    /// Installed version folder currently in use. May be empty.
    pub selected_version: String,
    pub port: Option<u16>,
    pub auto_start: bool,
    /// Installed versions found under `bin/<Type>`. Recomputed on every load.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available_versions: Vec<String>,
    /// Catalog entries that are not installed yet. Recomputed on every load.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub installable_versions: Vec<String>,
}

impl ServiceSettings {
    pub fn new(port: Option<u16>, auto_start: bool) -> Self {
        Self {
            port,
            auto_start,
            ..Self::default()
        }
    }

    pub fn has_selection(&self) -> bool {
        !self.selected_version.is_empty()
    }

    /// Case-insensitive match against the selected version.
    pub fn is_selected(&self, version: &str) -> bool {
        self.has_selection() && self.selected_version.eq_ignore_ascii_case(version)
    }
}

/// Apache-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApacheSettings {
    #[serde(flatten)]
    pub common: ServiceSettings,
    /// Document root served by the default host. Empty means `<root>/www`.
    pub document_root: String,
}

/// MongoDB-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MongoDbSettings {
    #[serde(flatten)]
    pub common: ServiceSettings,
    /// Database directory. Empty means `<root>/data/mongodb`.
    pub data_dir: String,
    /// Log file. Empty means `<root>/logs/mongodb.log`.
    pub log_path: String,
}

/// The whole settings aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsModel {
    pub general: GeneralSettings,
    pub apache: ApacheSettings,
    pub nginx: ServiceSettings,
    pub mysql: ServiceSettings,
    pub postgresql: ServiceSettings,
    pub mongodb: MongoDbSettings,
    pub redis: ServiceSettings,
    pub php: ServiceSettings,
    pub node: ServiceSettings,
}

impl Default for SettingsModel {
    fn default() -> Self {
        let mut model = Self {
            general: GeneralSettings::default(),
            apache: ApacheSettings::default(),
            nginx: ServiceSettings::default(),
            mysql: ServiceSettings::default(),
            postgresql: ServiceSettings::default(),
            mongodb: MongoDbSettings::default(),
            redis: ServiceSettings::default(),
            php: ServiceSettings::default(),
            node: ServiceSettings::default(),
        };
        for ty in ServiceType::ALL {
            let descriptor = crate::services::descriptor(ty);
            *model.service_mut(ty) =
                ServiceSettings::new(descriptor.default_port(), descriptor.default_auto_start());
        }
        model
    }
}

impl SettingsModel {
    pub fn service(&self, ty: ServiceType) -> &ServiceSettings {
        match ty {
            ServiceType::Apache => &self.apache.common,
            ServiceType::Nginx => &self.nginx,
            ServiceType::MySql => &self.mysql,
            ServiceType::PostgreSql => &self.postgresql,
            ServiceType::MongoDb => &self.mongodb.common,
            ServiceType::Redis => &self.redis,
            ServiceType::Php => &self.php,
            ServiceType::Node => &self.node,
        }
    }

    pub fn service_mut(&mut self, ty: ServiceType) -> &mut ServiceSettings {
        match ty {
            ServiceType::Apache => &mut self.apache.common,
            ServiceType::Nginx => &mut self.nginx,
            ServiceType::MySql => &mut self.mysql,
            ServiceType::PostgreSql => &mut self.postgresql,
            ServiceType::MongoDb => &mut self.mongodb.common,
            ServiceType::Redis => &mut self.redis,
            ServiceType::Php => &mut self.php,
            ServiceType::Node => &mut self.node,
        }
    }

    pub fn selected_version(&self, ty: ServiceType) -> &str {
        &self.service(ty).selected_version
    }

    /// Copy of the model with the disk-derived version lists removed.
    pub fn without_transient(&self) -> Self {
        let mut model = self.clone();
        for ty in ServiceType::ALL {
            let service = model.service_mut(ty);
            service.available_versions.clear();
            service.installable_versions.clear();
        }
        model
    }
}
