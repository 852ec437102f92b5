//! Service definitions module.
//!
//! Contains the per-type service descriptors, the installable catalog and
//! the registry of installed instances.
//!
//! ## Adding a New Service
//!
//! 1. Add a variant to `ServiceType`
//! 2. Create a new file in this directory implementing `ServiceDescriptor`
//! 3. Return it from `descriptor()`

mod apache;
mod catalog;
mod instance;
mod mongodb;
mod mysql;
mod nginx;
mod node;
mod php;
mod postgresql;
mod redis;
mod registry;
mod traits;
mod types;

pub use apache::{ApacheService, SERVER_DIR as APACHE_SERVER_DIR};
pub use catalog::{parse_catalog, ServiceDefinition};
pub use instance::{instance_key, ServiceInstance, ServiceStatus};
pub use mongodb::MongodbService;
pub use mysql::MysqlService;
pub use nginx::NginxService;
pub use node::NodeService;
pub use php::{PhpService, FASTCGI_PORT};
pub use postgresql::PostgresqlService;
pub use redis::RedisService;
pub use registry::{installed_versions, load_catalog, ServiceRegistry};
pub use traits::{Artifact, GenerationContext, LaunchContext, LaunchPlan, ServiceDescriptor};
pub use types::ServiceType;

/// Template names referenced by descriptors.
pub mod templates {
    pub use super::apache::HTTPD_TEMPLATE;
    pub use super::mongodb::MONGOD_TEMPLATE;
    pub use super::mysql::MY_INI_TEMPLATE;
}

/// Descriptor for a service type.
pub fn descriptor(service_type: ServiceType) -> &'static dyn ServiceDescriptor {
    match service_type {
        ServiceType::Apache => &ApacheService,
        ServiceType::Nginx => &NginxService,
        ServiceType::MySql => &MysqlService,
        ServiceType::PostgreSql => &PostgresqlService,
        ServiceType::MongoDb => &MongodbService,
        ServiceType::Redis => &RedisService,
        ServiceType::Php => &PhpService,
        ServiceType::Node => &NodeService,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_table_is_consistent() {
        for ty in ServiceType::ALL {
            assert_eq!(descriptor(ty).service_type(), ty);
        }
    }

    #[test]
    fn test_native_executables_are_exe() {
        use crate::paths::ExecutionMode;
        for ty in ServiceType::ALL {
            assert!(descriptor(ty)
                .executable(ExecutionMode::Native)
                .ends_with(".exe"));
            assert!(!descriptor(ty).executable(ExecutionMode::Wsl).ends_with(".exe"));
        }
    }
}
