//! Service type enumeration.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{DevNestError, ValidationErrorKind};

/// Dev-stack component a settings block or instance belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ServiceType {
    Apache,
    Nginx,
    MySql,
    PostgreSql,
    MongoDb,
    Redis,
    Php,
    Node,
}

impl ServiceType {
    pub const ALL: [ServiceType; 8] = [
        ServiceType::Apache,
        ServiceType::Nginx,
        ServiceType::MySql,
        ServiceType::PostgreSql,
        ServiceType::MongoDb,
        ServiceType::Redis,
        ServiceType::Php,
        ServiceType::Node,
    ];

    /// Canonical spelling, used for directory names and INI sections.
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceType::Apache => "Apache",
            ServiceType::Nginx => "Nginx",
            ServiceType::MySql => "MySQL",
            ServiceType::PostgreSql => "PostgreSQL",
            ServiceType::MongoDb => "MongoDB",
            ServiceType::Redis => "Redis",
            ServiceType::Php => "PHP",
            ServiceType::Node => "Node",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = DevNestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let ty = match lowered.as_str() {
            "apache" | "httpd" => ServiceType::Apache,
            "nginx" => ServiceType::Nginx,
            "mysql" | "mariadb" => ServiceType::MySql,
            "postgresql" | "postgres" => ServiceType::PostgreSql,
            "mongodb" | "mongo" => ServiceType::MongoDb,
            "redis" => ServiceType::Redis,
            "php" => ServiceType::Php,
            "node" | "nodejs" => ServiceType::Node,
            _ => {
                return Err(DevNestError::Validation {
                    kind: ValidationErrorKind::UnknownServiceType {
                        name: s.to_string(),
                    },
                })
            }
        };
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("APACHE".parse::<ServiceType>().unwrap(), ServiceType::Apache);
        assert_eq!("mysql".parse::<ServiceType>().unwrap(), ServiceType::MySql);
        assert_eq!("Postgres".parse::<ServiceType>().unwrap(), ServiceType::PostgreSql);
    }

    #[test]
    fn test_display_round_trips() {
        for ty in ServiceType::ALL {
            assert_eq!(ty.to_string().parse::<ServiceType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_unknown_type() {
        assert!("memcached".parse::<ServiceType>().is_err());
    }
}
