//! Installable service catalog (`services.ini`).
//!
//! ```ini
//! [Apache]
//! has_additional_dir = true
//! httpd-2.4.58.name = 2.4.58
//! httpd-2.4.58.url = https://example.org/httpd-2.4.58-win64.zip
//! httpd-2.4.58.description = Apache 2.4.58 (VS17)
//! ```

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::DevNestResult;
use crate::ini::IniDocument;

use super::types::ServiceType;

/// Section-level flag: archives wrap their payload in one extra directory.
const HAS_ADDITIONAL_DIR_KEY: &str = "has_additional_dir";

/// One installable service package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDefinition {
    /// Version folder name the package installs into.
    pub name: String,
    pub url: String,
    pub description: String,
    pub service_type: ServiceType,
    /// Strip one top-level directory when extracting.
    pub has_additional_nested_dir: bool,
}

/// Parse catalog text into definitions, in file order.
///
/// Sections that do not name a known service type are skipped, as are
/// entries missing either their `.name` or `.url` key.
pub fn parse_catalog(text: &str) -> DevNestResult<Vec<ServiceDefinition>> {
    let doc = IniDocument::parse_named(text, "services.ini")?;
    let mut definitions = Vec::new();

    for section in doc.sections() {
        let service_type = match section.name().parse::<ServiceType>() {
            Ok(ty) => ty,
            Err(_) => {
                debug!(section = section.name(), "Skipping unknown catalog section");
                continue;
            }
        };
        let nested = section.get_bool(HAS_ADDITIONAL_DIR_KEY).unwrap_or(false);

        let mut ids: Vec<&str> = Vec::new();
        for (key, _) in section.entries() {
            if let Some((id, _)) = key.rsplit_once('.') {
                if !ids.iter().any(|seen| seen.eq_ignore_ascii_case(id)) {
                    ids.push(id);
                }
            }
        }

        for id in ids {
            let name = section.get_string(&format!("{}.name", id));
            let url = section.get_string(&format!("{}.url", id));
            match (name, url) {
                (Some(name), Some(url)) => definitions.push(ServiceDefinition {
                    name,
                    url,
                    description: section
                        .get_string(&format!("{}.description", id))
                        .unwrap_or_default(),
                    service_type,
                    has_additional_nested_dir: nested,
                }),
                _ => warn!(
                    section = section.name(),
                    entry = id,
                    "Catalog entry needs both .name and .url"
                ),
            }
        }
    }

    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = "\
[Apache]
has_additional_dir = true
httpd-2.4.58.name = 2.4.58
httpd-2.4.58.url = https://example.org/httpd-2.4.58.zip
httpd-2.4.62.name = 2.4.62
httpd-2.4.62.url = https://example.org/httpd-2.4.62.zip
httpd-2.4.62.description = Latest

[Redis]
redis-7.name = 7.2.4
redis-7.url = https://example.org/redis.zip
broken.name = nothing

[Memcached]
mc.name = 1.6
mc.url = https://example.org/mc.zip
";

    #[test]
    fn test_parse_catalog_entries() {
        let defs = parse_catalog(CATALOG).unwrap();
        assert_eq!(defs.len(), 3);

        assert_eq!(defs[0].name, "2.4.58");
        assert_eq!(defs[0].service_type, ServiceType::Apache);
        assert!(defs[0].has_additional_nested_dir);
        assert_eq!(defs[1].description, "Latest");

        assert_eq!(defs[2].name, "7.2.4");
        assert_eq!(defs[2].service_type, ServiceType::Redis);
        assert!(!defs[2].has_additional_nested_dir);
    }

    #[test]
    fn test_empty_catalog() {
        assert!(parse_catalog("").unwrap().is_empty());
    }
}
