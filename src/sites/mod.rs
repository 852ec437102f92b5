//! Sites under the www root and the site-type catalog (`sites.ini`).
//!
//! Scaffolding new sites is done elsewhere; this module only knows which
//! site directories exist and what site types the catalog offers.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use tracing::warn;

use crate::error::{DevNestError, DevNestResult, ValidationErrorKind};
use crate::fsio;
use crate::ini::IniDocument;
use crate::validation::validate_site_name;

/// Catalog section holding site types.
const SITE_TYPES_SECTION: &str = "SiteTypes";

/// A site directory under the www root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteModel {
    pub name: String,
    pub path: PathBuf,
}

impl SiteModel {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

/// How a site type is scaffolded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum InstallType {
    #[default]
    None,
    Command,
    Clone,
    Download,
}

impl FromStr for InstallType {
    type Err = DevNestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(InstallType::None),
            "command" => Ok(InstallType::Command),
            "clone" => Ok(InstallType::Clone),
            "download" => Ok(InstallType::Download),
            other => Err(DevNestError::Validation {
                kind: ValidationErrorKind::InvalidParameter {
                    param: "InstallType".to_string(),
                    message: format!("unknown install type '{}'", other),
                },
            }),
        }
    }
}

/// A site type offered by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteDefinition {
    pub id: String,
    pub name: String,
    pub install_type: InstallType,
    pub install_url: String,
    pub install_command: String,
    pub has_additional_dir: bool,
}

/// Parse the `[SiteTypes]` section of `sites.ini`.
///
/// ```ini
/// [SiteTypes]
/// laravel.Name = Laravel
/// laravel.InstallType = command
/// laravel.InstallCommand = composer create-project laravel/laravel %s
/// ```
pub fn parse_site_catalog(text: &str) -> DevNestResult<Vec<SiteDefinition>> {
    let doc = IniDocument::parse_named(text, "sites.ini")?;
    let Some(section) = doc.section(SITE_TYPES_SECTION) else {
        return Ok(Vec::new());
    };

    let mut ids: Vec<&str> = Vec::new();
    for (key, _) in section.entries() {
        if let Some((id, _)) = key.split_once('.') {
            if !ids.iter().any(|seen| seen.eq_ignore_ascii_case(id)) {
                ids.push(id);
            }
        }
    }

    let mut definitions = Vec::new();
    for id in ids {
        let field = |name: &str| section.get_string(&format!("{}.{}", id, name));
        let install_type = match field("InstallType").map(|t| t.parse::<InstallType>()) {
            Some(Ok(t)) => t,
            Some(Err(e)) => {
                warn!(site_type = id, error = %e, "Skipping site type");
                continue;
            }
            None => InstallType::None,
        };

        definitions.push(SiteDefinition {
            id: id.to_string(),
            name: field("Name").unwrap_or_else(|| id.to_string()),
            install_type,
            install_url: field("InstallUrl").unwrap_or_default(),
            install_command: field("InstallCommand").unwrap_or_default(),
            has_additional_dir: section
                .get_bool(&format!("{}.HasAdditionalDir", id))
                .unwrap_or(false),
        });
    }

    Ok(definitions)
}

/// Site directories under `www`, sorted by name.
///
/// Directories whose names are not usable as host names are skipped.
pub async fn list_sites(www: &Path) -> DevNestResult<Vec<SiteModel>> {
    let names = fsio::list_subdirs(www).await?;
    Ok(names
        .into_iter()
        .filter(|name| validate_site_name(name).is_ok())
        .map(|name| SiteModel::new(name.clone(), www.join(&name)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_site_catalog() {
        let text = "\
[SiteTypes]
blank.Name = Blank
laravel.Name = Laravel
laravel.InstallType = Command
laravel.InstallCommand = composer create-project laravel/laravel .
wordpress.Name = WordPress
wordpress.InstallType = download
wordpress.InstallUrl = https://wordpress.org/latest.zip
wordpress.HasAdditionalDir = true
";
        let defs = parse_site_catalog(text).unwrap();
        assert_eq!(defs.len(), 3);
        assert_eq!(defs[0].install_type, InstallType::None);
        assert_eq!(defs[1].install_type, InstallType::Command);
        assert!(defs[1].install_command.starts_with("composer"));
        assert_eq!(defs[2].install_type, InstallType::Download);
        assert!(defs[2].has_additional_dir);
    }

    #[test]
    fn test_unknown_install_type_skipped() {
        let text = "[SiteTypes]\nodd.Name = Odd\nodd.InstallType = teleport\n";
        assert!(parse_site_catalog(text).unwrap().is_empty());
    }

    #[test]
    fn test_missing_section_is_empty() {
        assert!(parse_site_catalog("[Other]\na=1\n").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_sites_filters_invalid_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("blog")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("index.php"), "<?php").unwrap();

        let sites = list_sites(dir.path()).await.unwrap();
        assert_eq!(sites, vec![SiteModel::new("blog", dir.path().join("blog"))]);
    }
}
