//! Tera template engine wrapper.
//!
//! Provides template loading, rendering, and management.

use std::path::Path;
use std::sync::Arc;

use tera::{Context, Tera};
use tracing::{debug, info};

use crate::error::DevNestError;

use super::builtin::BUILTIN_TEMPLATES;

/// Template engine for rendering configuration files.
///
/// Wraps Tera and provides a simplified interface for template operations.
#[derive(Clone)]
pub struct TemplateEngine {
    tera: Arc<Tera>,
}

impl TemplateEngine {
    /// Create a new template engine, loading templates from the specified directory.
    ///
    /// Templates are loaded recursively from the directory with `.tera`
    /// extension. Built-in templates fill in any name the directory does not
    /// provide, so a missing directory still yields a usable engine.
    pub fn new(template_dir: &Path) -> Result<Self, DevNestError> {
        let mut tera = if template_dir.is_dir() {
            let pattern = template_dir.join("**/*.tera");
            let pattern_str = pattern.to_string_lossy();

            debug!(pattern = %pattern_str, "Loading templates");

            Tera::new(&pattern_str).map_err(|e| DevNestError::Template {
                message: format!(
                    "Failed to load templates from '{}': {}",
                    template_dir.display(),
                    e
                ),
            })?
        } else {
            debug!(directory = %template_dir.display(), "Template directory missing, using built-ins");
            Tera::default()
        };

        add_builtins(&mut tera)?;

        let template_count = tera.get_template_names().count();
        info!(
            directory = %template_dir.display(),
            count = template_count,
            "Template engine initialized"
        );

        Ok(Self {
            tera: Arc::new(tera),
        })
    }

    /// Create a template engine holding only the built-in templates.
    pub fn builtin() -> Result<Self, DevNestError> {
        let mut tera = Tera::default();
        add_builtins(&mut tera)?;
        Ok(Self {
            tera: Arc::new(tera),
        })
    }

    /// Create a template engine with no templates (for testing).
    pub fn empty() -> Self {
        Self {
            tera: Arc::new(Tera::default()),
        }
    }

    /// Render a template with the given context.
    ///
    /// # Arguments
    ///
    /// * `template_name` - Name of the template (e.g., "apache/vhost.conf.tera")
    /// * `context` - JSON value containing template variables
    ///
    /// # Returns
    ///
    /// The rendered template content as a string.
    pub fn render(
        &self,
        template_name: &str,
        context: &serde_json::Value,
    ) -> Result<String, DevNestError> {
        let tera_context = Context::from_serialize(context).map_err(|e| DevNestError::Template {
            message: format!("Invalid template context: {}", e),
        })?;

        self.tera
            .render(template_name, &tera_context)
            .map_err(|e| DevNestError::Template {
                message: format!("Failed to render template '{}': {}", template_name, e),
            })
    }

    /// Check if a template exists.
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Get the number of loaded templates.
    pub fn template_count(&self) -> usize {
        self.tera.get_template_names().count()
    }
}

fn add_builtins(tera: &mut Tera) -> Result<(), DevNestError> {
    let missing: Vec<(&str, &str)> = BUILTIN_TEMPLATES
        .iter()
        .filter(|(name, _)| !tera.get_template_names().any(|n| n == *name))
        .copied()
        .collect();

    tera.add_raw_templates(missing)
        .map_err(|e| DevNestError::Template {
            message: format!("Failed to register built-in templates: {}", e),
        })
}
