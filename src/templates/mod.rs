//! Template rendering for generated configuration files.

mod builtin;
mod engine;

pub use builtin::BUILTIN_TEMPLATES;
pub use engine::TemplateEngine;
