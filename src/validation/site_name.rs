//! Site name validation.
//!
//! A site name becomes a directory under `www`, a DNS label in
//! `<site>.dev`, and part of the generated vhost file name.

use crate::error::{DevNestError, ValidationErrorKind};

/// Maximum length for a DNS label.
const MAX_LABEL_LENGTH: usize = 63;

fn invalid(name: &str, message: impl Into<String>) -> DevNestError {
    DevNestError::Validation {
        kind: ValidationErrorKind::InvalidSiteName {
            name: name.to_string(),
            message: message.into(),
        },
    }
}

/// Validates a site name.
///
/// # Rules
///
/// - Must be 1-63 characters
/// - Must start and end with a letter or number
/// - May contain letters, numbers, dots, hyphens and underscores
/// - No consecutive dots
pub fn validate_site_name(name: &str) -> Result<&str, DevNestError> {
    if name.is_empty() {
        return Err(invalid(name, "Site name cannot be empty"));
    }

    if name.len() > MAX_LABEL_LENGTH {
        return Err(invalid(
            name,
            format!("Site name exceeds maximum length of {} characters", MAX_LABEL_LENGTH),
        ));
    }

    let chars: Vec<char> = name.chars().collect();

    if !chars[0].is_ascii_alphanumeric() {
        return Err(invalid(name, "Site name must start with a letter or number"));
    }

    if !chars[chars.len() - 1].is_ascii_alphanumeric() {
        return Err(invalid(name, "Site name must end with a letter or number"));
    }

    if let Some(c) = chars
        .iter()
        .find(|c| !c.is_ascii_alphanumeric() && !matches!(**c, '-' | '_' | '.'))
    {
        return Err(invalid(
            name,
            format!("Site name contains invalid character '{}'", c),
        ));
    }

    if name.contains("..") {
        return Err(invalid(name, "Site name contains consecutive dots"));
    }

    Ok(name)
}
