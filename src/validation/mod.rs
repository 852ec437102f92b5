//! Input validation module.
//!
//! Provides validators for names that end up in file names and host names.

mod site_name;

pub use site_name::validate_site_name;
