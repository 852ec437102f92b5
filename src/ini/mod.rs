//! Minimal INI document codec.
//!
//! Handles the dialect used by the settings and catalog files:
//!
//! - `[Section]` headers
//! - `key = value` or `key=value` pairs
//! - `;` and `#` comment lines, blank lines
//!
//! Section and key lookups are case-insensitive; insertion order is kept
//! when the document is written back out.

use std::fmt;

use crate::error::{DevNestError, DevNestResult};

/// One `[Section]` and its entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniSection {
    name: String,
    entries: Vec<(String, String)>,
}

impl IniSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Non-empty string value.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(parse_bool)
    }

    pub fn get_u16(&self, key: &str) -> Option<u16> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// Insert or replace a value, keeping the original key position.
    pub fn set(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, if value { "True" } else { "False" });
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A parsed INI file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    /// Entries that appear before the first section header.
    root: IniSection,
    sections: Vec<IniSection>,
}

impl IniDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse INI text.
    pub fn parse(text: &str) -> DevNestResult<Self> {
        Self::parse_named(text, "<memory>")
    }

    /// Parse INI text, naming `origin` in error messages.
    pub fn parse_named(text: &str, origin: &str) -> DevNestResult<Self> {
        let mut doc = IniDocument::new();
        let mut current: Option<usize> = None;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim().trim_start_matches('\u{feff}');
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let Some(name) = rest.strip_suffix(']') else {
                    return Err(DevNestError::Ini {
                        path: origin.to_string(),
                        line: index + 1,
                        message: format!("unterminated section header '{}'", line),
                    });
                };
                let name = name.trim();
                current = Some(match doc.position(name) {
                    Some(pos) => pos,
                    None => {
                        doc.sections.push(IniSection::new(name));
                        doc.sections.len() - 1
                    }
                });
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(DevNestError::Ini {
                    path: origin.to_string(),
                    line: index + 1,
                    message: format!("expected 'key = value', found '{}'", line),
                });
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(DevNestError::Ini {
                    path: origin.to_string(),
                    line: index + 1,
                    message: "empty key".to_string(),
                });
            }
            let value = unquote(value.trim());

            let section = match current {
                Some(pos) => &mut doc.sections[pos],
                None => &mut doc.root,
            };
            section.set(key, value);
        }

        Ok(doc)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn root(&self) -> &IniSection {
        &self.root
    }

    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.position(name).map(|pos| &self.sections[pos])
    }

    /// Get a section for writing, creating it at the end if absent.
    pub fn section_mut(&mut self, name: &str) -> &mut IniSection {
        let pos = match self.position(name) {
            Some(pos) => pos,
            None => {
                self.sections.push(IniSection::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[pos]
    }

    /// Replace (or append) a whole section.
    pub fn put_section(&mut self, section: IniSection) {
        match self.position(&section.name) {
            Some(pos) => self.sections[pos] = section,
            None => self.sections.push(section),
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(key))
    }

    pub fn sections(&self) -> impl Iterator<Item = &IniSection> {
        self.sections.iter()
    }
}

impl fmt::Display for IniDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.root.entries() {
            writeln!(f, "{}={}", key, value)?;
        }
        let mut first = self.root.is_empty();
        for section in &self.sections {
            if !first {
                writeln!(f)?;
            }
            first = false;
            writeln!(f, "[{}]", section.name)?;
            for (key, value) in section.entries() {
                writeln!(f, "{}={}", key, value)?;
            }
        }
        Ok(())
    }
}

/// Parse the boolean spellings found in hand-edited INI files.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
