//! INI-style document codec shared by systemd-networkd units and
//! NetworkManager keyfiles

use indexmap::IndexMap;

use guest_network_core::error::ConfigError;
use guest_network_core::{NetworkError, Result};

/// Entries of one section, in insertion order. A key may repeat.
pub type IniSection = Vec<(String, String)>;

/// An ordered set of `[Section]` blocks with `Key=Value` entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IniDocument {
    sections: IndexMap<String, IniSection>,
}

/// Represents a line in an INI file
#[derive(Debug, Clone, PartialEq)]
enum IniLine {
    Section(String),
    Entry { key: String, value: String },
    Ignored,
}

impl IniDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key, creating the section on first use. Replaces every
    /// earlier value of the key.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) -> &mut Self {
        let entries = self.sections.entry(section.to_string()).or_default();
        let value = value.into();
        match entries.iter().position(|(name, _)| name == key) {
            Some(first) => {
                entries.retain(|(name, _)| name != key);
                entries.insert(first, (key.to_string(), value));
            }
            None => entries.push((key.to_string(), value)),
        }
        self
    }

    /// Add another value for a key, keeping the earlier ones (`VLAN=` lists)
    pub fn append(&mut self, section: &str, key: &str, value: impl Into<String>) -> &mut Self {
        self.sections
            .entry(section.to_string())
            .or_default()
            .push((key.to_string(), value.into()));
        self
    }

    /// Look a key up; the last assignment wins. Section and key names match
    /// case-insensitively.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.get_all(section, key).last().copied()
    }

    /// Every value of a key, in file order
    pub fn get_all(&self, section: &str, key: &str) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case(section))
            .flat_map(|(_, entries)| entries.iter())
            .filter(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections
            .keys()
            .any(|name| name.eq_ignore_ascii_case(section))
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Parse document content. Comments (`#`, `;`) and blank lines are
    /// dropped; repeated keys keep every value.
    pub fn parse(content: &str) -> Result<Self> {
        let mut document = IniDocument::new();
        let mut current: Option<String> = None;

        for (index, line) in content.lines().enumerate() {
            let line_number = index + 1;
            match Self::parse_line(line, line_number)? {
                IniLine::Section(name) => {
                    document.sections.entry(name.clone()).or_default();
                    current = Some(name);
                }
                IniLine::Entry { key, value } => {
                    let section = current.as_deref().ok_or_else(|| {
                        NetworkError::Configuration(ConfigError::Parse {
                            line: line_number,
                            message: format!("Key '{}' found outside of a section", key),
                        })
                    })?;
                    document.append(section, &key, value);
                }
                IniLine::Ignored => {}
            }
        }

        Ok(document)
    }

    /// Render the document; sections are separated by a blank line
    pub fn render(&self) -> String {
        let mut output = String::new();

        for (i, (name, entries)) in self.sections.iter().enumerate() {
            if i > 0 {
                output.push('\n');
            }
            output.push_str(&format!("[{}]\n", name));
            for (key, value) in entries {
                output.push_str(&format!("{}={}\n", key, value));
            }
        }

        output
    }

    fn parse_line(line: &str, line_number: usize) -> Result<IniLine> {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            return Ok(IniLine::Ignored);
        }

        if let Some(rest) = line.strip_prefix('[') {
            let name = rest.strip_suffix(']').ok_or_else(|| {
                NetworkError::Configuration(ConfigError::Parse {
                    line: line_number,
                    message: format!("Unterminated section header: {}", line),
                })
            })?;
            return Ok(IniLine::Section(name.trim().to_string()));
        }

        match line.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Ok(IniLine::Entry {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            }),
            _ => Err(NetworkError::Configuration(ConfigError::Parse {
                line: line_number,
                message: format!("Unknown line format: {}", line),
            })),
        }
    }
}
