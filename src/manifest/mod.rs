//! Bundle manifest: the textual metadata header
//!
//! A manifest is a main attribute block followed by blank-line-separated
//! per-entry sections, each opened by a `Name:` key. Attribute names are
//! case-insensitive; values on continuation lines (leading space) append
//! to the previous value.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Canonical location of the manifest inside a bundle
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Main attribute marking a bundle as carrying version overlays
pub const MULTI_RELEASE_ATTR: &str = "Multi-Release";

/// Per-entry digest attribute consumed by the digest verifier
pub const SHA256_DIGEST_ATTR: &str = "SHA-256-Digest";

/// Errors from manifest parsing
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("malformed manifest at line {line_no}: {reason}")]
    Malformed { line_no: usize, reason: String },
}

/// One attribute block: ordered name/value pairs with case-insensitive lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an attribute, preserving first-seen order
    pub fn put(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate attributes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

/// The bundle's single metadata header
///
/// Exactly one manifest is selected per bundle; it is immutable after
/// construction and shared read-only with the trust verifier.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Manifest {
    main: Attributes,
    sections: Vec<(String, Attributes)>,
}

impl Manifest {
    /// Empty manifest, used as the fallback when no root carries one
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse manifest text
    ///
    /// The first block is the main attribute block. Subsequent blocks must
    /// open with a `Name:` attribute naming the entry they describe.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let mut manifest = Manifest::new();
        let mut current: Option<(Option<String>, Attributes)> = Some((None, Attributes::new()));
        let mut last_key: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_end_matches('\r');

            if line.is_empty() {
                if let Some(block) = current.take() {
                    manifest.push_block(block, line_no)?;
                }
                last_key = None;
                continue;
            }

            if let Some(rest) = line.strip_prefix(' ') {
                // Continuation of the previous value
                let block = current.get_or_insert_with(|| (None, Attributes::new()));
                let key = last_key.as_deref().ok_or(ManifestError::Malformed {
                    line_no,
                    reason: "continuation line without a preceding attribute".to_string(),
                })?;
                let joined = format!("{}{}", block.1.get(key).unwrap_or(""), rest);
                block.1.put(key, joined);
                continue;
            }

            let (key, value) = line.split_once(':').ok_or_else(|| ManifestError::Malformed {
                line_no,
                reason: format!("expected 'Key: Value', got {:?}", line),
            })?;
            let key = key.trim();
            let value = value.trim_start();
            if key.is_empty() {
                return Err(ManifestError::Malformed {
                    line_no,
                    reason: "empty attribute name".to_string(),
                });
            }

            let block = current.get_or_insert_with(|| (None, Attributes::new()));
            if key.eq_ignore_ascii_case("Name") && block.0.is_none() && block.1.is_empty() {
                block.0 = Some(value.to_string());
            } else {
                block.1.put(key, value);
            }
            last_key = Some(key.to_string());
        }

        if let Some(block) = current.take() {
            manifest.push_block(block, text.lines().count())?;
        }
        Ok(manifest)
    }

    fn push_block(
        &mut self,
        (name, attrs): (Option<String>, Attributes),
        line_no: usize,
    ) -> Result<(), ManifestError> {
        match name {
            Some(name) => self.sections.push((name, attrs)),
            None if self.main.is_empty() && self.sections.is_empty() => self.main = attrs,
            None if attrs.is_empty() => {}
            None => {
                return Err(ManifestError::Malformed {
                    line_no,
                    reason: "entry section without a Name attribute".to_string(),
                })
            }
        }
        Ok(())
    }

    /// The main attribute block
    pub fn main_attributes(&self) -> &Attributes {
        &self.main
    }

    /// Mutable main attributes, for callers assembling a default manifest
    pub fn main_attributes_mut(&mut self) -> &mut Attributes {
        &mut self.main
    }

    /// Per-entry attribute block, if one was declared for `name`
    pub fn attributes_for(&self, name: &str) -> Option<&Attributes> {
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, attrs)| attrs)
    }

    /// Add or replace a per-entry section
    pub fn put_section(&mut self, name: impl Into<String>, attrs: Attributes) {
        let name = name.into();
        match self.sections.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = attrs,
            None => self.sections.push((name, attrs)),
        }
    }

    /// True iff the main attributes declare the bundle multi-release
    pub fn is_multi_release(&self) -> bool {
        self.main
            .get(MULTI_RELEASE_ATTR)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Per-entry digest attributes, keyed by entry name
    ///
    /// Convenience view used by tests and diagnostics; the verifier itself
    /// reads sections directly.
    pub fn digests(&self) -> HashMap<&str, &str> {
        self.sections
            .iter()
            .filter_map(|(name, attrs)| {
                attrs.get(SHA256_DIGEST_ATTR).map(|d| (name.as_str(), d))
            })
            .collect()
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in self.main.iter() {
            writeln!(f, "{}: {}", k, v)?;
        }
        for (name, attrs) in &self.sections {
            writeln!(f)?;
            writeln!(f, "Name: {}", name)?;
            for (k, v) in attrs.iter() {
                writeln!(f, "{}: {}", k, v)?;
            }
        }
        Ok(())
    }
}
