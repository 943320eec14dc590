//! Version overlays for multi-release bundles
//!
//! A multi-release bundle mirrors parts of its layout under
//! `META-INF/versions/{N}/`. At construction the resolver picks, for every
//! overlaid path, the highest version strictly below the running feature
//! version; lookups for that path then redirect into the chosen subtree.

use std::collections::HashMap;
use std::io;

use thiserror::Error;

use crate::vfs::{normalize, BundleFs};

/// Reserved sub-namespace holding version overlays
pub const VERSIONS_DIR: &str = "META-INF/versions";

/// Errors from overlay resolution
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("i/o error while scanning version overlays: {0}")]
    Io(#[from] io::Error),

    #[error("version directory {name:?} is not a decimal integer")]
    BadVersionDirectory { name: String },
}

/// Immutable map from canonical path to the selected overlay version
///
/// Empty for bundles that are not multi-release; every lookup then falls
/// through to the un-overlaid path.
#[derive(Debug, Default)]
pub struct VersionOverlay {
    selected: HashMap<String, u32>,
}

impl VersionOverlay {
    /// The empty overlay
    pub fn empty() -> Self {
        Self::default()
    }

    /// Scan the versions directory and select applicable overlays
    ///
    /// Every regular file under `META-INF/versions/{N}/...` contributes a
    /// candidate `(canonical path, N)` pair. Candidates at or above
    /// `feature_version` are not applicable and never considered; per
    /// canonical path the maximum applicable N wins. A path overlaid only
    /// for future versions ends up with no overlay at all.
    pub fn resolve(fs: &dyn BundleFs, feature_version: u32) -> Result<Self, OverlayError> {
        let mut best: HashMap<String, u32> = HashMap::new();
        for rel in fs.walk(VERSIONS_DIR)? {
            let sub = rel
                .strip_prefix(VERSIONS_DIR)
                .and_then(|s| s.strip_prefix('/'))
                .unwrap_or(&rel);
            let Some((version_dir, canonical)) = sub.split_once('/') else {
                // A stray file directly under the versions directory
                // overlays nothing
                continue;
            };
            let version: u32 =
                version_dir
                    .parse()
                    .map_err(|_| OverlayError::BadVersionDirectory {
                        name: version_dir.to_string(),
                    })?;
            if version >= feature_version {
                continue;
            }
            let slot = best.entry(canonical.to_string()).or_insert(version);
            if version > *slot {
                *slot = version;
            }
        }
        Ok(Self { selected: best })
    }

    /// Selected version for a canonical path, if overlaid
    pub fn get(&self, path: &str) -> Option<u32> {
        self.selected.get(&normalize(path)).copied()
    }

    /// Redirected path under the versions directory, if overlaid
    pub fn redirect(&self, path: &str) -> Option<String> {
        let canonical = normalize(path);
        self.selected
            .get(&canonical)
            .map(|version| format!("{}/{}/{}", VERSIONS_DIR, version, canonical))
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }
}
