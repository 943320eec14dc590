//! Declared service providers
//!
//! Providers are declared as files under `META-INF/services/`: the file name
//! is the service, each non-comment line names one implementation.

use serde::Serialize;

use crate::vfs::PathFilter;

/// Reserved sub-namespace holding provider declarations
pub const SERVICES_DIR: &str = "META-INF/services";

/// One declared service with its implementations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provider {
    pub service: String,
    pub providers: Vec<String>,
}

impl Provider {
    /// Parse one declaration file
    ///
    /// Lines are trimmed; blank lines and `#` comments are skipped. When a
    /// path filter is supplied, implementations whose dotted name maps to an
    /// excluded path are dropped.
    pub fn from_lines(
        service: impl Into<String>,
        contents: &str,
        filter: Option<&PathFilter>,
    ) -> Self {
        let providers = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter(|line| match filter {
                Some(f) => f(&line.replace('.', "/")),
                None => true,
            })
            .map(str::to_string)
            .collect();
        Self {
            service: service.into(),
            providers,
        }
    }
}
