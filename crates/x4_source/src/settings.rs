//! Resolver settings.
//!
//! Settings are passed explicitly to each [`Location`](crate::Location) so that
//! resolution order is fixed per instance. They can be loaded from a TOML file:
//!
//! ```toml
//! prefer_loose_files = true
//! log_source_paths = false
//! allow_cat_md5_errors = false
//! ```

use crate::error::Result;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};

/// Options controlling how a location resolves reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Try loose files before catalog entries.
    pub prefer_loose_files: bool,
    /// Log every resolved read at info level instead of debug.
    pub log_source_paths: bool,
    /// Downgrade catalog MD5 mismatches to warnings for every read.
    pub allow_cat_md5_errors: bool,
}

impl ResolverSettings {
    /// Parse settings from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load settings from a TOML file, falling back to defaults if the file
    /// does not exist.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        if !path.as_std_path().exists() {
            tracing::debug!("No settings file at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path.as_std_path())?;
        Self::from_toml_str(&content)
    }
}
