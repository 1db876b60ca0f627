//! Configuration
//!
//! Three layers merged in order:
//! 1. Built-in defaults
//! 2. Project config file (TOML)
//! 3. Programmatic overrides (JSON)

mod defaults;
mod effective;
mod merge;

pub use defaults::{BuiltinDefaults, DEFAULT_STRIPPED_ATTRIBUTES};
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig};
pub use merge::overlay;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::normalize::NormalizeOptions;
use crate::report::ReportOptions;
use crate::resolve::SourceMapping;

/// Typed settings for one verifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    pub normalize: NormalizeOptions,
    pub sources: SourceMapping,
    pub report: ReportOptions,
}

impl VerifyConfig {
    /// Defaults overlaid with a project TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        EffectiveConfig::build(Some(path), None)?.verify_config()
    }

    /// Defaults overlaid with TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let overrides = EffectiveConfig::parse_toml(contents)?;
        EffectiveConfig::build(None, Some(overrides))?.verify_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_str_partial() {
        let config = VerifyConfig::from_toml_str(
            r#"
            [sources]
            source_suffix = ".kt"
            nested_separators = ["$", "_"]

            [report]
            include_source = false
            "#,
        )
        .unwrap();

        assert_eq!(config.sources.source_suffix, ".kt");
        assert_eq!(config.sources.binary_suffix, ".class");
        assert_eq!(config.sources.nested_separators, vec!['$', '_']);
        assert!(!config.report.include_source);
        assert_eq!(config.report.context_lines, 3);
        assert!(config.normalize.sort_members);
    }

    #[test]
    fn test_from_toml_str_rejects_bad_types() {
        let err = VerifyConfig::from_toml_str("[report]\ncontext_lines = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_from_toml_str_rejects_syntax_errors() {
        assert!(VerifyConfig::from_toml_str("[report").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("verify.toml");
        std::fs::write(&path, "[normalize]\nstrip_attributes = []\n").unwrap();

        let config = VerifyConfig::load(&path).unwrap();
        assert!(config.normalize.strip_attributes.is_empty());
    }
}
