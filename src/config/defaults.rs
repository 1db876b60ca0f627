//! Built-in defaults (layer 1)
//!
//! Hardcoded defaults for every verification setting.

use serde::{Deserialize, Serialize};

/// Class-file attributes that carry no semantics for equivalence: debug
/// tables and source provenance. Stack-map frames are kept.
pub const DEFAULT_STRIPPED_ATTRIBUTES: &[&str] = &[
    "SourceFile",
    "SourceDebugExtension",
    "LineNumberTable",
    "LocalVariableTable",
    "LocalVariableTypeTable",
    "MethodParameters",
];

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Attributes dropped before canonicalization
    pub strip_attributes: Vec<String>,

    /// Sort fields and methods by (name, descriptor) (default: true)
    pub sort_members: bool,

    /// Output location prefix of binary artifacts (default: "CLASS_OUTPUT")
    pub binary_location: String,

    /// Location prefix that replaces it for source lookups (default: "SOURCE_OUTPUT")
    pub source_location: String,

    /// Suffix removed from binary names (default: ".class")
    pub binary_suffix: String,

    /// Suffix appended to origin candidates (default: ".java")
    pub source_suffix: String,

    /// Separators between nested type names (default: ["$"])
    pub nested_separators: Vec<String>,

    /// Unchanged lines shown around each diff hunk (default: 3)
    pub context_lines: usize,

    /// Above this many LCS cells the diff degrades to first divergence
    pub max_diff_cells: usize,

    /// Embed the origin source in mismatch reports (default: true)
    pub include_source: bool,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            strip_attributes: DEFAULT_STRIPPED_ATTRIBUTES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sort_members: true,
            binary_location: "CLASS_OUTPUT".to_string(),
            source_location: "SOURCE_OUTPUT".to_string(),
            binary_suffix: ".class".to_string(),
            source_suffix: ".java".to_string(),
            nested_separators: vec!["$".to_string()],
            context_lines: 3,
            max_diff_cells: 4_000_000,
            include_source: true,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "normalize": {
                "strip_attributes": self.strip_attributes,
                "sort_members": self.sort_members
            },
            "sources": {
                "binary_location": self.binary_location,
                "source_location": self.source_location,
                "binary_suffix": self.binary_suffix,
                "source_suffix": self.source_suffix,
                "nested_separators": self.nested_separators
            },
            "report": {
                "context_lines": self.context_lines,
                "max_diff_cells": self.max_diff_cells,
                "include_source": self.include_source
            }
        })
    }
}
