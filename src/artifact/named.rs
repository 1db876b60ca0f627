//! A single named artifact: one generated class, one source file, ...

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Whether an artifact is text source or an opaque binary container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Source,
    Binary,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Source => write!(f, "source"),
            ArtifactKind::Binary => write!(f, "binary"),
        }
    }
}

/// A named blob handed to the engine by a generator or fixture loader.
///
/// Immutable once built; the engine only derives views of the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedArtifact {
    name: String,
    kind: ArtifactKind,
    content: Vec<u8>,
}

impl NamedArtifact {
    pub fn new(name: impl Into<String>, kind: ArtifactKind, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            kind,
            content: content.into(),
        }
    }

    pub fn source(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, ArtifactKind::Source, text.into().into_bytes())
    }

    pub fn binary(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self::new(name, ArtifactKind::Binary, content)
    }

    /// Hierarchical name, `/`- or `.`-delimited (e.g. `com/example/Foo$Bar.class`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Content as UTF-8, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }

    /// Hex SHA-256 of the raw content.
    pub fn content_sha256(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.content);
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_constructor() {
        let a = NamedArtifact::source("com/example/Foo.java", "class Foo {}");
        assert_eq!(a.kind(), ArtifactKind::Source);
        assert_eq!(a.text(), Some("class Foo {}"));
        assert_eq!(a.len(), 12);
    }

    #[test]
    fn test_binary_text_view_rejects_invalid_utf8() {
        let a = NamedArtifact::binary("Foo.class", vec![0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(a.text(), None);
    }

    #[test]
    fn test_content_sha256() {
        let a = NamedArtifact::binary("empty", Vec::new());
        assert_eq!(
            a.content_sha256(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ArtifactKind::Binary).unwrap(),
            "\"binary\""
        );
    }
}
