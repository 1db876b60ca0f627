//! Normalizer
//!
//! Reduces an artifact to a canonical text form in which non-semantic
//! metadata (debug tables, pool layout, member order) no longer shows, so
//! equivalence degrades to plain string equality.
//!
//! Binary container formats plug in through [`ArtifactFormat`]. The first
//! registered format that claims an artifact canonicalizes it; the built-in
//! order is `jvm-class`, then `opaque` as the catch-all.

mod class;
mod opaque;

pub use class::JvmClassFormat;
pub use opaque::OpaqueFormat;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::artifact::{ArtifactKind, NamedArtifact};
use crate::config::BuiltinDefaults;

/// Canonical, comparable form of one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalForm {
    /// Id of the format that produced it (`source`, `jvm-class`, `opaque`, ...).
    pub format: &'static str,
    pub text: String,
}

impl CanonicalForm {
    /// Hex SHA-256 of the canonical text.
    pub fn sha256(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// The artifact's content could not be parsed as its declared format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{name} is not a valid {format} artifact: {reason}")]
pub struct MalformedArtifactError {
    pub name: String,
    pub format: &'static str,
    pub reason: String,
}

/// Options shared by every format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    /// Attribute names dropped wherever they appear (class, member, Code, record component).
    pub strip_attributes: Vec<String>,

    /// Order fields and methods by (name, descriptor) instead of file order.
    pub sort_members: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        let defaults = BuiltinDefaults::default();
        Self {
            strip_attributes: defaults.strip_attributes,
            sort_members: defaults.sort_members,
        }
    }
}

impl NormalizeOptions {
    pub fn strips(&self, attribute: &str) -> bool {
        self.strip_attributes.iter().any(|a| a == attribute)
    }
}

/// A binary container format the normalizer can canonicalize.
pub trait ArtifactFormat {
    /// Short stable identifier, recorded in every [`CanonicalForm`].
    fn id(&self) -> &'static str;

    /// Whether this format handles `artifact`.
    fn claims(&self, artifact: &NamedArtifact) -> bool;

    fn canonicalize(
        &self,
        artifact: &NamedArtifact,
        options: &NormalizeOptions,
    ) -> Result<String, MalformedArtifactError>;
}

/// Dispatches artifacts to their format and produces canonical forms.
pub struct Normalizer {
    formats: Vec<Box<dyn ArtifactFormat>>,
    options: NormalizeOptions,
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<_> = self.formats.iter().map(|fmt| fmt.id()).collect();
        f.debug_struct("Normalizer")
            .field("formats", &ids)
            .field("options", &self.options)
            .finish()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizeOptions::default())
    }
}

impl Normalizer {
    /// Normalizer with the built-in formats.
    pub fn new(options: NormalizeOptions) -> Self {
        Self {
            formats: vec![Box::new(JvmClassFormat), Box::new(OpaqueFormat)],
            options,
        }
    }

    /// Register a format ahead of the built-ins.
    pub fn register(&mut self, format: Box<dyn ArtifactFormat>) {
        self.formats.insert(0, format);
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    /// Canonical form of `artifact`.
    pub fn normalize(&self, artifact: &NamedArtifact) -> Result<CanonicalForm, MalformedArtifactError> {
        match artifact.kind() {
            ArtifactKind::Source => {
                let text = artifact.text().ok_or_else(|| MalformedArtifactError {
                    name: artifact.name().to_string(),
                    format: "source",
                    reason: "content is not valid UTF-8".to_string(),
                })?;
                Ok(CanonicalForm {
                    format: "source",
                    text: text.replace("\r\n", "\n"),
                })
            }
            ArtifactKind::Binary => {
                let format = self
                    .formats
                    .iter()
                    .find(|f| f.claims(artifact))
                    .ok_or_else(|| MalformedArtifactError {
                        name: artifact.name().to_string(),
                        format: "binary",
                        reason: "no registered format claims this artifact".to_string(),
                    })?;
                log::debug!("normalizing {} as {}", artifact.name(), format.id());
                let text = format.canonicalize(artifact, &self.options)?;
                Ok(CanonicalForm {
                    format: format.id(),
                    text,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UpperCaseText;

    impl ArtifactFormat for UpperCaseText {
        fn id(&self) -> &'static str {
            "upper"
        }

        fn claims(&self, artifact: &NamedArtifact) -> bool {
            artifact.name().ends_with(".txt")
        }

        fn canonicalize(
            &self,
            artifact: &NamedArtifact,
            _options: &NormalizeOptions,
        ) -> Result<String, MalformedArtifactError> {
            Ok(String::from_utf8_lossy(artifact.content()).to_uppercase())
        }
    }

    #[test]
    fn test_source_folds_crlf() {
        let normalizer = Normalizer::default();
        let a = NamedArtifact::source("A.java", "class A {\r\n}\r\n");
        let b = NamedArtifact::source("A.java", "class A {\n}\n");
        assert_eq!(normalizer.normalize(&a).unwrap(), normalizer.normalize(&b).unwrap());
    }

    #[test]
    fn test_source_must_be_utf8() {
        let a = NamedArtifact::new("A.java", ArtifactKind::Source, vec![0xff, 0xfe]);
        let err = Normalizer::default().normalize(&a).unwrap_err();
        assert_eq!(err.format, "source");
    }

    #[test]
    fn test_unknown_binary_falls_back_to_opaque() {
        let a = NamedArtifact::binary("blob.bin", vec![1, 2, 3]);
        let form = Normalizer::default().normalize(&a).unwrap();
        assert_eq!(form.format, "opaque");
    }

    #[test]
    fn test_registered_format_takes_precedence() {
        let mut normalizer = Normalizer::default();
        normalizer.register(Box::new(UpperCaseText));
        let form = normalizer
            .normalize(&NamedArtifact::binary("notes.txt", b"abc".to_vec()))
            .unwrap();
        assert_eq!(form.format, "upper");
        assert_eq!(form.text, "ABC");
    }

    #[test]
    fn test_default_options_strip_debug_attributes() {
        let options = NormalizeOptions::default();
        assert!(options.strips("LineNumberTable"));
        assert!(options.strips("SourceFile"));
        assert!(!options.strips("Code"));
    }

    #[test]
    fn test_canonical_sha256_tracks_text() {
        let a = CanonicalForm {
            format: "opaque",
            text: "x".to_string(),
        };
        let b = CanonicalForm {
            format: "opaque",
            text: "y".to_string(),
        };
        assert_ne!(a.sha256(), b.sha256());
        assert_eq!(a.sha256().len(), 64);
    }
}
