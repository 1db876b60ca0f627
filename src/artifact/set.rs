//! Ordered artifact collections.

use super::named::{ArtifactKind, NamedArtifact};

/// Ordered collection of artifacts.
///
/// Insertion order is kept for reporting but carries no meaning. Names are
/// expected to be unique; duplicates are the caller's problem and are not
/// checked here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSet {
    artifacts: Vec<NamedArtifact>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, artifact: NamedArtifact) {
        self.artifacts.push(artifact);
    }

    /// Builder-style [`push`](Self::push) of a source artifact.
    pub fn with_source(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.push(NamedArtifact::source(name, text));
        self
    }

    /// Builder-style [`push`](Self::push) of a binary artifact.
    pub fn with_binary(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.push(NamedArtifact::binary(name, content));
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NamedArtifact> {
        self.artifacts.iter()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.artifacts.iter().map(NamedArtifact::name).collect()
    }

    /// Linear lookup. Verification builds an index instead.
    pub fn get(&self, name: &str) -> Option<&NamedArtifact> {
        self.artifacts.iter().find(|a| a.name() == name)
    }

    /// Artifacts of one kind, in set order.
    pub fn of_kind(&self, kind: ArtifactKind) -> impl Iterator<Item = &NamedArtifact> {
        self.artifacts.iter().filter(move |a| a.kind() == kind)
    }
}

impl FromIterator<NamedArtifact> for ArtifactSet {
    fn from_iter<I: IntoIterator<Item = NamedArtifact>>(iter: I) -> Self {
        Self {
            artifacts: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ArtifactSet {
    type Item = &'a NamedArtifact;
    type IntoIter = std::slice::Iter<'a, NamedArtifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.artifacts.iter()
    }
}

impl IntoIterator for ArtifactSet {
    type Item = NamedArtifact;
    type IntoIter = std::vec::IntoIter<NamedArtifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.artifacts.into_iter()
    }
}
