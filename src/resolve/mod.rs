//! Artifact resolution
//!
//! Exact name lookup of expected artifacts among the actual outputs, plus a
//! best-effort search for the source artifact a binary most likely came
//! from. The origin search only ever produces a hint for reports; a failed
//! exact lookup is always "not generated".

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::artifact::{ArtifactKind, ArtifactSet, NamedArtifact};
use crate::config::BuiltinDefaults;

/// How binary output names map back into source space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceMapping {
    /// Leading location segment of binary outputs; empty disables the rewrite.
    pub binary_location: String,
    pub source_location: String,
    pub binary_suffix: String,
    pub source_suffix: String,
    /// Characters separating a nested type from its enclosing type.
    pub nested_separators: Vec<char>,
}

impl Default for SourceMapping {
    fn default() -> Self {
        let defaults = BuiltinDefaults::default();
        Self {
            binary_location: defaults.binary_location,
            source_location: defaults.source_location,
            binary_suffix: defaults.binary_suffix,
            source_suffix: defaults.source_suffix,
            nested_separators: defaults
                .nested_separators
                .iter()
                .filter_map(|s| s.chars().next())
                .collect(),
        }
    }
}

impl SourceMapping {
    /// Output name rewritten into source space, without any suffix, and
    /// whether the binary suffix was present.
    fn source_stem(&self, name: &str) -> (String, bool) {
        let relocated = match name.strip_prefix(self.binary_location.as_str()) {
            Some(rest)
                if !self.binary_location.is_empty()
                    && (rest.starts_with('/') || rest.starts_with('.')) =>
            {
                format!("{}{}", self.source_location, rest)
            }
            _ => name.to_string(),
        };
        if !self.binary_suffix.is_empty() {
            if let Some(stem) = relocated.strip_suffix(self.binary_suffix.as_str()) {
                return (stem.to_string(), true);
            }
        }
        (relocated, false)
    }
}

/// Candidate origin names for `name`, most specific first.
///
/// `CLASS_OUTPUT/a/b/Outer$Inner$Deep.class` yields
/// `SOURCE_OUTPUT/a/b/Outer$Inner$Deep.java`, `SOURCE_OUTPUT/a/b/Outer$Inner.java`
/// and `SOURCE_OUTPUT/a/b/Outer.java`. Truncation stops at the package boundary.
///
/// A name without the binary suffix is a bare type name: each level is tried
/// with the source suffix and then as is, so `Outer$Inner` can resolve to a
/// source named `Outer`.
pub fn origin_candidates(name: &str, mapping: &SourceMapping) -> impl Iterator<Item = String> {
    let (stem, had_binary_suffix) = mapping.source_stem(name);
    let floor = stem.rfind(['/', '.']).map_or(0, |i| i + 1);
    let separators = mapping.nested_separators.clone();
    let suffix = mapping.source_suffix.clone();
    let bare = !had_binary_suffix && !suffix.is_empty();

    std::iter::successors(Some(stem), move |current: &String| {
        current[floor..]
            .rfind(|c: char| separators.contains(&c))
            .map(|i| current[..floor + i].to_string())
    })
    .filter(move |candidate| candidate.len() > floor)
    .flat_map(move |candidate| {
        let suffixed = format!("{}{}", candidate, suffix);
        std::iter::once(suffixed).chain(bare.then_some(candidate))
    })
}

/// No candidate origin name was present in the source set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no origin source found for {name} (tried: {})", candidates.join(", "))]
pub struct UnresolvableOrigin {
    pub name: String,
    pub candidates: Vec<String>,
}

/// Name-to-artifact index over one set, built once per run.
#[derive(Debug, Clone, Default)]
pub struct ArtifactIndex<'a> {
    by_name: HashMap<&'a str, &'a NamedArtifact>,
}

impl<'a> ArtifactIndex<'a> {
    /// Index every artifact in `set`. With duplicate names the first wins.
    pub fn build(set: &'a ArtifactSet) -> Self {
        Self::from_artifacts(set.iter())
    }

    /// Index only the artifacts of `kind`.
    pub fn of_kind(set: &'a ArtifactSet, kind: ArtifactKind) -> Self {
        Self::from_artifacts(set.of_kind(kind))
    }

    fn from_artifacts(artifacts: impl Iterator<Item = &'a NamedArtifact>) -> Self {
        let mut by_name = HashMap::new();
        for artifact in artifacts {
            by_name.entry(artifact.name()).or_insert(artifact);
        }
        Self { by_name }
    }

    pub fn get(&self, name: &str) -> Option<&'a NamedArtifact> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Locates actual counterparts and origin sources for one run.
#[derive(Debug)]
pub struct Resolver<'a> {
    actual: ArtifactIndex<'a>,
    sources: ArtifactIndex<'a>,
    mapping: SourceMapping,
}

impl<'a> Resolver<'a> {
    /// Without explicit `sources`, origins are looked up among the
    /// source-kind artifacts of `actual`.
    pub fn new(
        actual: &'a ArtifactSet,
        sources: Option<&'a ArtifactSet>,
        mapping: SourceMapping,
    ) -> Self {
        let sources = match sources {
            Some(set) => ArtifactIndex::build(set),
            None => ArtifactIndex::of_kind(actual, ArtifactKind::Source),
        };
        Self {
            actual: ArtifactIndex::build(actual),
            sources,
            mapping,
        }
    }

    /// Actual artifact with exactly `expected_name`.
    pub fn resolve(&self, expected_name: &str) -> Option<&'a NamedArtifact> {
        let found = self.actual.get(expected_name);
        log::debug!(
            "resolve {}: {}",
            expected_name,
            if found.is_some() { "found" } else { "missing" }
        );
        found
    }

    /// First source artifact matching an origin candidate of `name`.
    pub fn source_hint(&self, name: &str) -> Result<&'a NamedArtifact, UnresolvableOrigin> {
        let mut tried = Vec::new();
        for candidate in origin_candidates(name, &self.mapping) {
            if let Some(source) = self.sources.get(&candidate) {
                log::debug!("origin of {} is {}", name, candidate);
                return Ok(source);
            }
            tried.push(candidate);
        }
        log::warn!(
            "origin search exhausted for {} after {} candidate(s)",
            name,
            tried.len()
        );
        Err(UnresolvableOrigin {
            name: name.to_string(),
            candidates: tried,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(name: &str) -> Vec<String> {
        origin_candidates(name, &SourceMapping::default()).collect()
    }

    #[test]
    fn test_candidates_most_specific_first() {
        assert_eq!(
            candidates("CLASS_OUTPUT/com/example/Outer$Inner$Deep.class"),
            vec![
                "SOURCE_OUTPUT/com/example/Outer$Inner$Deep.java",
                "SOURCE_OUTPUT/com/example/Outer$Inner.java",
                "SOURCE_OUTPUT/com/example/Outer.java",
            ]
        );
    }

    #[test]
    fn test_candidates_without_location() {
        assert_eq!(
            candidates("com/example/Outer$Inner.class"),
            vec!["com/example/Outer$Inner.java", "com/example/Outer.java"]
        );
        assert_eq!(candidates("com.example.Foo.class"), vec!["com.example.Foo.java"]);
    }

    #[test]
    fn test_candidates_stop_at_package_boundary() {
        // '$' in a package segment is not a nesting boundary
        assert_eq!(candidates("a$b/Foo.class"), vec!["a$b/Foo.java"]);
        assert_eq!(candidates("pkg/$Lambda.class"), vec!["pkg/$Lambda.java"]);
    }

    #[test]
    fn test_location_prefix_needs_boundary() {
        assert_eq!(
            candidates("CLASS_OUTPUTS/Foo.class"),
            vec!["CLASS_OUTPUTS/Foo.java"]
        );
    }

    #[test]
    fn test_custom_separators() {
        let mapping = SourceMapping {
            binary_location: String::new(),
            source_suffix: ".kt".to_string(),
            nested_separators: vec!['$', '_'],
            ..SourceMapping::default()
        };
        let got: Vec<String> = origin_candidates("CLASS_OUTPUT/p/A_B$C.class", &mapping).collect();
        assert_eq!(
            got,
            vec![
                "CLASS_OUTPUT/p/A_B$C.kt",
                "CLASS_OUTPUT/p/A_B.kt",
                "CLASS_OUTPUT/p/A.kt"
            ]
        );
    }

    #[test]
    fn test_exact_resolution_independent_of_order() {
        let forward = ArtifactSet::new()
            .with_binary("a/A.class", vec![1])
            .with_binary("a/B.class", vec![2]);
        let backward = ArtifactSet::new()
            .with_binary("a/B.class", vec![2])
            .with_binary("a/A.class", vec![1]);
        for set in [&forward, &backward] {
            let resolver = Resolver::new(set, None, SourceMapping::default());
            assert_eq!(resolver.resolve("a/B.class").unwrap().content(), &[2u8]);
            assert!(resolver.resolve("a/C.class").is_none());
            assert!(resolver.resolve("a/A").is_none());
        }
    }

    #[test]
    fn test_nested_class_hint_resolves_to_outer() {
        let actual = ArtifactSet::new().with_binary("CLASS_OUTPUT/p/Outer$Inner.class", vec![]);
        let sources = ArtifactSet::new().with_source("SOURCE_OUTPUT/p/Outer.java", "class Outer {}");
        let resolver = Resolver::new(&actual, Some(&sources), SourceMapping::default());

        let hint = resolver
            .source_hint("CLASS_OUTPUT/p/Outer$Inner.class")
            .unwrap();
        assert_eq!(hint.name(), "SOURCE_OUTPUT/p/Outer.java");
    }

    #[test]
    fn test_bare_nested_name_hint_resolves_to_outer() {
        let actual = ArtifactSet::new().with_binary("Outer$Inner", vec![]);
        let sources = ArtifactSet::new().with_source("Outer", "class Outer { class Inner {} }");
        let resolver = Resolver::new(&actual, Some(&sources), SourceMapping::default());

        assert_eq!(resolver.source_hint("Outer$Inner").unwrap().name(), "Outer");
        assert_eq!(
            candidates("Outer$Inner"),
            vec!["Outer$Inner.java", "Outer$Inner", "Outer.java", "Outer"]
        );
    }

    #[test]
    fn test_empty_suffixes_map_names_unchanged() {
        let mapping = SourceMapping {
            binary_suffix: String::new(),
            source_suffix: String::new(),
            ..SourceMapping::default()
        };
        let got: Vec<String> = origin_candidates("p/Outer$Inner", &mapping).collect();
        assert_eq!(got, vec!["p/Outer$Inner", "p/Outer"]);

        let actual = ArtifactSet::new();
        let sources = ArtifactSet::new().with_source("p/Outer", "class Outer {}");
        let resolver = Resolver::new(&actual, Some(&sources), mapping);
        assert_eq!(resolver.source_hint("p/Outer$Inner").unwrap().name(), "p/Outer");
    }

    #[test]
    fn test_default_sources_come_from_actual_set() {
        let actual = ArtifactSet::new()
            .with_binary("p/Gen.class", vec![])
            .with_source("p/Gen.java", "class Gen {}");
        let resolver = Resolver::new(&actual, None, SourceMapping::default());
        assert_eq!(resolver.source_hint("p/Gen.class").unwrap().name(), "p/Gen.java");
    }

    #[test]
    fn test_unresolvable_origin_lists_candidates() {
        let actual = ArtifactSet::new();
        let resolver = Resolver::new(&actual, None, SourceMapping::default());

        let err = resolver.source_hint("p/A$B.class").unwrap_err();
        assert_eq!(err.name, "p/A$B.class");
        assert_eq!(err.candidates, vec!["p/A$B.java", "p/A.java"]);
        assert!(err.to_string().contains("tried: p/A$B.java, p/A.java"));
    }

    #[test]
    fn test_index_first_duplicate_wins() {
        let set = ArtifactSet::new()
            .with_binary("X.class", vec![1])
            .with_binary("X.class", vec![2]);
        let index = ArtifactIndex::build(&set);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("X.class").unwrap().content(), &[1u8]);
    }
}
