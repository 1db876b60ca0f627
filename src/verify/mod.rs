//! Verification
//!
//! Walks the expected set in order, resolves each artifact among the actual
//! outputs, normalizes both sides and compares canonical forms. Every
//! expected artifact gets a [`MatchResult`]; nothing aborts the run.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::artifact::{ArtifactSet, NamedArtifact};
use crate::config::VerifyConfig;
use crate::normalize::{ArtifactFormat, CanonicalForm, MalformedArtifactError, Normalizer};
use crate::report::{FailureMessage, ReportError, Reporter, VerificationReport};
use crate::resolve::{Resolver, SourceMapping, UnresolvableOrigin};

/// Which side of a comparison an artifact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Expected,
    Actual,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Expected => write!(f, "expected"),
            Side::Actual => write!(f, "actual"),
        }
    }
}

/// Result of comparing one expected artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Both sides reduce to this canonical form.
    Passed { canonical: CanonicalForm },

    /// No actual artifact carries the expected name.
    Missing,

    Mismatch {
        expected: CanonicalForm,
        actual: CanonicalForm,
    },

    /// One side could not be parsed; no comparison was made.
    Malformed {
        side: Side,
        error: MalformedArtifactError,
    },
}

/// Per-expected-artifact record of a run.
#[derive(Debug, Clone)]
pub struct MatchResult<'a> {
    pub expected: &'a NamedArtifact,

    /// `None` when nothing with the expected name was generated.
    pub actual: Option<&'a NamedArtifact>,

    /// Best-guess originating source; looked up for failures only.
    pub source_hint: Option<&'a NamedArtifact>,

    /// Why no source hint could be found.
    pub origin_error: Option<UnresolvableOrigin>,

    pub outcome: Outcome,
}

impl MatchResult<'_> {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, Outcome::Passed { .. })
    }

    pub fn name(&self) -> &str {
        self.expected.name()
    }
}

/// Tally of outcomes in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub total: usize,
    pub passed: usize,
    pub missing: usize,
    pub mismatched: usize,
    pub malformed: usize,
}

/// All results of one verification run, in expected-set order.
#[derive(Debug)]
pub struct VerificationRun<'a> {
    results: Vec<MatchResult<'a>>,
    reporter: Reporter,
}

impl<'a> VerificationRun<'a> {
    pub fn results(&self) -> &[MatchResult<'a>] {
        &self.results
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// True iff every expected artifact was found and equivalent.
    pub fn passed(&self) -> bool {
        self.results.iter().all(MatchResult::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &MatchResult<'a>> {
        self.results.iter().filter(|r| !r.passed())
    }

    pub fn counts(&self) -> RunCounts {
        let mut counts = RunCounts {
            total: self.results.len(),
            ..RunCounts::default()
        };
        for result in &self.results {
            match result.outcome {
                Outcome::Passed { .. } => counts.passed += 1,
                Outcome::Missing => counts.missing += 1,
                Outcome::Mismatch { .. } => counts.mismatched += 1,
                Outcome::Malformed { .. } => counts.malformed += 1,
            }
        }
        counts
    }

    /// One message per failing result.
    pub fn messages(&self) -> Vec<FailureMessage> {
        self.results
            .iter()
            .filter_map(|r| self.reporter.report(r))
            .collect()
    }

    /// `Ok` when the run passed, otherwise every failure message.
    pub fn ensure_passed(&self) -> Result<(), VerificationFailure> {
        if self.passed() {
            return Ok(());
        }
        Err(VerificationFailure {
            total: self.results.len(),
            messages: self.messages(),
        })
    }

    pub fn to_report(&self) -> Result<VerificationReport, ReportError> {
        VerificationReport::from_run(self)
    }
}

fn join_messages(messages: &[FailureMessage]) -> String {
    messages
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// A run failed; displays every failure message.
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "verification failed for {} of {total} expected artifact(s)\n\n{}",
    .messages.len(),
    join_messages(.messages)
)]
pub struct VerificationFailure {
    pub total: usize,
    pub messages: Vec<FailureMessage>,
}

/// Compares expected artifacts against generator output.
#[derive(Debug, Default)]
pub struct Verifier {
    normalizer: Normalizer,
    mapping: SourceMapping,
    reporter: Reporter,
}

impl Verifier {
    pub fn new(config: VerifyConfig) -> Self {
        Self {
            normalizer: Normalizer::new(config.normalize),
            mapping: config.sources,
            reporter: Reporter::new(config.report),
        }
    }

    /// Register an artifact format ahead of the built-ins.
    pub fn register_format(&mut self, format: Box<dyn ArtifactFormat>) {
        self.normalizer.register(format);
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Verify `expected` against `actual`.
    ///
    /// Origin hints are searched in `sources`, or among the source-kind
    /// artifacts of `actual` when no source set is given.
    pub fn verify<'a>(
        &self,
        expected: &'a ArtifactSet,
        actual: &'a ArtifactSet,
        sources: Option<&'a ArtifactSet>,
    ) -> VerificationRun<'a> {
        let resolver = Resolver::new(actual, sources, self.mapping.clone());
        let results: Vec<MatchResult<'a>> = expected
            .iter()
            .map(|artifact| self.check(&resolver, artifact))
            .collect();

        let run = VerificationRun {
            results,
            reporter: self.reporter.clone(),
        };
        let counts = run.counts();
        log::info!(
            "verified {} artifact(s): {} passed, {} missing, {} mismatched, {} malformed",
            counts.total,
            counts.passed,
            counts.missing,
            counts.mismatched,
            counts.malformed
        );
        run
    }

    fn check<'a>(&self, resolver: &Resolver<'a>, expected: &'a NamedArtifact) -> MatchResult<'a> {
        let Some(actual) = resolver.resolve(expected.name()) else {
            return MatchResult {
                expected,
                actual: None,
                source_hint: None,
                origin_error: None,
                outcome: Outcome::Missing,
            };
        };

        let outcome = self.compare(expected, actual);
        let (source_hint, origin_error) = match outcome {
            Outcome::Passed { .. } => (None, None),
            _ => match resolver.source_hint(actual.name()) {
                Ok(source) => (Some(source), None),
                Err(error) => (None, Some(error)),
            },
        };

        MatchResult {
            expected,
            actual: Some(actual),
            source_hint,
            origin_error,
            outcome,
        }
    }

    fn compare(&self, expected: &NamedArtifact, actual: &NamedArtifact) -> Outcome {
        let expected_form = match self.normalizer.normalize(expected) {
            Ok(form) => form,
            Err(error) => {
                return Outcome::Malformed {
                    side: Side::Expected,
                    error,
                }
            }
        };
        let actual_form = match self.normalizer.normalize(actual) {
            Ok(form) => form,
            Err(error) => {
                return Outcome::Malformed {
                    side: Side::Actual,
                    error,
                }
            }
        };

        if expected_form == actual_form {
            Outcome::Passed {
                canonical: actual_form,
            }
        } else {
            log::debug!("{} differs from expectation", actual.name());
            Outcome::Mismatch {
                expected: expected_form,
                actual: actual_form,
            }
        }
    }
}

/// Verify with default configuration and fail with every message.
pub fn assert_expected_generated(
    expected: &ArtifactSet,
    actual: &ArtifactSet,
    sources: Option<&ArtifactSet>,
) -> Result<(), VerificationFailure> {
    Verifier::default()
        .verify(expected, actual, sources)
        .ensure_passed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_expectation_passes() {
        let baseline = ArtifactSet::new();
        let candidate = ArtifactSet::new();
        let run = Verifier::default().verify(&baseline, &candidate, None);
        assert!(run.passed());
        assert_eq!(run.counts(), RunCounts::default());
        assert!(run.ensure_passed().is_ok());
    }

    #[test]
    fn test_results_follow_expected_order() {
        let expected = ArtifactSet::new()
            .with_source("b.txt", "b")
            .with_source("a.txt", "a");
        let actual = ArtifactSet::new()
            .with_source("a.txt", "a")
            .with_source("b.txt", "b");
        let run = Verifier::default().verify(&expected, &actual, None);
        let names: Vec<&str> = run.results().iter().map(MatchResult::name).collect();
        assert_eq!(names, vec!["b.txt", "a.txt"]);
        assert!(run.passed());
    }

    #[test]
    fn test_missing_does_not_stop_run() {
        let expected = ArtifactSet::new()
            .with_source("gone.txt", "x")
            .with_source("here.txt", "y");
        let actual = ArtifactSet::new().with_source("here.txt", "z");
        let run = Verifier::default().verify(&expected, &actual, None);

        let counts = run.counts();
        assert_eq!(counts.missing, 1);
        assert_eq!(counts.mismatched, 1);
        assert_eq!(run.failures().count(), 2);
        assert!(run.results()[0].actual.is_none());
    }

    #[test]
    fn test_kind_difference_is_mismatch() {
        let expected = ArtifactSet::new().with_source("x", "ab");
        let actual = ArtifactSet::new().with_binary("x", b"ab".to_vec());
        let run = Verifier::default().verify(&expected, &actual, None);
        assert!(matches!(run.results()[0].outcome, Outcome::Mismatch { .. }));
    }

    #[test]
    fn test_malformed_expected_side() {
        let expected = ArtifactSet::new().with_binary("A.class", vec![0, 1, 2, 3]);
        let actual = ArtifactSet::new().with_binary("A.class", vec![0, 1, 2, 3]);
        let run = Verifier::default().verify(&expected, &actual, None);
        match &run.results()[0].outcome {
            Outcome::Malformed { side, error } => {
                assert_eq!(*side, Side::Expected);
                assert_eq!(error.format, "jvm-class");
            }
            other => panic!("expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_failure_display_joins_messages() {
        let expected = ArtifactSet::new()
            .with_source("one.txt", "1")
            .with_source("two.txt", "2");
        let err = assert_expected_generated(&expected, &ArtifactSet::new(), None).unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("verification failed for 2 of 2 expected artifact(s)"));
        assert!(text.contains("not generated: one.txt"));
        assert!(text.contains("not generated: two.txt"));
        assert_eq!(err.messages.len(), 2);
    }

    #[test]
    fn test_registered_format_used_by_verifier() {
        struct CaseInsensitive;
        impl ArtifactFormat for CaseInsensitive {
            fn id(&self) -> &'static str {
                "case-insensitive"
            }
            fn claims(&self, artifact: &NamedArtifact) -> bool {
                artifact.name().ends_with(".ci")
            }
            fn canonicalize(
                &self,
                artifact: &NamedArtifact,
                _options: &crate::normalize::NormalizeOptions,
            ) -> Result<String, MalformedArtifactError> {
                Ok(String::from_utf8_lossy(artifact.content()).to_lowercase())
            }
        }

        let mut verifier = Verifier::default();
        verifier.register_format(Box::new(CaseInsensitive));
        let expected = ArtifactSet::new().with_binary("x.ci", b"Hello".to_vec());
        let actual = ArtifactSet::new().with_binary("x.ci", b"HELLO".to_vec());
        assert!(verifier.verify(&expected, &actual, None).passed());
    }
}
