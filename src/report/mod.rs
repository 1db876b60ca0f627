//! Failure reporting
//!
//! Turns failing match results into human-readable messages for test
//! output, and whole runs into a JSON report.

mod diff;
mod json;

pub use diff::unified_diff;
pub use json::{EntryStatus, ReportEntry, ReportError, VerificationReport, REPORT_SCHEMA_ID, REPORT_SCHEMA_VERSION};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::BuiltinDefaults;
use crate::normalize::CanonicalForm;
use crate::verify::{MatchResult, Outcome};

/// Report rendering options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportOptions {
    /// Unchanged lines shown around each diff hunk.
    pub context_lines: usize,

    /// LCS table budget; larger inputs get a first-divergence summary.
    pub max_diff_cells: usize,

    /// Embed the origin source's full text in mismatch messages.
    pub include_source: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        let defaults = BuiltinDefaults::default();
        Self {
            context_lines: defaults.context_lines,
            max_diff_cells: defaults.max_diff_cells,
            include_source: defaults.include_source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Missing,
    Mismatch,
    Malformed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Missing => write!(f, "missing"),
            FailureKind::Mismatch => write!(f, "mismatch"),
            FailureKind::Malformed => write!(f, "malformed"),
        }
    }
}

/// A rendered failure for one expected artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureMessage {
    pub kind: FailureKind,
    pub name: String,
    pub lines: Vec<String>,
}

impl fmt::Display for FailureMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines.join("\n"))
    }
}

/// Builds failure messages from match results.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    options: ReportOptions,
}

impl Reporter {
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// Message for a failing result, `None` when it passed.
    pub fn report(&self, result: &MatchResult<'_>) -> Option<FailureMessage> {
        let name = result.expected.name();
        let (kind, lines) = match &result.outcome {
            Outcome::Passed { .. } => return None,
            Outcome::Missing => (FailureKind::Missing, self.missing(result)),
            Outcome::Mismatch { expected, actual } => {
                (FailureKind::Mismatch, self.mismatch(result, expected, actual))
            }
            Outcome::Malformed { side, error } => {
                let mut lines = vec![
                    format!("{} artifact could not be parsed: {}", side, name),
                    format!("  {}", error),
                ];
                lines.extend(self.origin(result));
                (FailureKind::Malformed, lines)
            }
        };
        Some(FailureMessage {
            kind,
            name: name.to_string(),
            lines,
        })
    }

    fn missing(&self, result: &MatchResult<'_>) -> Vec<String> {
        let expected = result.expected;
        vec![
            format!("expected artifact was not generated: {}", expected.name()),
            format!("  kind: {}", expected.kind()),
            format!("  size: {} bytes", expected.len()),
            format!("  sha256: {}", expected.content_sha256()),
        ]
    }

    fn mismatch(
        &self,
        result: &MatchResult<'_>,
        expected: &CanonicalForm,
        actual: &CanonicalForm,
    ) -> Vec<String> {
        let mut lines = vec![
            format!(
                "generated artifact differs from expectation: {} ({})",
                result.expected.name(),
                actual.format
            ),
            "--- expected".to_string(),
            "+++ actual".to_string(),
        ];
        lines.extend(unified_diff(
            &expected.text,
            &actual.text,
            self.options.context_lines,
            self.options.max_diff_cells,
        ));

        lines.push("expected canonical form:".to_string());
        lines.extend(indented(&expected.text));
        lines.push("actual canonical form:".to_string());
        lines.extend(indented(&actual.text));
        lines.extend(self.origin(result));
        lines
    }

    fn origin(&self, result: &MatchResult<'_>) -> Vec<String> {
        match (result.source_hint, &result.origin_error) {
            (Some(source), _) => {
                let mut lines = vec![format!("origin source: {}", source.name())];
                if self.options.include_source {
                    match source.text() {
                        Some(text) => lines.extend(indented(&text.replace("\r\n", "\n"))),
                        None => lines.push(format!("  <{} bytes, not UTF-8>", source.len())),
                    }
                }
                lines
            }
            (None, Some(error)) => vec![format!("origin source: unavailable ({})", error)],
            (None, None) => Vec::new(),
        }
    }
}

fn indented(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split('\n').map(|line| format!("  {}", line))
}
