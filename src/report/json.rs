//! Machine-readable run report (`codegen-verify/report@1`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::artifact::ArtifactKind;
use crate::verify::{MatchResult, Outcome, RunCounts, VerificationRun};

/// Schema version for the report
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const REPORT_SCHEMA_ID: &str = "codegen-verify/report@1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Passed,
    Missing,
    Mismatch,
    Malformed,
}

/// One expected artifact's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub name: String,
    pub kind: ArtifactKind,
    pub status: EntryStatus,

    /// SHA-256 of the expected artifact's raw content
    pub expected_sha256: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_sha256: Option<String>,

    /// Format id that produced the canonical forms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_canonical_sha256: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_canonical_sha256: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_hint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_error: Option<String>,

    /// Rendered failure message (absent for passing entries)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ReportEntry {
    fn from_result(result: &MatchResult<'_>, message: Option<String>) -> Self {
        let (status, format, expected_canonical, actual_canonical) = match &result.outcome {
            Outcome::Passed { canonical } => (
                EntryStatus::Passed,
                Some(canonical.format.to_string()),
                Some(canonical.sha256()),
                Some(canonical.sha256()),
            ),
            Outcome::Missing => (EntryStatus::Missing, None, None, None),
            Outcome::Mismatch { expected, actual } => (
                EntryStatus::Mismatch,
                Some(actual.format.to_string()),
                Some(expected.sha256()),
                Some(actual.sha256()),
            ),
            Outcome::Malformed { error, .. } => {
                (EntryStatus::Malformed, Some(error.format.to_string()), None, None)
            }
        };

        Self {
            name: result.expected.name().to_string(),
            kind: result.expected.kind(),
            status,
            expected_sha256: result.expected.content_sha256(),
            actual_sha256: result.actual.map(|a| a.content_sha256()),
            format,
            expected_canonical_sha256: expected_canonical,
            actual_canonical_sha256: actual_canonical,
            source_hint: result.source_hint.map(|s| s.name().to_string()),
            origin_error: result.origin_error.as_ref().map(|e| e.to_string()),
            message,
        }
    }
}

/// Serialized outcome of one verification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub schema_version: u32,
    pub schema_id: String,
    pub created_at: DateTime<Utc>,
    pub passed: bool,
    pub counts: RunCounts,
    pub entries: Vec<ReportEntry>,

    /// SHA-256 of the JCS (RFC 8785) serialization of `entries`
    pub entries_sha256: String,
}

impl VerificationReport {
    pub fn from_run(run: &VerificationRun<'_>) -> Result<Self, ReportError> {
        let entries: Vec<ReportEntry> = run
            .results()
            .iter()
            .map(|result| {
                let message = run.reporter().report(result).map(|m| m.to_string());
                ReportEntry::from_result(result, message)
            })
            .collect();
        let entries_sha256 = Self::digest_entries(&entries)?;

        Ok(Self {
            schema_version: REPORT_SCHEMA_VERSION,
            schema_id: REPORT_SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            passed: run.passed(),
            counts: run.counts(),
            entries,
            entries_sha256,
        })
    }

    /// Digest independent of timestamp and key order.
    pub fn digest_entries(entries: &[ReportEntry]) -> Result<String, ReportError> {
        let jcs_bytes = serde_json_canonicalizer::to_vec(&entries)
            .map_err(|e| ReportError::JcsError(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&jcs_bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Serialize to JSON (pretty printed)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Report construction errors
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("JCS serialization error: {0}")]
    JcsError(String),
}
