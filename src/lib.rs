//! codegen-verify - artifact verification for code generators
//!
//! Compares the artifacts a generator produced against expected fixtures,
//! modulo metadata with no bearing on behavior (debug tables, constant pool
//! layout, member order), and explains every difference with a diff and a
//! pointer back to the source that most likely produced it.

pub mod artifact;
pub mod config;
pub mod normalize;
pub mod report;
pub mod resolve;
pub mod verify;

pub use artifact::{ArtifactKind, ArtifactSet, NamedArtifact};
pub use config::{ConfigError, EffectiveConfig, VerifyConfig};
pub use normalize::{ArtifactFormat, CanonicalForm, MalformedArtifactError, NormalizeOptions, Normalizer};
pub use report::{FailureKind, FailureMessage, ReportOptions, Reporter, VerificationReport};
pub use resolve::{origin_candidates, ArtifactIndex, Resolver, SourceMapping, UnresolvableOrigin};
pub use verify::{
    assert_expected_generated, MatchResult, Outcome, RunCounts, Side, VerificationFailure,
    VerificationRun, Verifier,
};
