//! Artifact model
//!
//! Named binary or source blobs exchanged between the generator under test,
//! the fixture loader and the verification engine.

mod named;
mod set;

pub use named::{ArtifactKind, NamedArtifact};
pub use set::ArtifactSet;
