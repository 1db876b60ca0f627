//! Catch-all format: strict byte equality, rendered as a diffable hex dump.

use super::{ArtifactFormat, MalformedArtifactError, NormalizeOptions};
use crate::artifact::{ArtifactKind, NamedArtifact};

const BYTES_PER_LINE: usize = 16;

/// Hex dump of arbitrary bytes, one line per 16 bytes, offset first.
pub(crate) fn hex_lines(data: &[u8]) -> Vec<String> {
    data.chunks(BYTES_PER_LINE)
        .enumerate()
        .map(|(i, chunk)| {
            let bytes: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
            format!("{:08x}: {}", i * BYTES_PER_LINE, bytes.join(" "))
        })
        .collect()
}

/// Claims every binary artifact no other format recognized.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueFormat;

impl ArtifactFormat for OpaqueFormat {
    fn id(&self) -> &'static str {
        "opaque"
    }

    fn claims(&self, artifact: &NamedArtifact) -> bool {
        artifact.kind() == ArtifactKind::Binary
    }

    fn canonicalize(
        &self,
        artifact: &NamedArtifact,
        _options: &NormalizeOptions,
    ) -> Result<String, MalformedArtifactError> {
        let mut lines = vec![format!("opaque {} bytes", artifact.len())];
        lines.extend(hex_lines(artifact.content()));
        Ok(lines.join("\n"))
    }
}
