//! Artifact persistence.

use std::path::{Path, PathBuf};

use collections_shared::{CollectionsError, Environment, Result};
use sha2::{Digest, Sha256};
use tracing::debug;

/// The two artifact shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Metadata,
    Records,
}

impl ArtifactKind {
    /// Output file name for a program.
    pub fn file_name(&self, program_file_name: &str) -> String {
        match self {
            Self::Metadata => format!("{program_file_name}_correction.json"),
            Self::Records => format!("{program_file_name}_records.txt"),
        }
    }
}

/// A fully rendered artifact, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub kind: ArtifactKind,
    /// The program's `fileName`.
    pub program: String,
    pub content: String,
}

/// What was written.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ArtifactMeta {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Persists artifacts keyed by program in an environment-scoped location.
pub trait ArtifactSink: Send + Sync {
    fn write(&self, env: Environment, artifact: &RenderedArtifact) -> Result<ArtifactMeta>;
}

// ---------------------------------------------------------------------------
// FsArtifactSink
// ---------------------------------------------------------------------------

/// Writes into `<root>/collections_corrections_{env}/`.
#[derive(Debug, Clone)]
pub struct FsArtifactSink {
    root: PathBuf,
}

impl FsArtifactSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn environment_dir(&self, env: Environment) -> PathBuf {
        self.root.join(env.corrections_dir_name())
    }
}

impl ArtifactSink for FsArtifactSink {
    fn write(&self, env: Environment, artifact: &RenderedArtifact) -> Result<ArtifactMeta> {
        let dir = self.environment_dir(env);
        std::fs::create_dir_all(&dir).map_err(|e| CollectionsError::io(&dir, e))?;

        let filename = artifact.kind.file_name(&artifact.program);
        let target = dir.join(&filename);
        let temp = dir.join(format!(".{filename}.tmp"));

        std::fs::write(&temp, &artifact.content).map_err(|e| CollectionsError::io(&temp, e))?;
        std::fs::rename(&temp, &target).map_err(|e| CollectionsError::io(&target, e))?;

        let mut hasher = Sha256::new();
        hasher.update(artifact.content.as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        debug!(file = %target.display(), size = artifact.content.len(), "wrote artifact");

        Ok(ArtifactMeta {
            path: target,
            sha256: hash,
            size_bytes: artifact.content.len(),
        })
    }
}
