//! Correction artifacts: rendering and persistence.
//!
//! Each ACTIVE program gets, per environment, a metadata file
//! (`{fileName}_correction.json`) and usually a records file
//! (`{fileName}_records.txt`). Rendering is deterministic; writing goes
//! through an [`ArtifactSink`].

mod document;
mod emitter;
mod sink;

pub use document::{CorrectionDocument, ProgramMetadata, to_ascii_json};
pub use emitter::{CorrectionEmitter, EmittedArtifacts, render_metadata, render_records};
pub use sink::{ArtifactKind, ArtifactMeta, ArtifactSink, FsArtifactSink, RenderedArtifact};
