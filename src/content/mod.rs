pub mod cache;
pub mod generator;
pub mod misspell;
pub mod provider;

use thiserror::Error;

pub use cache::{Artifact, ArtifactKey, ArtifactKind, CacheError, CacheStore, MemoryCache};
pub use generator::{ContentGenerator, GenerationError};
pub use provider::{ContentProvider, ContentSettings, WordPrompt};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{kind} unavailable for word `{word}`")]
    Unavailable { word: String, kind: ArtifactKind },
}
