//! Error types for corpus loading and example persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the corpus and sink collaborators.
///
/// The transformation itself never fails; these cover structurally invalid
/// input files and I/O problems around it.
#[derive(Debug, Error)]
pub enum SerializerError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid JSON on line {line} of {path:?}: {source}")]
    JsonLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("corpus file missing: {0:?}")]
    MissingCorpusFile(PathBuf),

    #[error("no corpus (utterances.jsonl) found under {0:?}")]
    CorpusNotFound(PathBuf),

    #[error("failed to serialize examples: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SerializerError>;

impl SerializerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
