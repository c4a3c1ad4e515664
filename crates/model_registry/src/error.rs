use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("model registry must contain at least one model")]
    Empty,

    #[error("model entry {index} has a blank id")]
    BlankId { index: usize },

    #[error("duplicate model id '{id}'")]
    DuplicateId { id: String },

    #[error("failed to parse model registry JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read model registry at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
