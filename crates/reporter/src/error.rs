use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report artifact '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render the summary: {0}")]
    Format(#[from] std::fmt::Error),

    #[error("Failed to serialize chart figure: {0}")]
    Serialization(#[from] serde_json::Error),
}
