use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to write site profile {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode site profile for {domain}: {source}")]
    Encode {
        domain: String,
        #[source]
        source: serde_json::Error,
    },
}
