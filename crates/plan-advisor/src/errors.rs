use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("missing required environment variable {0}")]
    MissingApiKey(&'static str),

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("model request failed: {0}")]
    Request(String),

    #[error("model request timed out after {0}ms")]
    Timeout(u64),

    #[error("model API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model response had no assistant content")]
    MissingContent,

    #[error("model response was not JSON: {0}")]
    InvalidJson(String),

    #[error("unknown provider {0:?}, expected mock or openai")]
    UnknownProvider(String),
}
