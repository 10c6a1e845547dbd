#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("invalid API key")]
    Authentication,
    #[error("API rate limit exceeded")]
    RateLimited,
    #[error("data not found: {0}")]
    NotFound(String),
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Rate limiting, transport failures and server-side errors are worth
    /// another attempt; everything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited | Self::Http(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Authentication | Self::NotFound(_) | Self::Decode(_) => false,
        }
    }
}
