use thiserror::Error;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rate limited (resets at {reset:?})")]
    RateLimited { reset: Option<i64> },
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("token contains characters not allowed in a header")]
    InvalidToken,
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl GithubError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
