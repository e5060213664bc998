use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Gave up on {url} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Other error: {0}")]
    Other(String),
}

impl FetchError {
    /// Connection-level failures worth another attempt. HTTP status errors
    /// and body decoding errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::HttpError(e) => e.is_connect() || e.is_timeout() || e.is_body() || e.is_request(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
