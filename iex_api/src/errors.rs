//! Error types for the API client.

/// Errors that can occur when making API requests or interpreting their results.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The requested bar range is not one the batch endpoint accepts.
    #[error("{0} is not a supported bar range")]
    InvalidRange(String),
    /// The configured base URL could not be combined with an endpoint path.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The request never produced a response (DNS, connect, timeout, body read).
    #[error("Request failed: {0}")]
    RequestFailed(String),
    /// The API returned a non-success status with a body snippet.
    #[error("Request failed with status {status}")]
    HttpStatus { status: u16, body: String },
    /// Every attempt was answered with HTTP 429.
    #[error("Rate limited on all {attempts} attempts, retry count exceeded")]
    RetriesExhausted { attempts: u32 },
    /// The body could not be decoded into the expected JSON or CSV shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// A bar's date/minute fields did not match the expected patterns.
    #[error("Invalid bar timestamp {value:?}: {reason}")]
    Timestamp { value: String, reason: String },
}
