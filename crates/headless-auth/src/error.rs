//! Error types for token exchange and refresh-token storage

/// Errors raised by the token manager and its collaborators.
///
/// A backend rejecting the exchange is not an error: it comes back as
/// `TokenResponse::Failed`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("a client secret must be configured to exchange tokens")]
    MissingClientSecret,

    #[error("client secret is not a valid header value")]
    InvalidClientSecret,

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("response body is not JSON: {0}")]
    ResponseParse(String),

    #[error("cookie store error: {0}")]
    Cookie(String),
}

/// Result alias for token operations.
pub type Result<T> = std::result::Result<T, Error>;
