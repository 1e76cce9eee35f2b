//! Error type returned by a single provider call, before retry classification.

/// Error from one submit/poll/status call.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// Transport failure reported by a non-curl client.
    #[error("network error: {0}")]
    Transport(String),
    /// HTTP response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// 2xx response that could not be understood.
    #[error("malformed provider response: {0}")]
    Malformed(String),
    /// The provider refused or failed the generation; message is verbatim.
    #[error("{0}")]
    Rejected(String),
}
