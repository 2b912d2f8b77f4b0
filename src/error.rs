use std::io;

use thiserror::Error as ThisError;

use crate::TestResponse;

/// Everything that can make a test request fail.
///
/// Expectation failures format their message exactly as registered, so tests
/// can assert on `err.to_string()`. Transport errors from the HTTP client are
/// surfaced verbatim and always short-circuit expectation evaluation.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("bind TCP listener: {0}")]
    Bind(io::Error),
    #[error("get TCP listener socket address: {0}")]
    ListenerAddr(io::Error),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    /// The first registered expectation that did not hold. The resolved
    /// response rides along so callers can still inspect it.
    #[error("{message}")]
    Expectation {
        message: String,
        response: Box<TestResponse>,
    },
    #[error("decode JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The resolved response, when the request itself succeeded and an
    /// expectation was what failed.
    pub fn response(&self) -> Option<&TestResponse> {
        match self {
            Error::Expectation { response, .. } => Some(response),
            _ => None,
        }
    }
}
