use thiserror::Error;

/// Errors from the remote user-store client.
#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),
}
