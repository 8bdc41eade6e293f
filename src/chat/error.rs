// src/chat/error.rs

/// Transport failures. Each one ends a run with the apology message.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Chat service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Invalid endpoint URL '{0}'")]
    InvalidUrl(String),
}
