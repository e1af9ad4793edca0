use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Inference error{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Inference {
        /// HTTP status from the inference endpoint, if the request got that far.
        status: Option<u16>,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not signed in: {0}")]
    Unauthenticated(String),
}

impl ChatError {
    /// Returns `true` when the error came from the transport layer rather than
    /// from a server that answered (connection refused, DNS, timeout).
    pub fn is_network(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Inference { status: None, message } => is_network_message(message),
            _ => false,
        }
    }
}

fn is_network_message(msg: &str) -> bool {
    let msg_lower = msg.to_lowercase();
    let patterns = [
        "timeout",
        "timed out",
        "connection refused",
        "connection reset",
        "broken pipe",
        "dns error",
        "network",
    ];
    patterns.iter().any(|p| msg_lower.contains(p))
}

pub type Result<T> = std::result::Result<T, ChatError>;
