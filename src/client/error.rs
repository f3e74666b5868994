use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),

    #[error("Request timeout. Please check your connection and try again.")]
    Timeout,

    #[error("Network error. Please check your connection.")]
    Network(#[source] reqwest::Error),

    /// Non-success response; `message` is the server's own text when it sent one.
    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("{0}")]
    ServerMisconfigured(String),

    #[error("No token received from server")]
    MissingToken,

    #[error("Session expired. Please login again.")]
    Unauthorized,

    #[error("You are not authenticated. Please login again.")]
    NotAuthenticated,

    /// A newer register, login or logout replaced this call before it finished.
    #[error("Request was superseded by a newer session change")]
    Superseded,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Client configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether the failure was on the way to or from the server rather than
    /// a decision made by it.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Timeout | ClientError::Network(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Network(err)
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}
