use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Weather proxy error: {0}")]
    ProxyError(#[from] ProxyError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    ConflictError(String),
}

impl AppError {
    /// Message placed in the response body.
    ///
    /// Token and credential failures are deliberately vague here while the
    /// `Display` form stays precise for logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::InvalidCredentials => "Invalid email or password".to_string(),
                AuthError::MissingToken => "Not authorized. No token provided.".to_string(),
                AuthError::InvalidToken | AuthError::TokenExpired => {
                    "Not authorized. Invalid token.".to_string()
                }
                AuthError::UserNotFound => "User not found".to_string(),
            },
            AppError::ValidationError(msg) | AppError::ConflictError(msg) => msg.clone(),
            AppError::ConfigError(msg) => format!("Server configuration error: {}", msg),
            AppError::DatabaseError(DatabaseError::Duplicate(field)) => duplicate_message(field),
            AppError::DatabaseError(_) | AppError::InternalError(_) => {
                "Internal server error".to_string()
            }
            AppError::ProxyError(e) => match e {
                ProxyError::MissingApiKey => {
                    "Server configuration error: WEATHER_API_KEY is missing.".to_string()
                }
                ProxyError::Upstream { message, .. } => message.clone(),
                ProxyError::RequestFailed(_) => {
                    "Unable to fetch weather data. Please try again later.".to_string()
                }
            },
        }
    }
}

/// User-facing message for a uniqueness violation on `field`.
pub fn duplicate_message(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => format!("{}{} already exists", first.to_uppercase(), chars.as_str()),
        None => "Record already exists".to_string(),
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.into())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let body = match self {
            AppError::ProxyError(ProxyError::Upstream { code: Some(code), .. }) => json!({
                "error": self.public_message(),
                "code": code,
            }),
            _ => json!({ "error": self.public_message() }),
        };
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::ValidationError(_) | AppError::ConflictError(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseError(DatabaseError::Duplicate(_)) => StatusCode::BAD_REQUEST,
            AppError::ProxyError(ProxyError::Upstream { status, .. }) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("No bearer token provided")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("User not found")]
    UserNotFound,
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        }
    }
}

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Weather API key is not configured")]
    MissingApiKey,

    #[error("Upstream returned {status}: {message}")]
    Upstream {
        status: u16,
        message: String,
        code: Option<i64>,
    },

    #[error("API request failed: {0}")]
    RequestFailed(String),
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate {0}")]
    Duplicate(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                DatabaseError::ConnectionError(err.to_string())
            }
            _ => DatabaseError::QueryError(err.to_string()),
        }
    }
}
