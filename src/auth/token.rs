use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::Result;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Identity ID
    pub exp: i64,     // Expiration time
    pub iat: i64,     // Issued at
}

/// Mints and checks HS256 bearer tokens.
///
/// A missing secret is not rejected at construction so that issuing can
/// report it as a configuration error at the point of use.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Option<String>,
    lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(secret: Option<String>, lifetime: Duration) -> Self {
        Self {
            secret: secret.filter(|s| !s.trim().is_empty()),
            lifetime,
        }
    }

    pub fn issue(&self, identity_id: Uuid) -> Result<String> {
        self.issue_at(identity_id, Utc::now())
    }

    pub fn issue_at(&self, identity_id: Uuid, now: DateTime<Utc>) -> Result<String> {
        let secret = self.secret.as_deref().ok_or_else(|| {
            AppError::ConfigError("token signing secret is not configured".to_string())
        })?;

        let expires_at = now.checked_add_signed(self.lifetime).ok_or_else(|| {
            AppError::ConfigError("token lifetime is out of range".to_string())
        })?;

        let claims = Claims {
            sub: identity_id.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| AppError::InternalError(format!("token encoding failed: {}", e)))
    }

    pub fn verify(&self, token: &str) -> std::result::Result<Uuid, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Valid strictly before `exp`; `now >= exp` is expired.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> std::result::Result<Uuid, AuthError> {
        // Without a secret nothing could have been issued.
        let secret = self.secret.as_deref().ok_or(AuthError::InvalidToken)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )?;

        if now.timestamp() >= data.claims.exp {
            return Err(AuthError::TokenExpired);
        }

        Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidToken)
    }
}
