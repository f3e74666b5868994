use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::TokenIssuer;
use crate::db::models::{Identity, PublicUser};
use crate::db::CredentialStore;
use crate::error::{duplicate_message, AppError, AuthError, DatabaseError};
use crate::Result;

/// A successful register or login: a fresh token and the identity it names.
#[derive(Debug, Clone, Serialize)]
pub struct AuthGrant {
    pub token: String,
    pub user: PublicUser,
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    tokens: TokenIssuer,
    // Verified against when the email is unknown, so both failure paths
    // cost one Argon2 run.
    dummy_hash: OnceCell<String>,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, tokens: TokenIssuer) -> Self {
        Self {
            store,
            tokens,
            dummy_hash: OnceCell::new(),
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Validates and persists a new identity without issuing a token.
    pub async fn create_identity(&self, username: &str, email: &str, password: &str) -> Result<Identity> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AppError::ValidationError(
                "Please provide username, email, and password".to_string(),
            ));
        }

        if self.store.find_by_email(email).await?.is_some() {
            return Err(AppError::ConflictError(duplicate_message("email")));
        }
        if self.store.find_by_username(username).await?.is_some() {
            return Err(AppError::ConflictError(duplicate_message("username")));
        }

        let password_hash = hash_password(password.to_string()).await?;
        let identity = Identity::new(username.to_string(), email.to_string(), password_hash);

        // A concurrent registration can still win between the lookups and
        // the insert; the store's constraint decides.
        match self.store.insert_identity(identity).await {
            Ok(identity) => Ok(identity),
            Err(DatabaseError::Duplicate(field)) => {
                Err(AppError::ConflictError(duplicate_message(&field)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Creates an identity and issues its first token. If issuing fails the
    /// identity is removed again.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<AuthGrant> {
        let identity = self.create_identity(username, email, password).await?;

        match self.tokens.issue(identity.id) {
            Ok(token) => {
                info!("Registered identity {} ({})", identity.id, identity.email);
                Ok(AuthGrant { token, user: identity.public() })
            }
            Err(e) => {
                error!("Token issuance failed for new identity {}: {}", identity.id, e);
                if let Err(rollback) = self.store.delete_identity(identity.id).await {
                    error!("Rollback of identity {} failed: {}", identity.id, rollback);
                }
                Err(e)
            }
        }
    }

    /// Checks `email`/`password` against the stored hash. Unknown email and
    /// wrong password produce the same error.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<Identity> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::ValidationError(
                "Please provide email and password".to_string(),
            ));
        }

        let identity = match self.store.find_by_email(email).await? {
            Some(identity) => identity,
            None => {
                let dummy = self
                    .dummy_hash
                    .get_or_try_init(|| hash_password("weatherguard-unused".to_string()))
                    .await?;
                verify_password(password.to_string(), dummy.clone()).await?;
                warn!("Login attempt for unknown email");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !verify_password(password.to_string(), identity.password_hash.clone()).await? {
            warn!("Login attempt with wrong password for identity {}", identity.id);
            return Err(AuthError::InvalidCredentials.into());
        }

        Ok(identity)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthGrant> {
        let identity = self.verify_credentials(email, password).await?;
        let token = self.tokens.issue(identity.id)?;
        Ok(AuthGrant { token, user: identity.public() })
    }

    pub async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>> {
        Ok(self.store.find_by_id(id).await?)
    }
}
