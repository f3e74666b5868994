use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::storage::{KeyValueStore, TOKEN_KEY};
use super::{ClientConfig, ClientError};

const MIN_PASSWORD_LENGTH: usize = 6;
const MISCONFIGURED_PREFIX: &str = "Server configuration error";

/// Snapshot of the signed-in user as returned by the last auth call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Initializing,
    Anonymous,
    Authenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    /// Absent after a restart until the next register/login.
    pub current_user: Option<CurrentUser>,
    pub loading_initial_session: bool,
    /// Set when the server rejected the token; the UI should ask the user to
    /// sign in again.
    pub expired: bool,
}

impl Session {
    fn initializing() -> Self {
        Self {
            token: None,
            current_user: None,
            loading_initial_session: true,
            expired: false,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if self.loading_initial_session {
            SessionPhase::Initializing
        } else if self.token.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Anonymous
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthPayload {
    token: Option<String>,
    user: Option<CurrentUser>,
}

/// Owns the device-local session.
///
/// Every register, login and logout takes a new generation number. A
/// register/login response is applied only if its generation is still the
/// latest when it arrives, so a slow earlier call can never overwrite a
/// newer session (or resurrect one after logout).
pub struct SessionManager {
    http: Client,
    config: ClientConfig,
    store: Arc<dyn KeyValueStore>,
    state: watch::Sender<Session>,
    generation: AtomicU64,
    // Held while persisting and publishing so storage and memory agree.
    commit: Mutex<()>,
}

impl SessionManager {
    pub fn new(config: ClientConfig, store: Arc<dyn KeyValueStore>) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;
        let (state, _) = watch::channel(Session::initializing());

        Ok(Self {
            http,
            config,
            store,
            state,
            generation: AtomicU64::new(0),
            commit: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase()
    }

    /// Token to attach to protected calls. `None` while initializing or
    /// signed out.
    pub fn get_token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    pub fn current_user(&self) -> Option<CurrentUser> {
        self.state.borrow().current_user.clone()
    }

    /// Reads the persisted token once at startup. A stored token is trusted
    /// as-is; the first protected call will reveal if it is stale.
    pub async fn initialize(&self) -> SessionPhase {
        let persisted = match self.store.get(TOKEN_KEY).await {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("Error checking token: {}", e);
                None
            }
        };

        let _commit = self.commit.lock().await;
        self.state.send_modify(|session| {
            if session.token.is_none() {
                session.token = persisted;
            }
            session.loading_initial_session = false;
        });

        let phase = self.phase();
        info!("Session initialized as {:?}", phase);
        phase
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<CurrentUser, ClientError> {
        let (username, email) = (username.trim(), email.trim());
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(ClientError::Validation("Please fill in all fields".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ClientError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let body = json!({ "username": username, "email": email, "password": password });
        self.authenticate("api/auth/register", body, "Registration failed").await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<CurrentUser, ClientError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ClientError::Validation("Please enter email and password".to_string()));
        }

        let body = json!({ "email": email, "password": password });
        self.authenticate("api/auth/login", body, "Login failed").await
    }

    /// Clears the in-memory session first, then the persisted token.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let _commit = self.commit.lock().await;

        self.state.send_modify(|session| {
            session.token = None;
            session.current_user = None;
            session.expired = false;
        });
        info!("Logged out");

        self.store.remove(TOKEN_KEY).await.map_err(|e| {
            warn!("Logout error: {}", e);
            e
        })
    }

    /// Implicit logout after the server rejected `rejected_token`. Does
    /// nothing if the session has since moved on to another token.
    pub async fn expire(&self, rejected_token: &str) -> bool {
        let _commit = self.commit.lock().await;

        let still_current = self.state.borrow().token.as_deref() == Some(rejected_token);
        if !still_current {
            debug!("Ignoring rejection of a token that is no longer current");
            return false;
        }

        self.state.send_modify(|session| {
            session.token = None;
            session.current_user = None;
            session.expired = true;
        });
        info!("Session expired; re-authentication required");

        if let Err(e) = self.store.remove(TOKEN_KEY).await {
            warn!("Failed to clear persisted token after rejection: {}", e);
        }
        true
    }

    async fn authenticate(&self, path: &str, body: Value, fallback: &str) -> Result<CurrentUser, ClientError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let url = self.config.endpoint(path)?;

        let exchange = async {
            let response = self.http.post(url).json(&body).send().await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            Ok::<_, ClientError>((status, bytes))
        };

        let (status, bytes) = tokio::time::timeout(self.config.request_timeout, exchange)
            .await
            .map_err(|_| {
                warn!("{} timed out after {:?}", path, self.config.request_timeout);
                ClientError::Timeout
            })??;

        if !status.is_success() {
            return Err(error_from_response(status, &bytes, fallback));
        }

        let payload: AuthPayload = serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        let token = payload
            .token
            .filter(|t| !t.is_empty())
            .ok_or(ClientError::MissingToken)?;
        let user = payload
            .user
            .ok_or_else(|| ClientError::InvalidResponse("response has no user".to_string()))?;

        let _commit = self.commit.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Discarding superseded response from {}", path);
            return Err(ClientError::Superseded);
        }

        self.store.set(TOKEN_KEY, &token).await?;
        let snapshot = user.clone();
        self.state.send_modify(|session| {
            session.token = Some(token);
            session.current_user = Some(snapshot);
            session.loading_initial_session = false;
            session.expired = false;
        });
        info!("Authenticated as {}", user.username);

        Ok(user)
    }
}

/// Uses the server's `error` text verbatim when there is one.
pub(crate) fn error_from_response(status: StatusCode, body: &[u8], fallback: &str) -> ClientError {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .filter(|m| !m.is_empty());

    match message {
        Some(message) if message.starts_with(MISCONFIGURED_PREFIX) => {
            ClientError::ServerMisconfigured(message)
        }
        Some(message) => ClientError::Server { status: status.as_u16(), message },
        None => ClientError::Server { status: status.as_u16(), message: fallback.to_string() },
    }
}
