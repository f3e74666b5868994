//! Client-side session handling for the mobile app.
//!
//! A [`SessionManager`] owns the bearer token and current-user snapshot and
//! is the only writer of that state. Screens hold an `Arc<SessionManager>`
//! (or a `watch::Receiver<Session>` from [`SessionManager::subscribe`]) and
//! make protected calls through an [`ApiClient`], which turns a 401 into an
//! implicit logout.

mod api;
mod error;
mod session;
pub mod storage;

pub use api::ApiClient;
pub use error::ClientError;
pub use session::{CurrentUser, Session, SessionManager, SessionPhase};
pub use storage::{FileStore, KeyValueStore, MemoryStore, TOKEN_KEY};

use std::time::Duration;
use url::Url;

/// Bound on register/login round trips.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend_url: Url,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(backend_url: &str) -> Result<Self, ClientError> {
        let mut backend_url = Url::parse(backend_url)
            .map_err(|e| ClientError::Config(format!("invalid backend URL {}: {}", backend_url, e)))?;
        // Endpoints are joined relative to the base, which needs a trailing slash.
        if !backend_url.path().ends_with('/') {
            let path = format!("{}/", backend_url.path());
            backend_url.set_path(&path);
        }

        Ok(Self {
            backend_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.backend_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::Config(format!("invalid endpoint {}: {}", path, e)))
    }
}
