use std::sync::Arc;

use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use tracing::info;
use url::Url;

use super::session::error_from_response;
use super::{ClientError, SessionManager};

/// Makes protected calls on behalf of the current session.
///
/// All protected traffic goes through [`ApiClient::send_authorized`], so a
/// 401 anywhere ends the session in one place.
#[derive(Clone)]
pub struct ApiClient {
    session: Arc<SessionManager>,
}

impl ApiClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Current conditions for `city`, as the provider reported them.
    pub async fn get_weather(&self, city: &str) -> Result<Value, ClientError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(ClientError::Validation(
                "Please enter a city name to get weather information.".to_string(),
            ));
        }

        let mut url = self.session.config().endpoint("api/weather")?;
        url.query_pairs_mut().append_pair("city", city);

        let response = self.send_authorized(Method::GET, url).await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(error_from_response(
                status,
                &bytes,
                "Unable to fetch weather data. Please try again.",
            ));
        }

        serde_json::from_slice(&bytes).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// Sends `method url` with the session's bearer token. A 401 clears the
    /// session before the error is returned; transport failures leave it alone.
    pub async fn send_authorized(&self, method: Method, url: Url) -> Result<Response, ClientError> {
        let token = self.session.get_token().ok_or(ClientError::NotAuthenticated)?;

        let response = self
            .session
            .http()
            .request(method, url)
            .bearer_auth(&token)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if self.session.expire(&token).await {
                info!("Server rejected the session token; signed out");
            }
            return Err(ClientError::Unauthorized);
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::{KeyValueStore, MemoryStore, TOKEN_KEY};
    use crate::client::{ClientConfig, SessionPhase};
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn signed_in(url: &str, token: Option<&str>) -> (ApiClient, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        if let Some(token) = token {
            store.set(TOKEN_KEY, token).await.unwrap();
        }
        let session = SessionManager::new(ClientConfig::new(url).unwrap(), store.clone()).unwrap();
        session.initialize().await;
        (ApiClient::new(Arc::new(session)), store)
    }

    #[tokio::test]
    async fn test_weather_attaches_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/weather"))
            .and(query_param("city", "Paris"))
            .and(header("Authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "location": { "name": "Paris" },
                "current": { "temp_c": 18.0 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (api, _) = signed_in(&server.uri(), Some("tok-1")).await;
        let data = api.get_weather("  Paris ").await.unwrap();
        assert_eq!(data["location"]["name"], "Paris");
    }

    #[tokio::test]
    async fn test_unauthorized_response_logs_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/weather"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "error": "Not authorized. Invalid token." })),
            )
            .mount(&server)
            .await;

        let (api, store) = signed_in(&server.uri(), Some("stale")).await;
        let err = api.get_weather("Paris").await.unwrap_err();

        assert!(matches!(err, ClientError::Unauthorized));
        assert_eq!(api.session().phase(), SessionPhase::Anonymous);
        assert!(api.session().snapshot().expired);
        assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_server_errors_keep_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/weather"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "error": "No matching location found.", "code": 1006 })),
            )
            .mount(&server)
            .await;

        let (api, _) = signed_in(&server.uri(), Some("tok-1")).await;
        let err = api.get_weather("Atlantis").await.unwrap_err();

        assert!(matches!(err, ClientError::Server { status: 400, .. }));
        assert_eq!(err.to_string(), "No matching location found.");
        assert_eq!(api.session().get_token().as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_network_failure_keeps_session() {
        let (api, _) = signed_in("http://127.0.0.1:9", Some("tok-1")).await;
        let err = api.get_weather("Paris").await.unwrap_err();

        assert!(err.is_transport());
        assert_eq!(api.session().phase(), SessionPhase::Authenticated);
    }

    #[tokio::test]
    async fn test_anonymous_session_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (api, _) = signed_in(&server.uri(), None).await;
        assert!(matches!(api.get_weather("Paris").await, Err(ClientError::NotAuthenticated)));
        assert!(matches!(api.get_weather("  ").await, Err(ClientError::Validation(_))));
    }
}
