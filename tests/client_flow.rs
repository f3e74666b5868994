mod common;

use std::net::TcpListener;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use serde_json::json;
use weatherguard::client::{
    ApiClient, ClientConfig, ClientError, FileStore, KeyValueStore, SessionManager, SessionPhase, TOKEN_KEY,
};
use weatherguard::{configure_routes, CredentialStore, MemoryCredentialStore};
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves the full route table on an ephemeral port and returns its base URL.
fn spawn_backend(weather_url: &str) -> (String, Arc<MemoryCredentialStore>) {
    let (state, store) = common::test_state(common::settings_with_weather(weather_url));
    let state = web::Data::new(state);

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().unwrap().port();
    let server = HttpServer::new(move || App::new().app_data(state.clone()).configure(configure_routes))
        .listen(listener)
        .expect("Failed to listen")
        .workers(1)
        .run();
    actix_web::rt::spawn(server);

    (format!("http://127.0.0.1:{}", port), store)
}

async fn provider() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("q", "Paris"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "location": { "name": "Paris" },
            "current": { "temp_c": 18.0 }
        })))
        .mount(&server)
        .await;
    server
}

#[actix_web::test]
async fn test_session_lifecycle_against_backend() {
    let upstream = provider().await;
    let (backend, store) = spawn_backend(&upstream.uri());
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FileStore::new(dir.path().join("storage.json")));

    let session = Arc::new(SessionManager::new(ClientConfig::new(&backend).unwrap(), storage.clone()).unwrap());
    assert_eq!(session.initialize().await, SessionPhase::Anonymous);

    let user = session.register("ada", "ada@x.com", "secret1").await.unwrap();
    assert_eq!(user.username, "ada");
    assert_eq!(session.phase(), SessionPhase::Authenticated);

    let err = session.register("ada2", "ada@x.com", "secret1").await.unwrap_err();
    assert_eq!(err.to_string(), "Email already exists");
    assert_eq!(session.current_user().map(|u| u.email), Some("ada@x.com".to_string()));

    let err = session.login("ada@x.com", "wrong-password").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid email or password");

    session.login("ada@x.com", "secret1").await.unwrap();
    let token = session.get_token().unwrap();
    assert_eq!(storage.get(TOKEN_KEY).await.unwrap(), Some(token.clone()));

    let api = ApiClient::new(session.clone());
    let data = api.get_weather("Paris").await.unwrap();
    assert_eq!(data["location"]["name"], "Paris");

    // A fresh manager over the same storage comes back signed in.
    let restarted = Arc::new(SessionManager::new(ClientConfig::new(&backend).unwrap(), storage.clone()).unwrap());
    assert_eq!(restarted.initialize().await, SessionPhase::Authenticated);
    assert_eq!(restarted.get_token(), Some(token));
    assert_eq!(restarted.current_user(), None);

    let id = store.find_by_email("ada@x.com").await.unwrap().unwrap().id;
    store.delete_identity(id).await.unwrap();

    let err = ApiClient::new(restarted.clone()).get_weather("Paris").await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized));
    assert_eq!(restarted.phase(), SessionPhase::Anonymous);
    assert!(restarted.snapshot().expired);
    assert_eq!(storage.get(TOKEN_KEY).await.unwrap(), None);
}

#[actix_web::test]
async fn test_logout_then_protected_call() {
    let upstream = provider().await;
    let (backend, _) = spawn_backend(&upstream.uri());
    let storage = Arc::new(weatherguard::client::MemoryStore::new());

    let session = Arc::new(SessionManager::new(ClientConfig::new(&backend).unwrap(), storage.clone()).unwrap());
    session.initialize().await;
    session.register("bob", "bob@x.com", "secret1").await.unwrap();

    session.logout().await.unwrap();
    assert_eq!(session.phase(), SessionPhase::Anonymous);
    assert!(!session.snapshot().expired);

    let err = ApiClient::new(session).get_weather("Paris").await.unwrap_err();
    assert!(matches!(err, ClientError::NotAuthenticated));
}
