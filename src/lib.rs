pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod weather;

use std::sync::Arc;
use std::time::Duration;
use actix_web::middleware::from_fn;
use actix_web::{web, HttpResponse};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, TokenIssuer};
pub use db::{CredentialStore, Identity, MemoryCredentialStore, PgCredentialStore, PublicUser};
pub use weather::WeatherClient;

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "OK",
        "message": "Server is running",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({ "error": "Route not found" }))
}

/// Registers every route. Expects `web::Data<AppState>` on the app.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        AppError::ValidationError(format!("Invalid request body: {}", err)).into()
    });
    let query_config = web::QueryConfig::default().error_handler(|err, _req| {
        AppError::ValidationError(format!("Invalid query string: {}", err)).into()
    });

    // Resources answer unmatched methods themselves, so each one needs the
    // 404 fallback too.
    cfg.app_data(json_config)
        .app_data(query_config)
        .service(
            web::resource("/health")
                .route(web::get().to(health_check))
                .default_service(web::to(not_found)),
        )
        .service(
            web::scope("/api")
                .service(
                    web::resource("/auth/register")
                        .route(web::post().to(auth::handlers::register))
                        .default_service(web::to(not_found)),
                )
                .service(
                    web::resource("/auth/login")
                        .route(web::post().to(auth::handlers::login))
                        .default_service(web::to(not_found)),
                )
                .service(
                    web::resource("/weather")
                        .route(
                            web::get()
                                .to(weather::handlers::get_weather)
                                .wrap(from_fn(auth::require_auth)),
                        )
                        .default_service(web::to(not_found)),
                ),
        )
        .default_service(web::to(not_found));
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub auth_service: Arc<AuthService>,
    pub weather: Arc<WeatherClient>,
}

impl AppState {
    /// Connects to Postgres and applies migrations.
    pub async fn new(config: Settings) -> Result<Self> {
        let store = PgCredentialStore::new_with_options(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(5),
        )
        .await?;
        store.migrate().await?;

        Self::with_store(config, Arc::new(store))
    }

    pub fn with_store(config: Settings, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let tokens = TokenIssuer::new(config.auth.jwt_secret.clone(), config.auth.token_lifetime());
        let weather = WeatherClient::new(&config.weather)?;

        Ok(Self {
            config: Arc::new(config),
            auth_service: Arc::new(AuthService::new(store, tokens)),
            weather: Arc::new(weather),
        })
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.auth_service.store().close().await;
        Ok(())
    }
}
