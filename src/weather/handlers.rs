use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::info;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::AppState;
use crate::Result;

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub city: Option<String>,
}

pub async fn get_weather(
    user: AuthenticatedUser,
    query: web::Query<WeatherQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let city = query
        .city
        .as_deref()
        .map(str::trim)
        .filter(|city| !city.is_empty())
        .ok_or_else(|| {
            AppError::ValidationError(
                "City query parameter is required. Example: /api/weather?city=London".to_string(),
            )
        })?;

    info!("Weather lookup for {} by {}", city, user.0.username);
    let data = state.weather.current(city).await?;
    Ok(HttpResponse::Ok().json(data))
}
