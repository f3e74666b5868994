//! Access guard for protected routes.
//!
//! Wrap a route with `from_fn(require_auth)`; handlers behind it take an
//! [`AuthenticatedUser`] argument.

use actix_web::body::MessageBody;
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::http::header::AUTHORIZATION;
use actix_web::middleware::Next;
use actix_web::{web, Error, FromRequest, HttpMessage, HttpRequest, ResponseError};
use futures::future::{ready, Ready};
use tracing::{debug, error, warn};

use crate::db::models::PublicUser;
use crate::error::{AppError, AuthError};
use crate::AppState;

/// The identity resolved by the guard, without its password hash.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub PublicUser);

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthenticatedUser>()
                .cloned()
                .ok_or(AppError::AuthError(AuthError::MissingToken)),
        )
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Verifies the bearer credential and resolves it to a live identity.
pub async fn authorize(state: &AppState, header: Option<&str>) -> Result<PublicUser, AppError> {
    let token = bearer_token(header).ok_or(AuthError::MissingToken)?;

    let identity_id = state.auth_service.tokens().verify(token).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        AppError::AuthError(e)
    })?;

    match state.auth_service.find_identity(identity_id).await {
        Ok(Some(identity)) => Ok(identity.public()),
        Ok(None) => {
            warn!("Token presented for missing identity {}", identity_id);
            Err(AuthError::UserNotFound.into())
        }
        Err(e) => {
            error!("Identity lookup failed during authentication: {}", e);
            Err(AppError::InternalError("Server error during authentication".to_string()))
        }
    }
}

pub async fn require_auth(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
        let err = AppError::InternalError("application state is not registered".to_string());
        return Ok(req.into_response(err.error_response()).map_into_right_body());
    };

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    match authorize(&state, header.as_deref()).await {
        Ok(user) => {
            req.extensions_mut().insert(AuthenticatedUser(user));
            next.call(req).await.map(ServiceResponse::map_into_left_body)
        }
        Err(err) => Ok(req.into_response(err.error_response()).map_into_right_body()),
    }
}
