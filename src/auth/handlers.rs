use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::auth::session::AccessDetails;
use crate::db::models::LoginCredentials;
use crate::error::{AppError, AuthError};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Unreadable JSON bodies are rejected as 422 rather than actix's default 400.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
        AppError::ValidationError(format!("invalid json provided: {}", err)).into()
    })
}

pub async fn login(
    req: web::Json<LoginCredentials>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received login request for email: {}", req.email);
    req.validate()?;

    let user = match state.users.resolve_subject_by_credentials(&req).await {
        Ok(user) => user,
        Err(e) => {
            warn!("Login failed for email: {}: {}", req.email, e);
            return Err(e);
        }
    };

    let details = state.sessions.issue(user.id).await.map_err(|e| {
        error!("Could not open session for user {}: {}", user.id, e);
        match e {
            AuthError::SigningError(_) => AppError::ValidationError(format!("token error: {}", e)),
            other => AppError::InternalError(other.to_string()),
        }
    })?;

    info!("Login successful for user {}", user.id);
    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token: details.access_token,
        refresh_token: details.refresh_token,
        id: user.id,
        first_name: user.first_name,
        last_name: user.last_name,
    }))
}

pub async fn logout(
    access: AccessDetails,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if let Err(e) = state.sessions.revoke(&access).await {
        warn!("Logout for user {} failed: {}", access.subject_id, e);
        return Err(AuthError::Unauthenticated.into());
    }

    Ok(HttpResponse::Ok().json("Successfully logged out"))
}

pub async fn refresh(
    req: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let refresh = state
        .sessions
        .codec()
        .verify_refresh(&req.refresh_token)
        .map_err(|e| {
            warn!("Refresh token rejected: {}", e);
            e
        })?;

    // Store failure while consuming is 401; only reissue failures are 403
    let subject_id = state.sessions.consume(&refresh).await.map_err(|e| match e {
        AuthError::RotationFailed { .. } => AppError::AuthError(e),
        other => {
            warn!("Consuming refresh session for user {} failed: {}", refresh.subject_id(), other);
            AppError::AuthError(AuthError::Unauthenticated)
        }
    })?;

    let details = state
        .sessions
        .reissue(&refresh, subject_id)
        .await
        .map_err(|e| {
            error!("Reissue after rotation failed for user {}: {}", subject_id, e);
            AppError::Forbidden(e.to_string())
        })?;

    Ok(HttpResponse::Created().json(TokenPair {
        access_token: details.access_token,
        refresh_token: details.refresh_token,
    }))
}
