use std::sync::Arc;

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use tracing::warn;

use crate::auth::session::{AccessDetails, SessionManager};
use crate::error::{AppError, AuthError};
use crate::AppState;

/// Pull the credential out of an `Authorization` header value.
///
/// Accepts `Bearer <token>` and a bare `<token>`; anything else yields `None`.
pub fn extract_token(header: Option<&str>) -> Option<&str> {
    let mut parts = header?.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(token), None, None) => Some(token),
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Some(token),
        _ => None,
    }
}

/// Entry point for the HTTP layer: bearer credential in, caller identity out.
#[derive(Clone)]
pub struct RequestAuthenticator {
    sessions: Arc<SessionManager>,
}

impl RequestAuthenticator {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    pub async fn authenticate(&self, req: &HttpRequest) -> Result<AccessDetails, AuthError> {
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        self.authenticate_header(header).await
    }

    /// Every failure cause collapses into `Unauthenticated`; the cause is only logged.
    pub async fn authenticate_header(&self, header: Option<&str>) -> Result<AccessDetails, AuthError> {
        self.check(header).await.map_err(|cause| {
            warn!("Rejected bearer credential: {}", cause);
            AuthError::Unauthenticated
        })
    }

    async fn check(&self, header: Option<&str>) -> Result<AccessDetails, AuthError> {
        let token = extract_token(header)
            .ok_or_else(|| AuthError::Malformed("missing bearer token".into()))?;

        let (session_id, claimed_subject) = self.sessions.codec().verify_access(token)?;
        let subject_id = self.sessions.resolve(&session_id).await?;

        if subject_id != claimed_subject {
            return Err(AuthError::Malformed(format!(
                "session {} belongs to another subject",
                session_id
            )));
        }

        Ok(AccessDetails {
            session_id,
            subject_id,
        })
    }
}

impl FromRequest for AccessDetails {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let state = req
                .app_data::<web::Data<AppState>>()
                .ok_or_else(|| AppError::InternalError("application state is not configured".into()))?;
            let details = state.authenticator.authenticate(&req).await?;
            Ok(details)
        })
    }
}
