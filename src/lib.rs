pub mod auth;
pub mod config;
pub mod db;
pub mod error;

use std::sync::Arc;
use actix_web::{web, HttpResponse};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AccessDetails, RequestAuthenticator, SessionManager, TokenCodec};
pub use db::{DbOperations, UserDirectory};

use auth::{RedisSessionStore, SessionStore, SystemClock};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Registers the health and `/auth` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(auth::handlers::json_config())
        .route("/health", web::get().to(health_check))
        .service(
            web::scope("/auth")
                .route("/login", web::post().to(auth::handlers::login))
                .route("/logout", web::post().to(auth::handlers::logout))
                .route("/refresh", web::post().to(auth::handlers::refresh)),
        );
}

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub sessions: Arc<SessionManager>,
    pub authenticator: RequestAuthenticator,
    pub users: Arc<dyn UserDirectory>,
}

impl AppState {
    /// Connects the session store and the user database named in `config`.
    pub async fn new(config: Settings) -> Result<Self> {
        let store = RedisSessionStore::connect(&config.redis.url).await?;

        let users = DbOperations::new_with_options(
            &config.database.url,
            config.database.max_connections,
            config.database.acquire_timeout(),
        )
        .await?;
        users.run_migrations().await?;

        let codec = TokenCodec::from_config(&config.auth, Arc::new(SystemClock));
        Ok(Self::from_parts(config, codec, Arc::new(store), Arc::new(users)))
    }

    pub fn from_parts(
        config: Settings,
        codec: TokenCodec,
        store: Arc<dyn SessionStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(
            codec,
            store,
            config.redis.operation_timeout(),
        ));

        Self {
            config: Arc::new(config),
            authenticator: RequestAuthenticator::new(sessions.clone()),
            sessions,
            users,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemorySessionStore;
    use crate::db::{LoginCredentials, PublicUser};

    struct NoUsers;

    #[async_trait::async_trait]
    impl UserDirectory for NoUsers {
        async fn resolve_subject_by_credentials(&self, _: &LoginCredentials) -> Result<PublicUser> {
            Err(error::AuthError::InvalidCredentials.into())
        }
    }

    #[tokio::test]
    async fn test_app_state_creation_rejects_bad_store_url() {
        let mut config = Settings::new_for_test().expect("Failed to load test config");
        config.redis.url = "not-a-redis-url".to_string();

        let state = AppState::new(config).await;
        assert!(matches!(state, Err(AppError::StoreError(_))));
    }

    #[tokio::test]
    async fn test_app_state_clone() {
        let config = Settings::new_for_test().expect("Failed to load test config");
        let codec = TokenCodec::from_config(&config.auth, Arc::new(SystemClock));
        let state = AppState::from_parts(
            config,
            codec,
            Arc::new(MemorySessionStore::new()),
            Arc::new(NoUsers),
        );

        let cloned = state.clone();

        // Verify Arc references are shared
        assert!(Arc::ptr_eq(&state.config, &cloned.config));
        assert!(Arc::ptr_eq(&state.sessions, &cloned.sessions));
    }
}
