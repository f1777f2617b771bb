use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;

use crate::db::models::{LoginCredentials, PublicUser, UserRecord};
use crate::db::security::verify_password;
use crate::db::UserDirectory;
use crate::error::{AppError, AuthError, DatabaseError};

/// Soft-deleted accounts cannot log in.
const USER_BY_EMAIL: &str = "SELECT id, first_name, last_name, email, password FROM users \
     WHERE email = $1 AND deleted_at IS NULL";

pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(self.pool.as_ref())
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let user = sqlx::query_as::<_, UserRecord>(USER_BY_EMAIL)
            .bind(email)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }
}

#[async_trait]
impl UserDirectory for DbOperations {
    async fn resolve_subject_by_credentials(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<PublicUser, AppError> {
        let record = self
            .get_user_by_email(credentials.email.trim())
            .await?
            .ok_or_else(|| {
                debug!("No user with email {}", credentials.email);
                AuthError::InvalidCredentials
            })?;

        if !verify_password(&record.password, &credentials.password)? {
            return Err(AuthError::InvalidCredentials.into());
        }

        Ok(PublicUser::try_from(record)?)
    }
}
