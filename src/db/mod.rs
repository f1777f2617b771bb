//! Login collaborator
//!
//! Resolves login credentials to a subject. This is the only place the
//! session core reaches into durable storage, and only at login.

pub mod models;
pub mod operations;
pub mod security;

use async_trait::async_trait;

use crate::error::AppError;

pub use models::{LoginCredentials, PublicUser, UserRecord};
pub use operations::DbOperations;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `AuthError::InvalidCredentials` for an unknown email or a wrong password.
    async fn resolve_subject_by_credentials(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<PublicUser, AppError>;
}
