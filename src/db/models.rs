use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AppError, DatabaseError};

#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// PHC-formatted argon2 hash.
    pub password: String,
}

/// The subject fields that may leave the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
}

impl TryFrom<UserRecord> for PublicUser {
    type Error = DatabaseError;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        let id = u64::try_from(record.id)
            .map_err(|_| DatabaseError::QueryError(format!("negative user id {}", record.id)))?;

        Ok(Self {
            id,
            first_name: record.first_name,
            last_name: record.last_name,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut problems = Vec::new();

        let email = self.email.trim();
        if email.is_empty() {
            problems.push("email is required");
        } else if !is_plausible_email(email) {
            problems.push("please provide a valid email");
        }
        if self.password.is_empty() {
            problems.push("password is required");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationError(problems.join(", ")))
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}
