//! Store keys for the two session records of a credential pair.
//!
//! The refresh key is derived from the access key and the subject so that a
//! logout holding only the access credential can find the refresh record
//! without a reverse index.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

const COMPOSITE_SEPARATOR: &str = "++";

/// Identifier of one access session (random v4 UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessSessionId(Uuid);

impl AccessSessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// The refresh record key paired with this access session.
    pub fn refresh_for(&self, subject_id: u64) -> RefreshSessionId {
        RefreshSessionId::new(*self, subject_id)
    }
}

impl fmt::Display for AccessSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for AccessSessionId {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| AuthError::Malformed(format!("access session id: {}", e)))
    }
}

/// Composite key `<access>++<subject>` naming the refresh record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefreshSessionId {
    access: AccessSessionId,
    subject_id: u64,
}

impl RefreshSessionId {
    pub fn new(access: AccessSessionId, subject_id: u64) -> Self {
        Self { access, subject_id }
    }

    pub fn access(&self) -> AccessSessionId {
        self.access
    }

    pub fn subject_id(&self) -> u64 {
        self.subject_id
    }
}

impl fmt::Display for RefreshSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.access, COMPOSITE_SEPARATOR, self.subject_id)
    }
}

impl FromStr for RefreshSessionId {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (access, subject) = s
            .rsplit_once(COMPOSITE_SEPARATOR)
            .ok_or_else(|| AuthError::Malformed("refresh session id without separator".into()))?;

        let subject_id = subject
            .parse::<u64>()
            .map_err(|e| AuthError::Malformed(format!("refresh session subject: {}", e)))?;

        Ok(Self {
            access: access.parse()?,
            subject_id,
        })
    }
}
