//! Session lifecycle: issue, resolve, revoke and rotate credential pairs.
//!
//! A session is `Active` while both of its records are in the store. It leaves
//! that state through `revoke` (both records deleted), `rotate` (refresh record
//! deleted, a new pair issued) or silently through store TTL expiry. This type
//! is the only writer of session records and keeps no state of its own, so
//! concurrent requests only race on single-key store operations.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::auth::session_id::{AccessSessionId, RefreshSessionId};
use crate::auth::store::SessionStore;
use crate::auth::token::{TokenCodec, TokenDetails};
use crate::error::{AuthError, StoreError};

/// The caller identity behind a live access credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDetails {
    pub session_id: AccessSessionId,
    pub subject_id: u64,
}

pub struct SessionManager {
    codec: TokenCodec,
    store: Arc<dyn SessionStore>,
    store_timeout: Duration,
}

impl SessionManager {
    pub fn new(codec: TokenCodec, store: Arc<dyn SessionStore>, store_timeout: Duration) -> Self {
        Self {
            codec,
            store,
            store_timeout,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Mint a credential pair for `subject_id` and persist both session records.
    ///
    /// A failed second `put` leaves the first record behind; it names the same
    /// subject and lapses with its own TTL.
    pub async fn issue(&self, subject_id: u64) -> Result<TokenDetails, AuthError> {
        let details = self.codec.issue(subject_id)?;

        let access_key = details.access_uuid.to_string();
        self.bounded("put access", self.store.put(&access_key, subject_id, details.access_ttl()))
            .await?;

        let refresh_key = details.refresh_uuid.to_string();
        self.bounded("put refresh", self.store.put(&refresh_key, subject_id, details.refresh_ttl()))
            .await?;

        info!(
            subject_id,
            session_id = %details.access_uuid,
            "Issued session"
        );
        Ok(details)
    }

    /// Subject owning a live access session. Revoked, expired and unknown
    /// sessions are all `SessionNotFound`.
    pub async fn resolve(&self, session_id: &AccessSessionId) -> Result<u64, AuthError> {
        let key = session_id.to_string();
        match self.bounded("get", self.store.get(&key)).await? {
            Some(subject_id) => Ok(subject_id),
            None => {
                debug!(session_id = %session_id, "Session not found");
                Err(AuthError::SessionNotFound)
            }
        }
    }

    /// Logout: delete the access record and its paired refresh record.
    ///
    /// Both deletes are attempted. Anything short of exactly one removal on each
    /// side is `RevocationFailed`, even though the side that did go stays gone.
    pub async fn revoke(&self, access: &AccessDetails) -> Result<(), AuthError> {
        let access_key = access.session_id.to_string();
        let refresh_key = access.session_id.refresh_for(access.subject_id).to_string();

        let access_deleted = self.bounded("delete access", self.store.delete(&access_key)).await?;
        let refresh_deleted = self
            .bounded("delete refresh", self.store.delete(&refresh_key))
            .await?;

        if access_deleted != 1 || refresh_deleted != 1 {
            warn!(
                session_id = %access.session_id,
                access_deleted,
                refresh_deleted,
                "Partial session revocation"
            );
            return Err(AuthError::RevocationFailed {
                access_deleted,
                refresh_deleted,
            });
        }

        info!(session_id = %access.session_id, subject_id = access.subject_id, "Revoked session");
        Ok(())
    }

    /// Consume a refresh session and issue a new pair for the same subject.
    ///
    /// The store's atomic delete makes this exactly-once: of any number of
    /// concurrent calls with the same id, one observes a removal and the rest
    /// fail with `RotationFailed`. The old access record is left to its TTL.
    pub async fn rotate(&self, refresh: &RefreshSessionId) -> Result<TokenDetails, AuthError> {
        let subject_id = self.consume(refresh).await?;
        self.reissue(refresh, subject_id).await
    }

    /// First half of `rotate`: delete the refresh record and hand back its
    /// subject. Nothing has been issued when this fails.
    pub async fn consume(&self, refresh: &RefreshSessionId) -> Result<u64, AuthError> {
        let key = refresh.to_string();
        let deleted = self.bounded("delete refresh", self.store.delete(&key)).await?;
        if deleted != 1 {
            warn!(refresh_session = %refresh, deleted, "Refresh session already consumed or expired");
            return Err(AuthError::RotationFailed { deleted });
        }
        Ok(refresh.subject_id())
    }

    /// Second half of `rotate`: a fresh pair for the subject of a consumed
    /// refresh session.
    pub async fn reissue(
        &self,
        consumed: &RefreshSessionId,
        subject_id: u64,
    ) -> Result<TokenDetails, AuthError> {
        let details = self.issue(subject_id).await?;
        info!(
            subject_id,
            previous = %consumed.access(),
            session_id = %details.access_uuid,
            "Rotated session"
        );
        Ok(details)
    }

    /// Verify a refresh credential and rotate the session it names.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenDetails, AuthError> {
        let refresh = self.codec.verify_refresh(refresh_token)?;
        self.rotate(&refresh).await
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!("Session store {} failed: {}", op, e);
                Err(AuthError::StoreUnavailable(e.to_string()))
            }
            Err(_) => {
                warn!("Session store {} timed out after {:?}", op, self.store_timeout);
                Err(AuthError::StoreUnavailable(format!("{} timed out", op)))
            }
        }
    }
}
