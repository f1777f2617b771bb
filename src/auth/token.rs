use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::clock::{Clock, SystemClock};
use crate::auth::session_id::{AccessSessionId, RefreshSessionId};
use crate::config::AuthConfig;
use crate::error::AuthError;

/// Lifetime of an access credential in seconds (15 minutes).
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
/// Lifetime of a refresh credential in seconds (7 days).
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    authorized: bool,
    access_uuid: String,
    user_id: u64,
    exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RefreshClaims {
    refresh_uuid: String,
    user_id: u64,
    exp: i64,
}

/// Everything produced by one issuance: the two signed strings and the
/// metadata needed to persist their session records.
#[derive(Debug, Clone)]
pub struct TokenDetails {
    pub subject_id: u64,
    pub access_token: String,
    pub refresh_token: String,
    pub access_uuid: AccessSessionId,
    pub refresh_uuid: RefreshSessionId,
    pub issued_at: DateTime<Utc>,
    pub at_expires: DateTime<Utc>,
    pub rt_expires: DateTime<Utc>,
}

impl TokenDetails {
    /// Store TTL of the access record, measured from the issuance instant.
    pub fn access_ttl(&self) -> std::time::Duration {
        (self.at_expires - self.issued_at).to_std().unwrap_or_default()
    }

    pub fn refresh_ttl(&self) -> std::time::Duration {
        (self.rt_expires - self.issued_at).to_std().unwrap_or_default()
    }
}

/// Session named by a verified credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRef {
    Access(AccessSessionId),
    Refresh(RefreshSessionId),
}

/// Decoded claims of a credential whose signature and expiry checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject_id: u64,
    pub session: SessionRef,
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    pub fn kind(&self) -> TokenKind {
        match self.session {
            SessionRef::Access(_) => TokenKind::Access,
            SessionRef::Refresh(_) => TokenKind::Refresh,
        }
    }
}

/// Signs and verifies HS256 credentials. Never touches the session store.
#[derive(Clone)]
pub struct TokenCodec {
    access_secret: Option<String>,
    refresh_secret: Option<String>,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(access_secret: Option<String>, refresh_secret: Option<String>) -> Self {
        Self::with_clock(access_secret, refresh_secret, Arc::new(SystemClock))
    }

    pub fn with_clock(
        access_secret: Option<String>,
        refresh_secret: Option<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            access_secret,
            refresh_secret,
            clock,
        }
    }

    pub fn from_config(config: &AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_clock(config.access_secret.clone(), config.refresh_secret.clone(), clock)
    }

    pub fn issue(&self, subject_id: u64) -> Result<TokenDetails, AuthError> {
        let issued_at = self.clock.now();
        let at_expires = issued_at + Duration::seconds(ACCESS_TOKEN_TTL_SECS);
        let rt_expires = issued_at + Duration::seconds(REFRESH_TOKEN_TTL_SECS);

        let access_uuid = AccessSessionId::generate();
        let refresh_uuid = access_uuid.refresh_for(subject_id);

        let access_claims = AccessClaims {
            authorized: true,
            access_uuid: access_uuid.to_string(),
            user_id: subject_id,
            exp: at_expires.timestamp(),
        };
        let access_token = self.sign(&access_claims, TokenKind::Access)?;

        let refresh_claims = RefreshClaims {
            refresh_uuid: refresh_uuid.to_string(),
            user_id: subject_id,
            exp: rt_expires.timestamp(),
        };
        let refresh_token = self.sign(&refresh_claims, TokenKind::Refresh)?;

        Ok(TokenDetails {
            subject_id,
            access_token,
            refresh_token,
            access_uuid,
            refresh_uuid,
            issued_at,
            at_expires,
            rt_expires,
        })
    }

    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        match kind {
            TokenKind::Access => {
                let claims: AccessClaims = self.decode_checked(token, kind)?;
                if !claims.authorized {
                    return Err(AuthError::Malformed("access token is not authorized".into()));
                }
                Ok(Claims {
                    subject_id: claims.user_id,
                    session: SessionRef::Access(claims.access_uuid.parse()?),
                    expires_at: timestamp(claims.exp)?,
                })
            }
            TokenKind::Refresh => {
                let claims: RefreshClaims = self.decode_checked(token, kind)?;
                let refresh_uuid: RefreshSessionId = claims.refresh_uuid.parse()?;
                if refresh_uuid.subject_id() != claims.user_id {
                    return Err(AuthError::Malformed(
                        "refresh session does not belong to user_id".into(),
                    ));
                }
                Ok(Claims {
                    subject_id: claims.user_id,
                    session: SessionRef::Refresh(refresh_uuid),
                    expires_at: timestamp(claims.exp)?,
                })
            }
        }
    }

    /// Verify an access credential and return the session it names.
    pub fn verify_access(&self, token: &str) -> Result<(AccessSessionId, u64), AuthError> {
        let claims = self.verify(token, TokenKind::Access)?;
        match claims.session {
            SessionRef::Access(id) => Ok((id, claims.subject_id)),
            SessionRef::Refresh(_) => Err(AuthError::Malformed("expected an access token".into())),
        }
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshSessionId, AuthError> {
        let claims = self.verify(token, TokenKind::Refresh)?;
        match claims.session {
            SessionRef::Refresh(id) => Ok(id),
            SessionRef::Access(_) => Err(AuthError::Malformed("expected a refresh token".into())),
        }
    }

    fn secret(&self, kind: TokenKind) -> Result<&[u8], AuthError> {
        let (secret, name) = match kind {
            TokenKind::Access => (&self.access_secret, "ACCESS_SECRET"),
            TokenKind::Refresh => (&self.refresh_secret, "REFRESH_SECRET"),
        };
        secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::as_bytes)
            .ok_or_else(|| AuthError::SigningError(format!("{} is not set", name)))
    }

    fn sign<T: Serialize>(&self, claims: &T, kind: TokenKind) -> Result<String, AuthError> {
        let key = EncodingKey::from_secret(self.secret(kind)?);
        encode(&Header::new(Algorithm::HS256), claims, &key)
            .map_err(|e| AuthError::SigningError(e.to_string()))
    }

    fn decode_checked<T>(&self, token: &str, kind: TokenKind) -> Result<T, AuthError>
    where
        T: DeserializeOwned + HasExpiry,
    {
        let key = DecodingKey::from_secret(self.secret(kind)?);

        // `exp` stays a required claim; the comparison itself runs against our clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<T>(token, &key, &validation).map_err(|e| {
            debug!("Rejected {:?} token: {}", kind, e);
            AuthError::from(e)
        })?;

        if self.clock.now().timestamp() > data.claims.exp() {
            return Err(AuthError::Expired);
        }

        Ok(data.claims)
    }
}

trait HasExpiry {
    fn exp(&self) -> i64;
}

impl HasExpiry for AccessClaims {
    fn exp(&self) -> i64 {
        self.exp
    }
}

impl HasExpiry for RefreshClaims {
    fn exp(&self) -> i64 {
        self.exp
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, AuthError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| AuthError::Malformed(format!("exp out of range: {}", secs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use serde_json::json;

    fn codec_with(clock: &ManualClock) -> TokenCodec {
        TokenCodec::with_clock(
            Some("access-secret".into()),
            Some("refresh-secret".into()),
            Arc::new(clock.clone()),
        )
    }

    fn sign_raw(payload: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_sets_policy_lifetimes() {
        let clock = ManualClock::default();
        let details = codec_with(&clock).issue(42).unwrap();

        assert_eq!(details.access_ttl().as_secs(), 900);
        assert_eq!(details.refresh_ttl().as_secs(), 604_800);
        assert_eq!(details.refresh_uuid, details.access_uuid.refresh_for(42));
        assert_ne!(details.access_token, details.refresh_token);
    }

    #[test]
    fn test_access_round_trip() {
        let clock = ManualClock::default();
        let codec = codec_with(&clock);
        let details = codec.issue(42).unwrap();

        let claims = codec.verify(&details.access_token, TokenKind::Access).unwrap();
        assert_eq!(claims.subject_id, 42);
        assert_eq!(claims.session, SessionRef::Access(details.access_uuid));
        assert_eq!(claims.kind(), TokenKind::Access);
        assert_eq!(claims.expires_at.timestamp(), details.at_expires.timestamp());
    }

    #[test]
    fn test_refresh_round_trip() {
        let clock = ManualClock::default();
        let codec = codec_with(&clock);
        let details = codec.issue(7).unwrap();

        let refresh = codec.verify_refresh(&details.refresh_token).unwrap();
        assert_eq!(refresh, details.refresh_uuid);
        assert_eq!(refresh.subject_id(), 7);
    }

    #[test]
    fn test_subject_keeps_full_precision() {
        let clock = ManualClock::default();
        let codec = codec_with(&clock);

        for subject in [u64::MAX, (1 << 53) + 1, 0] {
            let details = codec.issue(subject).unwrap();
            let (_, access_subject) = codec.verify_access(&details.access_token).unwrap();
            assert_eq!(access_subject, subject);
            let refresh = codec.verify_refresh(&details.refresh_token).unwrap();
            assert_eq!(refresh.subject_id(), subject);
        }
    }

    #[test]
    fn test_expired_after_clock_advance() {
        let clock = ManualClock::default();
        let codec = codec_with(&clock);
        let details = codec.issue(42).unwrap();

        clock.advance(Duration::seconds(900));
        assert!(codec.verify(&details.access_token, TokenKind::Access).is_ok());

        clock.advance(Duration::seconds(1));
        assert_eq!(
            codec.verify(&details.access_token, TokenKind::Access),
            Err(AuthError::Expired)
        );
        // The refresh credential outlives the access one
        assert!(codec.verify(&details.refresh_token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn test_kinds_use_distinct_secrets() {
        let clock = ManualClock::default();
        let codec = codec_with(&clock);
        let details = codec.issue(42).unwrap();

        assert_eq!(
            codec.verify(&details.refresh_token, TokenKind::Access),
            Err(AuthError::InvalidSignature)
        );
        assert_eq!(
            codec.verify(&details.access_token, TokenKind::Refresh),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_wrong_algorithm_is_invalid_signature() {
        let clock = ManualClock::default();
        let codec = codec_with(&clock);
        let payload = json!({
            "authorized": true,
            "access_uuid": AccessSessionId::generate().to_string(),
            "user_id": 42,
            "exp": (clock.now() + Duration::minutes(5)).timestamp(),
        });
        let token = encode(
            &Header::new(Algorithm::HS512),
            &payload,
            &EncodingKey::from_secret(b"access-secret"),
        )
        .unwrap();

        assert_eq!(codec.verify(&token, TokenKind::Access), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn test_missing_or_mistyped_claims_are_malformed() {
        let clock = ManualClock::default();
        let codec = codec_with(&clock);
        let exp = (clock.now() + Duration::minutes(5)).timestamp();

        let missing_uuid = sign_raw(json!({"authorized": true, "user_id": 42, "exp": exp}), "access-secret");
        assert!(matches!(
            codec.verify(&missing_uuid, TokenKind::Access),
            Err(AuthError::Malformed(_))
        ));

        let float_subject = sign_raw(
            json!({
                "authorized": true,
                "access_uuid": AccessSessionId::generate().to_string(),
                "user_id": 42.5,
                "exp": exp,
            }),
            "access-secret",
        );
        assert!(matches!(
            codec.verify(&float_subject, TokenKind::Access),
            Err(AuthError::Malformed(_))
        ));

        let foreign_refresh = sign_raw(
            json!({
                "refresh_uuid": AccessSessionId::generate().refresh_for(1).to_string(),
                "user_id": 2,
                "exp": exp,
            }),
            "refresh-secret",
        );
        assert!(matches!(
            codec.verify(&foreign_refresh, TokenKind::Refresh),
            Err(AuthError::Malformed(_))
        ));

        assert!(matches!(
            codec.verify("definitely.not.ajwt", TokenKind::Access),
            Err(AuthError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_secret_is_signing_error() {
        let codec = TokenCodec::new(Some("access-secret".into()), None);
        assert!(matches!(codec.issue(1), Err(AuthError::SigningError(_))));

        let codec = TokenCodec::new(Some(String::new()), Some("refresh-secret".into()));
        assert!(matches!(codec.issue(1), Err(AuthError::SigningError(_))));
    }
}
