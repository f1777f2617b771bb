//! Authentication module
//!
//! Credential issuance and verification, the revocable session store behind
//! it, and the request-facing authenticator the HTTP layer calls into.

pub mod authenticator;
pub mod clock;
pub mod handlers;
pub mod session;
pub mod session_id;
pub mod store;
pub mod token;

pub use authenticator::{extract_token, RequestAuthenticator};
pub use clock::{Clock, ManualClock, SystemClock};
pub use session::{AccessDetails, SessionManager};
pub use session_id::{AccessSessionId, RefreshSessionId};
pub use store::{MemorySessionStore, RedisSessionStore, SessionStore};
pub use token::{Claims, SessionRef, TokenCodec, TokenDetails, TokenKind};
