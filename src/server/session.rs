//! Cookie sessions for the gallery.
//!
//! # Scheme
//!
//! Each browser holds one cookie naming an opaque, random session id. The id
//! is bound to the server with an HMAC-SHA256 tag:
//!
//! ```text
//! gallery_session = {session_id}.{hex(HMAC-SHA256(secret, session_id))}
//! ```
//!
//! The server keeps the session state itself in a process-wide
//! [`SessionStore`]: the signed-in identity (user id, username, admin flag)
//! and at most one pending flash message. Password hashes never enter a
//! session. Entries expire after a sliding TTL and the store is LRU-bounded.
//! Every response that touches a live session re-issues the cookie with a
//! fresh `Max-Age`.
//!
//! # Flash messages
//!
//! A handler (or an error response) attaches a [`FlashMessage`] to its
//! response. [`session_middleware`] moves it into the session, and the next
//! page render takes it back out with [`Session::take_flash`], so it is shown
//! exactly once.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        request::Parts,
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use lru::LruCache;
use rand::{thread_rng, RngCore};
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::GalleryError;
use crate::store::User;

type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "gallery_session";

/// Default sliding session lifetime (one day).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default maximum number of live sessions.
pub const DEFAULT_SESSION_CAPACITY: usize = 10_000;

/// Random bytes in a session id.
const SESSION_ID_BYTES: usize = 32;

// =============================================================================
// Types
// =============================================================================

/// Who a session is signed in as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionIdentity {
    pub user_id: i64,
    pub username: String,
    pub admin: bool,
}

impl SessionIdentity {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id(),
            username: user.username().to_string(),
            admin: user.is_admin(),
        }
    }
}

/// Opaque session identifier (hex-encoded random bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// A fresh random id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        thread_rng().fill_bytes(&mut bytes);
        SessionId(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One-shot message carried from a response into the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashMessage(pub String);

/// Session state errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session expired or was evicted before it could be cleared
    #[error("Session {0} no longer exists")]
    Gone(String),
}

struct SessionEntry {
    identity: Option<SessionIdentity>,
    flash: Option<String>,
    expires_at: Instant,
}

impl SessionEntry {
    fn empty(expires_at: Instant) -> Self {
        Self {
            identity: None,
            flash: None,
            expires_at,
        }
    }
}

// =============================================================================
// Cookie Signing
// =============================================================================

#[derive(Clone)]
struct CookieSigner {
    secret_key: Arc<[u8]>,
}

impl CookieSigner {
    fn new(secret_key: impl AsRef<[u8]>) -> Self {
        Self {
            secret_key: Arc::from(secret_key.as_ref()),
        }
    }

    fn tag(&self, id: &str) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(id.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    fn sign(&self, id: &SessionId) -> String {
        format!("{}.{}", id.as_str(), hex::encode(self.tag(id.as_str())))
    }

    fn verify(&self, value: &str) -> Option<SessionId> {
        let (id, tag_hex) = value.split_once('.')?;
        if id.len() != SESSION_ID_BYTES * 2 {
            return None;
        }
        let provided = hex::decode(tag_hex).ok()?;
        let expected = self.tag(id);

        if provided.ct_eq(&expected).into() {
            Some(SessionId(id.to_string()))
        } else {
            None
        }
    }
}

// =============================================================================
// Session Store
// =============================================================================

/// Process-wide session storage.
///
/// Cloning is cheap; clones share the same entries.
#[derive(Clone)]
pub struct SessionStore {
    entries: Arc<Mutex<LruCache<SessionId, SessionEntry>>>,
    signer: CookieSigner,
    ttl: Duration,
}

impl SessionStore {
    /// Create a store signing cookies with `secret_key`.
    ///
    /// A `capacity` of zero is treated as one.
    pub fn new(secret_key: impl AsRef<[u8]>, ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
            signer: CookieSigner::new(secret_key),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The session id named by a validly signed cookie, if any.
    ///
    /// Only the signature is checked; the session may have expired.
    pub fn session_from_headers(&self, headers: &HeaderMap) -> Option<SessionId> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == SESSION_COOKIE)
            .find_map(|(_, value)| self.signer.verify(value))
    }

    /// `Set-Cookie` value for a session id.
    pub fn cookie_header(&self, id: &SessionId) -> Option<HeaderValue> {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE,
            self.signer.sign(id),
            self.ttl.as_secs()
        );
        HeaderValue::from_str(&cookie).ok()
    }

    /// Number of live (possibly expired but not yet collected) sessions.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    #[cfg(test)]
    async fn contains(&self, id: &SessionId) -> bool {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.peek(id).is_some_and(|entry| entry.expires_at > now)
    }

    /// Read from a live entry, refreshing its expiry. Expired entries are dropped.
    async fn read<T>(&self, id: &SessionId, f: impl FnOnce(&mut SessionEntry) -> T) -> Option<T> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        if entries.peek(id).is_some_and(|entry| entry.expires_at <= now) {
            debug!("Session expired");
            entries.pop(id);
            return None;
        }

        let entry = entries.get_mut(id)?;
        entry.expires_at = now + self.ttl;
        Some(f(entry))
    }

    /// Write to an entry, creating it when absent or expired.
    async fn write<T>(&self, id: &SessionId, f: impl FnOnce(&mut SessionEntry) -> T) -> T {
        let now = Instant::now();
        let expires_at = now + self.ttl;
        let mut entries = self.entries.lock().await;

        if entries.peek(id).is_some_and(|entry| entry.expires_at <= now) {
            entries.pop(id);
        }

        let entry = entries.get_or_insert_mut(id.clone(), || SessionEntry::empty(expires_at));
        entry.expires_at = expires_at;
        f(entry)
    }

    async fn remove(&self, id: &SessionId) {
        self.entries.lock().await.pop(id);
    }
}

// =============================================================================
// Request Session Handle
// =============================================================================

/// The session attached to the current request.
///
/// Inserted by [`session_middleware`] and extracted in handlers.
#[derive(Clone)]
pub struct Session {
    store: SessionStore,
    id: Arc<Mutex<SessionId>>,
}

impl Session {
    fn new(store: SessionStore, presented: Option<SessionId>) -> Self {
        Self {
            store,
            id: Arc::new(Mutex::new(presented.unwrap_or_else(SessionId::generate))),
        }
    }

    async fn current_id(&self) -> SessionId {
        self.id.lock().await.clone()
    }

    /// The signed-in identity, if any.
    pub async fn identity(&self) -> Option<SessionIdentity> {
        let id = self.current_id().await;
        self.store
            .read(&id, |entry| entry.identity.clone())
            .await
            .flatten()
    }

    /// Any signed-in user, or 401.
    pub async fn require_user(&self) -> Result<SessionIdentity, GalleryError> {
        self.identity().await.ok_or(GalleryError::Unauthorized)
    }

    /// A signed-in admin, or 401.
    pub async fn require_admin(&self) -> Result<SessionIdentity, GalleryError> {
        match self.identity().await {
            Some(identity) if identity.admin => Ok(identity),
            _ => Err(GalleryError::Unauthorized),
        }
    }

    /// Establish `identity` under a freshly generated session id.
    ///
    /// Any pending flash message is carried over.
    pub async fn sign_in(&self, identity: SessionIdentity) {
        let mut id = self.id.lock().await;
        let flash = self
            .store
            .read(&id, |entry| entry.flash.take())
            .await
            .flatten();
        self.store.remove(&id).await;

        let fresh = SessionId::generate();
        debug!(user_id = identity.user_id, "Session signed in");
        self.store
            .write(&fresh, |entry| {
                entry.identity = Some(identity);
                entry.flash = flash;
            })
            .await;
        *id = fresh;
    }

    /// Forget the signed-in identity.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        let id = self.current_id().await;
        self.store
            .read(&id, |entry| entry.identity = None)
            .await
            .ok_or_else(|| SessionError::Gone(short_id(&id)))
    }

    /// Queue a message for the next rendered page.
    pub async fn set_flash(&self, message: impl Into<String>) {
        let id = self.current_id().await;
        let message = message.into();
        self.store
            .write(&id, |entry| entry.flash = Some(message))
            .await;
    }

    /// Read and clear the pending flash message.
    pub async fn take_flash(&self) -> Option<String> {
        let id = self.current_id().await;
        self.store
            .read(&id, |entry| entry.flash.take())
            .await
            .flatten()
    }

    /// Cookie to send back whenever the session holds live state.
    ///
    /// Touching the session slides its expiry, so the cookie is re-issued
    /// with a fresh `Max-Age` to keep the browser in step with the store.
    async fn cookie_update(&self) -> Option<HeaderValue> {
        let current = self.current_id().await;
        self.store.read(&current, |_| ()).await?;
        self.store.cookie_header(&current)
    }
}

fn short_id(id: &SessionId) -> String {
    id.as_str().chars().take(8).collect()
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Session layer is not installed",
        ))
    }
}

// =============================================================================
// Axum Middleware
// =============================================================================

/// Attach a [`Session`] to every request and persist flash messages and
/// cookie changes on the way out.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, middleware};
/// use image_gallery::server::session::{SessionStore, session_middleware};
///
/// let sessions = SessionStore::new("secret-key", DEFAULT_SESSION_TTL, 1000);
/// let app = Router::new()
///     .route("/", get(gallery_handler))
///     .layer(middleware::from_fn_with_state(sessions, session_middleware));
/// ```
pub async fn session_middleware(
    State(store): State<SessionStore>,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = store.session_from_headers(request.headers());
    let session = Session::new(store, presented);
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    if let Some(FlashMessage(message)) = response.extensions_mut().remove::<FlashMessage>() {
        session.set_flash(message).await;
    }

    if let Some(cookie) = session.cookie_update().await {
        response.headers_mut().append(SET_COOKIE, cookie);
    }

    response
}

// =============================================================================
// Tests
// =============================================================================
