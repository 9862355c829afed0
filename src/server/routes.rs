//! Router configuration for the image gallery.
//!
//! # Route Structure
//!
//! ```text
//! /                       - Gallery (public)
//! /upload                 - Upload form and submission (signed in)
//! /{image}                - Image page (public), edit description (admin)
//! /{image}/remove         - Delete image (admin)
//! /{image}/comments       - Add comment (signed in)
//! /{image}/ratings        - Rate image (signed in)
//! /auth/login             - Log in (anonymous)
//! /auth/signup            - Sign up (anonymous)
//! /auth/logout            - Log out
//! /health                 - Health check (public)
//! /public/...             - Static files, including uploaded images
//! ```
//!
//! Every route runs inside the session middleware, which attaches the
//! caller's [`Session`](super::session::Session) and persists flash messages.
//!
//! # Example
//!
//! ```ignore
//! use image_gallery::server::routes::{create_router, RouterConfig};
//! use image_gallery::store::SqliteStore;
//!
//! let store = SqliteStore::connect("sqlite://gallery.db", 5).await?;
//! store.migrate().await?;
//!
//! let config = RouterConfig::new("my-session-secret", "public")
//!     .with_bcrypt_cost(10);
//!
//! let router = create_router(store, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::handlers::{
    comment_handler, edit_image_handler, gallery_handler, health_handler, image_handler,
    login_form_handler, login_handler, logout_handler, rating_handler, remove_image_handler,
    signup_form_handler, signup_handler, upload_form_handler, upload_handler, AppState,
};
use super::session::{
    session_middleware, SessionStore, DEFAULT_SESSION_CAPACITY, DEFAULT_SESSION_TTL,
};
use crate::storage::ImageStorage;
use crate::store::GalleryStore;

/// Default bcrypt cost for new password hashes.
pub const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

/// Default request body limit for uploads (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Secret key for signing session cookies
    pub session_secret: String,

    /// Directory served under `/public`; uploads go to its `images/` subdirectory
    pub public_dir: PathBuf,

    /// Sliding session lifetime
    pub session_ttl: Duration,

    /// Maximum number of live sessions
    pub session_capacity: usize,

    /// bcrypt cost for new password hashes
    pub bcrypt_cost: u32,

    /// Maximum request body size in bytes
    pub max_upload_bytes: usize,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a new router configuration.
    ///
    /// By default:
    /// - Sessions last one day and at most 10,000 are kept
    /// - bcrypt cost is 12
    /// - Request bodies are limited to 10 MiB
    /// - Tracing is enabled
    pub fn new(session_secret: impl Into<String>, public_dir: impl Into<PathBuf>) -> Self {
        Self {
            session_secret: session_secret.into(),
            public_dir: public_dir.into(),
            session_ttl: DEFAULT_SESSION_TTL,
            session_capacity: DEFAULT_SESSION_CAPACITY,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            enable_tracing: true,
        }
    }

    /// Set the sliding session lifetime.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Set the maximum number of live sessions.
    pub fn with_session_capacity(mut self, capacity: usize) -> Self {
        self.session_capacity = capacity;
        self
    }

    /// Set the bcrypt cost for new password hashes.
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    /// Set the request body limit in bytes.
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// This function builds the complete Axum router with:
/// - Gallery, image, and auth routes
/// - Static files under `/public`
/// - Session middleware
/// - Request tracing (optional)
///
/// # Arguments
///
/// * `store` - Database backend for users, images, comments and ratings
/// * `config` - Router configuration
///
/// # Returns
///
/// A configured Axum router ready to be served.
pub fn create_router<S>(store: S, config: RouterConfig) -> Router
where
    S: GalleryStore + 'static,
{
    let storage = ImageStorage::new(&config.public_dir);
    let app_state = AppState::new(Arc::new(store), storage, config.bcrypt_cost);

    let sessions = SessionStore::new(
        &config.session_secret,
        config.session_ttl,
        config.session_capacity,
    );

    let auth_routes = Router::new()
        .route("/login", get(login_form_handler).post(login_handler::<S>))
        .route("/signup", get(signup_form_handler).post(signup_handler::<S>))
        .route("/logout", get(logout_handler));

    let router = Router::new()
        .route("/", get(gallery_handler::<S>))
        .route("/health", get(health_handler))
        .route(
            "/upload",
            get(upload_form_handler).post(upload_handler::<S>),
        )
        .route(
            "/{image}",
            get(image_handler::<S>).post(edit_image_handler::<S>),
        )
        .route("/{image}/remove", post(remove_image_handler::<S>))
        .route("/{image}/comments", post(comment_handler::<S>))
        .route("/{image}/ratings", post(rating_handler::<S>))
        .nest("/auth", auth_routes)
        .with_state(app_state)
        .nest_service("/public", ServeDir::new(&config.public_dir))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(middleware::from_fn_with_state(sessions, session_middleware));

    // Add tracing if enabled
    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

// =============================================================================
// Tests
// =============================================================================
