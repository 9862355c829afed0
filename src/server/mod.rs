//! HTTP server layer for the image gallery.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │     GET /   GET /{image}   POST /upload   POST /auth/login ...  │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │   session   │  │        routes           │  │
//! │  │ (requests)  │  │(cookie+flash│  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! │  ┌─────────────┐  ┌─────────────┐                               │
//! │  │    auth     │  │    views    │                               │
//! │  │  (bcrypt)   │  │   (HTML)    │                               │
//! │  └─────────────┘  └─────────────┘                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod handlers;
pub mod routes;
pub mod session;
pub mod views;

pub use auth::{hash_password, verify_password, AuthError, Authenticator, LoginForm, SignupForm};
pub use handlers::{health_handler, AppState, HealthResponse};
pub use routes::{create_router, RouterConfig, DEFAULT_BCRYPT_COST, DEFAULT_MAX_UPLOAD_BYTES};
pub use session::{
    session_middleware, FlashMessage, Session, SessionIdentity, SessionStore, SESSION_COOKIE,
};
