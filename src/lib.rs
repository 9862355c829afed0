//! # Image Gallery
//!
//! A small multi-user photo gallery served over HTTP.
//!
//! Visitors browse uploaded images with their view counts and average
//! ratings. Signed-in users upload images, comment and rate; administrators
//! edit descriptions and remove images.
//!
//! ## Features
//!
//! - **Accounts**: Signup and login with bcrypt-hashed passwords
//! - **Sessions**: HMAC-signed session cookies with one-shot flash messages
//! - **Storage**: SQLite via sqlx for records, the local filesystem for image bytes
//! - **Seeding**: Bulk load of users and images from CSV files
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`store`] - Data store trait, row types and the SQLite backend
//! - [`storage`] - Uploaded image files and generated filenames
//! - [`server`] - Axum-based HTTP server, sessions, auth and pages
//! - [`seed`] - CSV seeding
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use image_gallery::{create_router, RouterConfig, SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteStore::connect("sqlite://gallery.db", 5).await?;
//!     store.migrate().await?;
//!
//!     let router = create_router(store, RouterConfig::new("session-secret", "public"));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod seed;
pub mod server;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use config::{Cli, Command, DatabaseArgs, SeedConfig, ServeConfig};
pub use error::{GalleryError, StorageError, StoreError, ValidationError};
pub use server::{
    create_router, AppState, AuthError, Authenticator, RouterConfig, Session, SessionIdentity,
    SessionStore,
};
pub use storage::ImageStorage;
pub use store::{GalleryStore, SqliteStore};
