//! Password authentication for the gallery.
//!
//! Passwords are hashed with bcrypt (random salt, configurable cost) and only
//! ever compared through `bcrypt::verify`. Both operations are CPU-heavy, so
//! they run on Tokio's blocking pool.
//!
//! # Example
//!
//! ```ignore
//! use image_gallery::server::auth::{Authenticator, LoginForm, SignupForm};
//!
//! let auth = Authenticator::new(store, bcrypt::DEFAULT_COST);
//!
//! let identity = auth
//!     .signup(&SignupForm {
//!         username: Some("alice".into()),
//!         password: Some("hunter2".into()),
//!         password_confirm: Some("hunter2".into()),
//!     })
//!     .await?;
//!
//! let again = auth
//!     .login(&LoginForm {
//!         username: Some("alice".into()),
//!         password: Some("hunter2".into()),
//!     })
//!     .await?;
//! assert_eq!(identity, again);
//! ```

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::session::SessionIdentity;
use crate::error::{GalleryError, StoreError, ValidationError};
use crate::store::models::required;
use crate::store::{GalleryStore, NewUser};

/// Lowest cost bcrypt accepts.
pub const MIN_BCRYPT_COST: u32 = 4;

/// Highest cost bcrypt accepts.
pub const MAX_BCRYPT_COST: u32 = 31;

/// Message shown for any failed login, whether the user exists or not.
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

// =============================================================================
// Errors
// =============================================================================

/// Authentication failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username or wrong password
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Signup password and confirmation differ
    #[error("Passwords do not match")]
    PasswordMismatch,

    /// Signup username already registered
    #[error("Username already taken")]
    UsernameTaken,

    /// Missing or malformed form field
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// bcrypt failed or its worker task panicked
    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(_) => AuthError::UsernameTaken,
            other => AuthError::Store(other),
        }
    }
}

impl AuthError {
    /// Map to the handler error, sending form problems back to `form_path`.
    pub fn into_gallery_error(self, form_path: &str) -> GalleryError {
        match self {
            AuthError::InvalidCredentials => GalleryError::LoginFailed {
                message: INVALID_CREDENTIALS.to_string(),
                redirect_to: form_path.to_string(),
            },
            AuthError::PasswordMismatch
            | AuthError::UsernameTaken
            | AuthError::Validation(_) => GalleryError::rejected(self.to_string(), form_path),
            AuthError::Hash(message) => GalleryError::Internal(message),
            AuthError::Store(err) => GalleryError::Store(err),
        }
    }
}

// =============================================================================
// Forms
// =============================================================================

/// Body of `POST /auth/login`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

/// Body of `POST /auth/signup`.
#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default, rename = "passwordConfirm", alias = "password_confirm")]
    pub password_confirm: Option<String>,
}

/// Passwords are taken as typed; only emptiness is rejected.
fn password_field(field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ValidationError::MissingField(field)),
    }
}

// =============================================================================
// Password Hashing
// =============================================================================

/// Hash a password with a fresh random salt.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AuthError::Hash(e.to_string()))?
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Check a password against a stored hash.
///
/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let password = password.to_string();
    let hash = hash.to_string();
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AuthError::Hash(e.to_string()))?;

    match verified {
        Ok(verified) => Ok(verified),
        Err(err) => {
            warn!(error = %err, "Stored password hash could not be parsed");
            Ok(false)
        }
    }
}

// =============================================================================
// Authenticator
// =============================================================================

/// Verifies credentials and registers accounts against a [`GalleryStore`].
pub struct Authenticator<S: GalleryStore> {
    store: Arc<S>,
    bcrypt_cost: u32,
}

impl<S: GalleryStore> Authenticator<S> {
    /// Create an authenticator hashing new passwords at `bcrypt_cost`.
    pub fn new(store: Arc<S>, bcrypt_cost: u32) -> Self {
        Self {
            store,
            bcrypt_cost: bcrypt_cost.clamp(MIN_BCRYPT_COST, MAX_BCRYPT_COST),
        }
    }

    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }

    /// Check a username and password, returning the identity to sign in as.
    pub async fn login(&self, form: &LoginForm) -> Result<SessionIdentity, AuthError> {
        let username = required("username", form.username.as_deref())?;
        let password = password_field("password", form.password.as_deref())?;

        let Some(user) = self.store.get_user_by_username(&username).await? else {
            debug!(username = %username, "Login for unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(&password, user.passhash()).await? {
            debug!(user_id = user.id(), "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = user.id(), "User logged in");
        Ok(SessionIdentity::from_user(&user))
    }

    /// Register a non-admin account and return the identity to sign in as.
    pub async fn signup(&self, form: &SignupForm) -> Result<SessionIdentity, AuthError> {
        let username = required("username", form.username.as_deref())?;
        let password = password_field("password", form.password.as_deref())?;
        let confirm = password_field("passwordConfirm", form.password_confirm.as_deref())?;

        if password != confirm {
            return Err(AuthError::PasswordMismatch);
        }

        if self.store.get_user_by_username(&username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let passhash = hash_password(&password, self.bcrypt_cost).await?;
        let new_user = NewUser::new(username, passhash, false)?;
        let user_id = self.store.insert_user(&new_user).await?;

        info!(user_id, "User signed up");
        Ok(SessionIdentity {
            user_id,
            username: new_user.username().to_string(),
            admin: false,
        })
    }
}

impl<S: GalleryStore> Clone for Authenticator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            bcrypt_cost: self.bcrypt_cost,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
