//! Row types for the gallery schema.
//!
//! Rows read back from the database are plain immutable values. Records that
//! are about to be written go through a validating constructor first, so a
//! `NewUser` or `NewComment` that exists is already known to fit its columns.

use serde::Serialize;
use sqlx::FromRow;

use crate::error::ValidationError;

/// Maximum username length (`users.user VARCHAR(20)`).
pub const MAX_USERNAME_LEN: usize = 20;

/// Maximum generated filename length (`images.name VARCHAR(20)`).
pub const MAX_IMAGE_NAME_LEN: usize = 20;

/// Maximum alt-text length (`images.alt VARCHAR(50)`).
pub const MAX_DESCRIPTION_LEN: usize = 50;

/// Maximum comment length (`comments.comment VARCHAR(255)`).
pub const MAX_COMMENT_LEN: usize = 255;

/// Lowest accepted rating.
pub const MIN_RATING: i64 = 1;

/// Highest accepted rating.
pub const MAX_RATING: i64 = 5;

/// Trim a form field and reject it when blank.
pub fn required(field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ValidationError::MissingField(field)),
    }
}

fn bounded(field: &'static str, value: String, max: usize) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(value)
}

// =============================================================================
// Users
// =============================================================================

/// A registered account.
#[derive(Clone, FromRow)]
pub struct User {
    id: i64,
    user: String,
    passhash: String,
    admin: bool,
}

impl User {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.user
    }

    pub fn passhash(&self) -> &str {
        &self.passhash
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("user", &self.user)
            .field("passhash", &"#[redacted]")
            .field("admin", &self.admin)
            .finish()
    }
}

/// An account about to be inserted.
#[derive(Debug, Clone)]
pub struct NewUser {
    username: String,
    passhash: String,
    admin: bool,
}

impl NewUser {
    /// `passhash` must already be a bcrypt hash; plaintext never reaches the store.
    pub fn new(
        username: impl Into<String>,
        passhash: impl Into<String>,
        admin: bool,
    ) -> Result<Self, ValidationError> {
        let username = bounded("username", username.into(), MAX_USERNAME_LEN)?;
        let passhash = passhash.into();
        if passhash.is_empty() {
            return Err(ValidationError::MissingField("password"));
        }

        Ok(Self {
            username,
            passhash,
            admin,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn passhash(&self) -> &str {
        &self.passhash
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }
}

// =============================================================================
// Images
// =============================================================================

/// An uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Image {
    id: i64,
    name: String,
    views: i64,
    alt: String,
}

impl Image {
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Generated filename under the public images directory.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn views(&self) -> i64 {
        self.views
    }

    /// Alt-text description.
    pub fn alt(&self) -> &str {
        &self.alt
    }

    /// The same image with one more view recorded.
    pub fn viewed(self) -> Self {
        Self {
            views: self.views.saturating_add(1),
            ..self
        }
    }

    /// The same image with a new alt-text; the view count is untouched.
    pub fn with_description(self, alt: impl Into<String>) -> Result<Self, ValidationError> {
        let alt = bounded("description", alt.into(), MAX_DESCRIPTION_LEN)?;
        Ok(Self { alt, ..self })
    }

    #[cfg(test)]
    pub(crate) fn for_tests(id: i64, name: &str, views: i64, alt: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            views,
            alt: alt.to_string(),
        }
    }
}

/// An image record about to be inserted.
#[derive(Debug, Clone)]
pub struct NewImage {
    name: String,
    views: i64,
    alt: String,
}

impl NewImage {
    /// A freshly uploaded image with no views.
    pub fn new(name: impl Into<String>, alt: impl Into<String>) -> Result<Self, ValidationError> {
        Self::with_views(name, 0, alt)
    }

    /// An image carrying an existing view count (used when seeding).
    pub fn with_views(
        name: impl Into<String>,
        views: i64,
        alt: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let name = bounded("filename", name.into(), MAX_IMAGE_NAME_LEN)?;
        let alt = bounded("description", alt.into(), MAX_DESCRIPTION_LEN)?;

        Ok(Self {
            name,
            views: views.max(0),
            alt,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn views(&self) -> i64 {
        self.views
    }

    pub fn alt(&self) -> &str {
        &self.alt
    }
}

// =============================================================================
// Comments
// =============================================================================

/// A comment left on an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Comment {
    id: i64,
    comment: String,
    user: i64,
    image: i64,
}

impl Comment {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.comment
    }

    /// Id of the authoring user.
    pub fn user(&self) -> i64 {
        self.user
    }

    /// Id of the image commented on.
    pub fn image(&self) -> i64 {
        self.image
    }
}

/// A comment about to be inserted.
#[derive(Debug, Clone)]
pub struct NewComment {
    comment: String,
    user: i64,
    image: i64,
}

impl NewComment {
    pub fn new(comment: impl Into<String>, user: i64, image: i64) -> Result<Self, ValidationError> {
        let comment = bounded("comment", comment.into(), MAX_COMMENT_LEN)?;
        Ok(Self {
            comment,
            user,
            image,
        })
    }

    pub fn text(&self) -> &str {
        &self.comment
    }

    pub fn user(&self) -> i64 {
        self.user
    }

    pub fn image(&self) -> i64 {
        self.image
    }
}

// =============================================================================
// Ratings
// =============================================================================

/// Composite key of an `image_ratings` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RatingKey {
    pub user: i64,
    pub image: i64,
}

/// One user's rating of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromRow)]
pub struct ImageRating {
    user: i64,
    image: i64,
    rating: i64,
}

impl ImageRating {
    pub fn new(key: RatingKey, rating: i64) -> Result<Self, ValidationError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(ValidationError::InvalidRating);
        }
        Ok(Self {
            user: key.user,
            image: key.image,
            rating,
        })
    }

    /// Parse a submitted rating field.
    pub fn parse(key: RatingKey, value: Option<&str>) -> Result<Self, ValidationError> {
        let raw = required("rating", value)?;
        let rating = raw
            .parse::<i64>()
            .map_err(|_| ValidationError::InvalidRating)?;
        Self::new(key, rating)
    }

    pub fn key(&self) -> RatingKey {
        RatingKey {
            user: self.user,
            image: self.image,
        }
    }

    pub fn user(&self) -> i64 {
        self.user
    }

    pub fn image(&self) -> i64 {
        self.image
    }

    pub fn rating(&self) -> i64 {
        self.rating
    }
}
