//! Relational storage for users, images, comments and ratings.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     GalleryStore                          │
//! │   users      images      comments      image_ratings      │
//! │                                                           │
//! │  ┌──────────────────────┐    ┌──────────────────────────┐ │
//! │  │       models         │    │       SqliteStore        │ │
//! │  │ (validated values)   │    │ (sqlx pool, one query    │ │
//! │  │                      │    │  per operation)          │ │
//! │  └──────────────────────┘    └──────────────────────────┘ │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation is a single parameterized statement. Nothing spans a
//! transaction, so callers that read then write (view counts, first ratings)
//! can race with concurrent requests.

pub mod models;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::StoreError;

pub use models::{
    Comment, Image, ImageRating, NewComment, NewImage, NewUser, RatingKey, User,
    MAX_COMMENT_LEN, MAX_DESCRIPTION_LEN, MAX_IMAGE_NAME_LEN, MAX_RATING, MAX_USERNAME_LEN,
    MIN_RATING,
};
pub use sqlite::SqliteStore;

/// Data access used by the request handlers.
///
/// Read-many operations return an empty `Vec` when nothing matches.
#[async_trait]
pub trait GalleryStore: Send + Sync {
    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Insert an account and return its id.
    ///
    /// Fails with [`StoreError::Duplicate`] when the username is taken.
    async fn insert_user(&self, user: &NewUser) -> Result<i64, StoreError>;

    async fn get_images(&self) -> Result<Vec<Image>, StoreError>;

    async fn get_image(&self, id: i64) -> Result<Option<Image>, StoreError>;

    /// Insert an image record and return its id.
    async fn insert_image(&self, image: &NewImage) -> Result<i64, StoreError>;

    /// Insert an image record under a caller-chosen id.
    ///
    /// Fails with [`StoreError::Duplicate`] when the id is already used.
    async fn insert_image_with_id(&self, id: i64, image: &NewImage) -> Result<(), StoreError>;

    /// Persist the mutable columns (views, alt) of an image.
    async fn update_image(&self, image: &Image) -> Result<(), StoreError>;

    /// Delete an image row together with its comments and ratings.
    async fn delete_image(&self, id: i64) -> Result<(), StoreError>;

    async fn get_comments_for_image(&self, image_id: i64) -> Result<Vec<Comment>, StoreError>;

    async fn insert_comment(&self, comment: &NewComment) -> Result<i64, StoreError>;

    async fn get_rating_for_user_image(
        &self,
        key: RatingKey,
    ) -> Result<Option<ImageRating>, StoreError>;

    async fn insert_rating(&self, rating: &ImageRating) -> Result<(), StoreError>;

    async fn update_rating(&self, rating: &ImageRating) -> Result<(), StoreError>;

    /// Mean of all ratings for an image rounded to one decimal place, or
    /// `None` when the image is unrated.
    async fn get_average_rating_for_image(&self, image_id: i64)
        -> Result<Option<f64>, StoreError>;
}

/// Round an average to one decimal place.
pub fn round_rating(average: f64) -> f64 {
    (average * 10.0).round() / 10.0
}
