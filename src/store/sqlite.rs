//! SQLite implementation of [`GalleryStore`] on an `sqlx` connection pool.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use super::models::{Comment, Image, ImageRating, NewComment, NewImage, NewUser, RatingKey, User};
use super::{round_rating, GalleryStore};
use crate::error::StoreError;

/// Time to wait for a pooled connection before failing the request.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user VARCHAR(20) NOT NULL UNIQUE,
        passhash VARCHAR(255) NOT NULL,
        admin BOOLEAN NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name VARCHAR(20) NOT NULL,
        views INTEGER NOT NULL DEFAULT 0,
        alt VARCHAR(50) NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        comment VARCHAR(255) NOT NULL,
        user INTEGER NOT NULL REFERENCES users(id),
        image INTEGER NOT NULL REFERENCES images(id) ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS image_ratings (
        user INTEGER NOT NULL REFERENCES users(id),
        image INTEGER NOT NULL REFERENCES images(id) ON DELETE CASCADE,
        rating INTEGER NOT NULL,
        PRIMARY KEY (user, image)
    )",
];

/// Gallery store backed by SQLite.
///
/// Cloning is cheap; clones share the same pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open a pool against `url` (e.g. `sqlite://gallery.db`), creating the
    /// database file if it does not exist.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        info!(url = url, max_connections, "Connected to database");
        Ok(Self { pool })
    }

    /// A private in-memory database with the schema applied.
    ///
    /// Pinned to one connection that never idles out, since every SQLite
    /// in-memory connection is its own database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create the gallery tables if they are missing.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Schema is up to date");
        Ok(())
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl GalleryStore for SqliteStore {
    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: &NewUser) -> Result<i64, StoreError> {
        let result = sqlx::query("INSERT INTO users (user, passhash, admin) VALUES (?, ?, ?)")
            .bind(user.username())
            .bind(user.passhash())
            .bind(user.is_admin())
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn get_images(&self) -> Result<Vec<Image>, StoreError> {
        let images = sqlx::query_as::<_, Image>("SELECT * FROM images ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(images)
    }

    async fn get_image(&self, id: i64) -> Result<Option<Image>, StoreError> {
        let image = sqlx::query_as::<_, Image>("SELECT * FROM images WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(image)
    }

    async fn insert_image(&self, image: &NewImage) -> Result<i64, StoreError> {
        let result = sqlx::query("INSERT INTO images (name, views, alt) VALUES (?, ?, ?)")
            .bind(image.name())
            .bind(image.views())
            .bind(image.alt())
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn insert_image_with_id(&self, id: i64, image: &NewImage) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO images (id, name, views, alt) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(image.name())
            .bind(image.views())
            .bind(image.alt())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_image(&self, image: &Image) -> Result<(), StoreError> {
        sqlx::query("UPDATE images SET views = ?, alt = ? WHERE id = ?")
            .bind(image.views())
            .bind(image.alt())
            .bind(image.id())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_image(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_comments_for_image(&self, image_id: i64) -> Result<Vec<Comment>, StoreError> {
        let comments =
            sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE image = ? ORDER BY id")
                .bind(image_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(comments)
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<i64, StoreError> {
        let result = sqlx::query("INSERT INTO comments (comment, user, image) VALUES (?, ?, ?)")
            .bind(comment.text())
            .bind(comment.user())
            .bind(comment.image())
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn get_rating_for_user_image(
        &self,
        key: RatingKey,
    ) -> Result<Option<ImageRating>, StoreError> {
        let rating = sqlx::query_as::<_, ImageRating>(
            "SELECT * FROM image_ratings WHERE image = ? AND user = ?",
        )
        .bind(key.image)
        .bind(key.user)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rating)
    }

    async fn insert_rating(&self, rating: &ImageRating) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO image_ratings (user, image, rating) VALUES (?, ?, ?)")
            .bind(rating.user())
            .bind(rating.image())
            .bind(rating.rating())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_rating(&self, rating: &ImageRating) -> Result<(), StoreError> {
        sqlx::query("UPDATE image_ratings SET rating = ? WHERE user = ? AND image = ?")
            .bind(rating.rating())
            .bind(rating.user())
            .bind(rating.image())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_average_rating_for_image(
        &self,
        image_id: i64,
    ) -> Result<Option<f64>, StoreError> {
        let average: Option<f64> = sqlx::query_scalar(
            "SELECT CAST(AVG(rating) AS REAL) FROM image_ratings WHERE image = ?",
        )
        .bind(image_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(average.map(round_rating))
    }
}

// =============================================================================
// Tests
// =============================================================================
