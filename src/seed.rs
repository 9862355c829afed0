//! Initial data loading from CSV files.
//!
//! The `seed` command reads two files from a directory:
//!
//! ```text
//! users.csv    username,password,admin
//! images.csv   id,name,views,alt
//! ```
//!
//! The first line of each file is a header. Passwords are hashed with bcrypt
//! before insertion. Lines that do not parse, or that the store rejects, are
//! skipped with a warning rather than aborting the whole run.
//!
//! Images keep the `id` listed in `images.csv`. A row whose id is already
//! taken is skipped.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{StoreError, ValidationError};
use crate::server::auth::{hash_password, AuthError};
use crate::store::{GalleryStore, NewImage, NewUser};

/// Users file name inside the seed directory.
pub const USERS_FILE: &str = "users.csv";

/// Images file name inside the seed directory.
pub const IMAGES_FILE: &str = "images.csv";

/// Errors that abort seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Why a single CSV line was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("expected {expected} columns, found {found}")]
    Columns { expected: usize, found: usize },

    #[error("invalid number in column {0}")]
    Number(&'static str),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// One row of `users.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub username: String,
    pub password: String,
    pub admin: bool,
}

/// One row of `images.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRow {
    pub id: i64,
    pub name: String,
    pub views: i64,
    pub alt: String,
}

/// Rows inserted and skipped by a seeding run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub images: usize,
    pub skipped: usize,
}

/// Data lines of a CSV file: header dropped, blank lines ignored.
///
/// Yields `(line number, line)` with 1-based numbering.
fn data_lines(contents: &str) -> impl Iterator<Item = (usize, &str)> {
    contents
        .lines()
        .enumerate()
        .skip(1)
        .map(|(index, line)| (index + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty())
}

fn columns(line: &str, expected: usize) -> Result<Vec<&str>, LineError> {
    let columns: Vec<&str> = line.splitn(expected, ',').collect();
    if columns.len() == expected {
        Ok(columns)
    } else {
        Err(LineError::Columns {
            expected,
            found: columns.len(),
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

/// Parse a `username,password,admin` line.
pub fn parse_user_line(line: &str) -> Result<UserRow, LineError> {
    let columns = columns(line, 3)?;
    let username = columns[0].trim();
    let password = columns[1];

    if username.is_empty() {
        return Err(ValidationError::MissingField("username").into());
    }
    if password.is_empty() {
        return Err(ValidationError::MissingField("password").into());
    }

    Ok(UserRow {
        username: username.to_string(),
        password: password.to_string(),
        admin: parse_flag(columns[2]),
    })
}

/// Parse an `id,name,views,alt` line. The alt text may contain commas.
pub fn parse_image_line(line: &str) -> Result<ImageRow, LineError> {
    let columns = columns(line, 4)?;

    let id = columns[0].trim().parse().map_err(|_| LineError::Number("id"))?;
    let views = columns[2]
        .trim()
        .parse()
        .map_err(|_| LineError::Number("views"))?;

    Ok(ImageRow {
        id,
        name: columns[1].trim().to_string(),
        views,
        alt: columns[3].trim().to_string(),
    })
}

/// Insert every valid row of `users.csv` contents.
pub async fn seed_users<S: GalleryStore>(
    store: &S,
    contents: &str,
    bcrypt_cost: u32,
    report: &mut SeedReport,
) -> Result<(), SeedError> {
    for (number, line) in data_lines(contents) {
        let row = match parse_user_line(line) {
            Ok(row) => row,
            Err(err) => {
                warn!(file = USERS_FILE, line = number, error = %err, "Skipping line");
                report.skipped += 1;
                continue;
            }
        };

        let passhash = hash_password(&row.password, bcrypt_cost).await?;
        let new_user = match NewUser::new(&row.username, passhash, row.admin) {
            Ok(user) => user,
            Err(err) => {
                warn!(file = USERS_FILE, line = number, error = %err, "Skipping line");
                report.skipped += 1;
                continue;
            }
        };

        match store.insert_user(&new_user).await {
            Ok(id) => {
                debug!(user_id = id, username = %row.username, admin = row.admin, "Seeded user");
                report.users += 1;
            }
            Err(StoreError::Duplicate(_)) => {
                warn!(file = USERS_FILE, line = number, username = %row.username, "Skipping duplicate user");
                report.skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// Insert every valid row of `images.csv` contents.
pub async fn seed_images<S: GalleryStore>(
    store: &S,
    contents: &str,
    report: &mut SeedReport,
) -> Result<(), SeedError> {
    for (number, line) in data_lines(contents) {
        let parsed = parse_image_line(line).and_then(|row| {
            let image = NewImage::with_views(&row.name, row.views, &row.alt)?;
            Ok((row, image))
        });
        let (row, image) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(file = IMAGES_FILE, line = number, error = %err, "Skipping line");
                report.skipped += 1;
                continue;
            }
        };

        match store.insert_image_with_id(row.id, &image).await {
            Ok(()) => {
                debug!(image_id = row.id, name = %row.name, "Seeded image");
                report.images += 1;
            }
            Err(StoreError::Duplicate(_)) => {
                warn!(file = IMAGES_FILE, line = number, image_id = row.id, "Skipping image with taken id");
                report.skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

async fn read(path: PathBuf) -> Result<String, SeedError> {
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| SeedError::Read { path, source })
}

/// Seed users then images from `dir`.
pub async fn run<S: GalleryStore>(
    store: &S,
    dir: &Path,
    bcrypt_cost: u32,
) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();

    info!("Seeding users");
    let users = read(dir.join(USERS_FILE)).await?;
    seed_users(store, &users, bcrypt_cost, &mut report).await?;

    info!("Seeding images");
    let images = read(dir.join(IMAGES_FILE)).await?;
    seed_images(store, &images, &mut report).await?;

    info!(
        users = report.users,
        images = report.images,
        skipped = report.skipped,
        "Seeding finished"
    );
    Ok(report)
}
