//! Generated filenames for uploaded images.

use std::path::Path;

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::error::ValidationError;

/// Shortest random stem.
pub const MIN_STEM_LEN: usize = 4;

/// Longest random stem; leaves room for `.` plus the extension in a
/// 20-character column.
pub const MAX_STEM_LEN: usize = 15;

/// Longest accepted file extension.
pub const MAX_EXTENSION_LEN: usize = 4;

/// Extract and normalize the extension of an uploaded file's original name.
///
/// Only 1 to 4 ASCII alphanumerics are accepted; the result is lowercased.
pub fn upload_extension(original_name: &str) -> Result<String, ValidationError> {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or(ValidationError::UnsupportedFileType)?;

    let valid = !extension.is_empty()
        && extension.len() <= MAX_EXTENSION_LEN
        && extension.chars().all(|c| c.is_ascii_alphanumeric());

    if valid {
        Ok(extension.to_ascii_lowercase())
    } else {
        Err(ValidationError::UnsupportedFileType)
    }
}

/// Generate `{random stem}.{extension}`.
///
/// Names are not checked against existing files.
pub fn generate_image_name(extension: &str) -> String {
    let mut rng = thread_rng();
    let len = rng.gen_range(MIN_STEM_LEN..=MAX_STEM_LEN);
    let stem: String = (&mut rng)
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect();

    format!("{}.{}", stem, extension)
}
