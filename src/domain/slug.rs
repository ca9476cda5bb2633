//! Slug checks shared by fixture loading and query validation.
//!
//! A slug is well formed when `slug::slugify` leaves it unchanged: lower-case
//! ASCII alphanumerics separated by single hyphens.

use slug::slugify;
use thiserror::Error;

const MAX_SLUG_LEN: usize = 120;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug is empty")]
    Empty,
    #[error("slug `{input}` exceeds {MAX_SLUG_LEN} characters")]
    TooLong { input: String },
    #[error("slug `{input}` is not normalized (expected `{expected}`)")]
    Malformed { input: String, expected: String },
}

/// Accept `input` only if it is already a normalized slug.
pub fn validate_slug(input: &str) -> Result<&str, SlugError> {
    if input.is_empty() {
        return Err(SlugError::Empty);
    }
    if input.len() > MAX_SLUG_LEN {
        return Err(SlugError::TooLong {
            input: input.to_string(),
        });
    }

    let expected = slugify(input);
    if expected != input {
        return Err(SlugError::Malformed {
            input: input.to_string(),
            expected,
        });
    }

    Ok(input)
}
