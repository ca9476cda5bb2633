//! Post helpers that do not depend on a content source.

use std::cmp::Reverse;

use crate::domain::entities::Post;

/// Characters read per minute when estimating reading time.
const READING_CHARS_PER_MINUTE: usize = 200;

/// Estimated reading time in whole minutes, never below one.
pub fn reading_time_minutes(content: &str) -> u32 {
    let minutes = content.chars().count() / READING_CHARS_PER_MINUTE;
    u32::try_from(minutes).unwrap_or(u32::MAX).max(1)
}

/// Newest first. The sort is stable, so equal timestamps keep input order.
pub fn sort_by_recency(posts: &mut [Post]) {
    posts.sort_by_key(|post| Reverse(post.published_at));
}
