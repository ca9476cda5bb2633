//! Relevance engine: free-text search ranking and related-post selection.
//!
//! Both entry points are pure and deterministic for a given input slice.
//! Scores are internal sort keys; ties keep the order of the input slice.

mod related;
mod search;

pub use related::{DEFAULT_RELATED_LIMIT, find_related, relatedness};
pub use search::{matches_query, rank_search_results, search_score};
