use crate::domain::entities::Post;

const TITLE_WEIGHT: u32 = 10;
const EXCERPT_WEIGHT: u32 = 5;
const CONTENT_WEIGHT: u32 = 2;
const CATEGORY_WEIGHT: u32 = 3;
const AUTHOR_WEIGHT: u32 = 2;
const TAG_WEIGHT: u32 = 3;

/// Rank `items` against a plain, case-insensitive substring query.
///
/// A blank query yields no results rather than the full list. Items that do
/// not match any searchable field are dropped; the rest are ordered by
/// descending score, keeping input order between equal scores. `limit`
/// truncates after sorting.
pub fn rank_search_results<'a>(
    items: &'a [Post],
    query: &str,
    limit: Option<usize>,
) -> Vec<&'a Post> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    let needle = query.to_lowercase();

    let mut scored: Vec<(u32, &Post)> = items
        .iter()
        .filter_map(|post| {
            let score = search_score(post, &needle);
            (score > 0).then_some((score, post))
        })
        .collect();

    // `sort_by` is stable: equal scores retain their relative input order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let ranked = scored.into_iter().map(|(_, post)| post);
    match limit {
        Some(limit) => ranked.take(limit).collect(),
        None => ranked.collect(),
    }
}

/// Weighted hit count of `needle` (already lower-cased) across a post's fields.
pub fn search_score(post: &Post, needle: &str) -> u32 {
    let hit = |text: &str, weight: u32| {
        if contains_folded(text, needle) {
            weight
        } else {
            0
        }
    };

    let tag_hits = post
        .tags
        .iter()
        .map(|tag| hit(&tag.name, TAG_WEIGHT))
        .sum::<u32>();

    hit(&post.title, TITLE_WEIGHT)
        + hit(&post.excerpt, EXCERPT_WEIGHT)
        + hit(&post.content, CONTENT_WEIGHT)
        + hit(&post.category.name, CATEGORY_WEIGHT)
        + hit(&post.author.name, AUTHOR_WEIGHT)
        + tag_hits
}

/// Whether `needle` (already lower-cased) occurs in a field the listing
/// filter covers: title, excerpt, content, tag names or category name.
///
/// The author name is a ranking signal for search only.
pub fn matches_query(post: &Post, needle: &str) -> bool {
    contains_folded(&post.title, needle)
        || contains_folded(&post.excerpt, needle)
        || contains_folded(&post.content, needle)
        || post.tags.iter().any(|tag| contains_folded(&tag.name, needle))
        || contains_folded(&post.category.name, needle)
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}
