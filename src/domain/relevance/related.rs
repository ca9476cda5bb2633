use std::collections::HashSet;

use crate::domain::entities::Post;

/// Number of related posts shown when the caller does not ask for a count.
pub const DEFAULT_RELATED_LIMIT: usize = 3;

const CATEGORY_SCORE: u32 = 3;
const SHARED_TAG_SCORE: u32 = 2;

/// Select up to `limit` posts related to the post identified by `target_id`.
///
/// An unknown target yields an empty result. The target itself and candidates
/// sharing neither category nor tags are excluded. Ordering is by descending
/// relatedness, keeping input order between equal scores.
pub fn find_related<'a>(items: &'a [Post], target_id: &str, limit: usize) -> Vec<&'a Post> {
    let Some(target) = items.iter().find(|post| post.id == target_id) else {
        return Vec::new();
    };

    let mut scored: Vec<(u32, &Post)> = items
        .iter()
        .filter(|candidate| candidate.id != target.id)
        .filter_map(|candidate| {
            let score = relatedness(target, candidate);
            (score > 0).then_some((score, candidate))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(limit).map(|(_, post)| post).collect()
}

/// +3 for a shared category, +2 per distinct tag the candidate shares.
pub fn relatedness(target: &Post, candidate: &Post) -> u32 {
    let category = if candidate.category.id == target.category.id {
        CATEGORY_SCORE
    } else {
        0
    };

    let target_tags: HashSet<&str> = target.tags.iter().map(|tag| tag.id.as_str()).collect();
    let mut seen = HashSet::new();
    let shared = candidate
        .tags
        .iter()
        .filter(|tag| target_tags.contains(tag.id.as_str()) && seen.insert(tag.id.as_str()))
        .count();

    category + SHARED_TAG_SCORE * u32::try_from(shared).unwrap_or(u32::MAX / SHARED_TAG_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::relevance::test_support::*;

    fn ids<'a>(posts: &[&'a Post]) -> Vec<&'a str> {
        posts.iter().map(|p| p.id.as_str()).collect()
    }

    fn scenario() -> Vec<Post> {
        vec![
            post("target")
                .category("tech", "Tech")
                .tags(&[("a", "A"), ("b", "B")]),
            post("z").category("other", "Other"),
            post("y").category("other", "Other").tags(&[("a", "A")]),
            post("x").category("tech", "Tech"),
        ]
    }

    #[test]
    fn category_beats_single_shared_tag_and_zero_scores_drop() {
        let items = scenario();
        let related = find_related(&items, "target", DEFAULT_RELATED_LIMIT);
        assert_eq!(ids(&related), ["x", "y"]);
    }

    #[test]
    fn unknown_target_yields_empty() {
        let items = scenario();
        assert!(find_related(&items, "missing", 3).is_empty());
    }

    #[test]
    fn target_is_never_included() {
        let mut items = scenario();
        // A second copy with the same id must also be excluded.
        items.push(post("target").category("tech", "Tech"));
        let related = find_related(&items, "target", 10);
        assert!(related.iter().all(|p| p.id != "target"));
    }

    #[test]
    fn shared_tags_accumulate() {
        let items = vec![
            post("t")
                .category("c1", "One")
                .tags(&[("a", "A"), ("b", "B"), ("c", "C")]),
            post("two-tags").category("c2", "Two").tags(&[("a", "A"), ("b", "B")]),
            post("cat-and-tag").category("c1", "One").tags(&[("c", "C")]),
            post("one-tag").category("c2", "Two").tags(&[("b", "B")]),
        ];
        assert_eq!(relatedness(&items[0], &items[1]), 4);
        assert_eq!(relatedness(&items[0], &items[2]), 5);
        assert_eq!(
            ids(&find_related(&items, "t", 3)),
            ["cat-and-tag", "two-tags", "one-tag"]
        );
    }

    #[test]
    fn duplicate_tag_entries_count_once() {
        let target = post("t").tags(&[("a", "A")]);
        let candidate = post("c")
            .category("elsewhere", "Elsewhere")
            .tags(&[("a", "A"), ("a", "A")]);
        assert_eq!(relatedness(&target, &candidate), 2);
    }

    #[test]
    fn ties_keep_input_order_and_limit_applies() {
        let items = vec![
            post("t").category("c", "C"),
            post("p1").category("c", "C"),
            post("p2").category("c", "C"),
            post("p3").category("c", "C"),
            post("p4").category("c", "C"),
        ];
        assert_eq!(ids(&find_related(&items, "t", 3)), ["p1", "p2", "p3"]);
        assert!(find_related(&items, "t", 0).is_empty());
    }

    #[test]
    fn repeated_calls_return_the_same_order() {
        let mut items = scenario();
        items.extend((0..12).map(|n| {
            let candidate = post(&format!("tie-{n}")).category("tech", "Tech");
            if n % 2 == 0 {
                candidate.tags(&[("b", "B")])
            } else {
                candidate
            }
        }));

        let first = ids(&find_related(&items, "target", 5));
        assert_eq!(first.len(), 5);
        for _ in 0..10 {
            assert_eq!(ids(&find_related(&items, "target", 5)), first);
        }
    }
}
