//! In-memory content source backed by a TOML fixture.
//!
//! The fixture is validated once at load time: ids and slugs are unique per
//! collection, slugs are normalized, and every reference resolves. Only
//! published posts are served.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::pagination::{PageRequest, Pagination};
use crate::application::repos::{ContentSource, PostFilter, PostPage, SourceError};
use crate::domain::entities::{Author, Category, Comment, NewComment, Post, Tag};
use crate::domain::error::DomainError;
use crate::domain::posts::{reading_time_minutes, sort_by_recency};
use crate::domain::relevance::{find_related, matches_query, rank_search_results};
use crate::domain::slug::validate_slug;
use crate::domain::types::{CommentStatus, PostStatus};

use super::error::InfraError;

const BUNDLED_FIXTURE: &str = include_str!("../../fixtures/blog.toml");
const BUNDLED_ORIGIN: &str = "bundled:fixtures/blog.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureFile {
    #[serde(default)]
    authors: Vec<Author>,
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    posts: Vec<FixturePost>,
    #[serde(default)]
    comments: Vec<FixtureComment>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixturePost {
    id: String,
    slug: String,
    title: String,
    #[serde(default)]
    excerpt: String,
    #[serde(default)]
    content: String,
    author_id: String,
    category_id: String,
    #[serde(default)]
    tag_ids: Vec<String>,
    #[serde(default)]
    featured_image: Option<String>,
    #[serde(default)]
    status: PostStatus,
    #[serde(default)]
    reading_time: Option<u32>,
    #[serde(with = "time::serde::rfc3339")]
    published_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureComment {
    id: String,
    post_id: String,
    author: String,
    email: String,
    content: String,
    #[serde(default = "approved")]
    status: CommentStatus,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

fn approved() -> CommentStatus {
    CommentStatus::Approved
}

/// Fixture-backed [`ContentSource`].
pub struct MockSource {
    /// Published posts, newest first.
    posts: Vec<Post>,
    categories: Vec<Category>,
    tags: Vec<Tag>,
    authors: Vec<Author>,
    comments: RwLock<Vec<Comment>>,
}

impl MockSource {
    /// The fixture compiled into the binary.
    pub fn bundled() -> Result<Self, InfraError> {
        Self::from_toml_str(BUNDLED_FIXTURE, BUNDLED_ORIGIN)
    }

    pub async fn load(path: &Path) -> Result<Self, InfraError> {
        let origin = path.display().to_string();
        let input = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| InfraError::fixture(&origin, err.to_string()))?;
        Self::from_toml_str(&input, &origin)
    }

    pub fn from_toml_str(input: &str, origin: &str) -> Result<Self, InfraError> {
        let file: FixtureFile =
            toml::from_str(input).map_err(|err| InfraError::fixture(origin, err.to_string()))?;
        let source = Self::from_fixture(file).map_err(|source| InfraError::FixtureInvariant {
            origin: origin.to_string(),
            source,
        })?;
        info!(
            origin,
            posts = source.posts.len(),
            categories = source.categories.len(),
            tags = source.tags.len(),
            "loaded content fixture"
        );
        Ok(source)
    }

    fn from_fixture(file: FixtureFile) -> Result<Self, DomainError> {
        let FixtureFile {
            authors,
            categories,
            tags,
            posts,
            comments,
        } = file;

        ensure_unique("author", "id", authors.iter().map(|a| a.id.as_str()))?;
        ensure_unique("category", "id", categories.iter().map(|c| c.id.as_str()))?;
        ensure_unique("category", "slug", categories.iter().map(|c| c.slug.as_str()))?;
        ensure_unique("tag", "id", tags.iter().map(|t| t.id.as_str()))?;
        ensure_unique("tag", "slug", tags.iter().map(|t| t.slug.as_str()))?;
        ensure_unique("post", "id", posts.iter().map(|p| p.id.as_str()))?;
        ensure_unique("post", "slug", posts.iter().map(|p| p.slug.as_str()))?;
        ensure_unique("comment", "id", comments.iter().map(|c| c.id.as_str()))?;

        let slugs = categories
            .iter()
            .map(|c| c.slug.as_str())
            .chain(tags.iter().map(|t| t.slug.as_str()))
            .chain(posts.iter().map(|p| p.slug.as_str()));
        for slug in slugs {
            validate_slug(slug).map_err(|err| DomainError::validation(err.to_string()))?;
        }

        let authors_by_id: HashMap<&str, &Author> =
            authors.iter().map(|a| (a.id.as_str(), a)).collect();
        let categories_by_id: HashMap<&str, &Category> =
            categories.iter().map(|c| (c.id.as_str(), c)).collect();
        let tags_by_id: HashMap<&str, &Tag> = tags.iter().map(|t| (t.id.as_str(), t)).collect();

        let all_post_ids: HashSet<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        for comment in &comments {
            if !all_post_ids.contains(comment.post_id.as_str()) {
                return Err(DomainError::dangling(
                    "comment",
                    &comment.id,
                    "post",
                    &comment.post_id,
                ));
            }
        }

        let mut published = Vec::with_capacity(posts.len());
        for raw in posts {
            let author = authors_by_id
                .get(raw.author_id.as_str())
                .ok_or_else(|| DomainError::dangling("post", &raw.id, "author", &raw.author_id))?;
            let category = categories_by_id
                .get(raw.category_id.as_str())
                .ok_or_else(|| {
                    DomainError::dangling("post", &raw.id, "category", &raw.category_id)
                })?;

            let mut seen = HashSet::new();
            let mut post_tags = Vec::with_capacity(raw.tag_ids.len());
            for tag_id in &raw.tag_ids {
                let tag = tags_by_id
                    .get(tag_id.as_str())
                    .ok_or_else(|| DomainError::dangling("post", &raw.id, "tag", tag_id))?;
                if seen.insert(tag_id.as_str()) {
                    post_tags.push((*tag).clone());
                }
            }

            if raw.status != PostStatus::Published {
                debug!(post = %raw.id, "skipping unpublished fixture post");
                continue;
            }

            let reading_time = raw
                .reading_time
                .unwrap_or_else(|| reading_time_minutes(&raw.content));
            published.push(Post {
                reading_time,
                updated_at: raw.updated_at.unwrap_or(raw.published_at),
                published_at: raw.published_at,
                author: (*author).clone(),
                category: (*category).clone(),
                tags: post_tags,
                id: raw.id,
                slug: raw.slug,
                title: raw.title,
                excerpt: raw.excerpt,
                content: raw.content,
                featured_image: raw.featured_image,
                status: raw.status,
            });
        }
        sort_by_recency(&mut published);

        let comments = comments
            .into_iter()
            .map(|raw| Comment {
                id: raw.id,
                post_id: raw.post_id,
                author: raw.author,
                email: raw.email,
                content: raw.content,
                status: raw.status,
                created_at: raw.created_at,
            })
            .collect();

        Ok(Self {
            posts: published,
            categories,
            tags,
            authors,
            comments: RwLock::new(comments),
        })
    }

    fn post_by_id(&self, id: &str) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == id)
    }
}

fn ensure_unique<'a>(
    entity: &'static str,
    field: &'static str,
    values: impl Iterator<Item = &'a str>,
) -> Result<(), DomainError> {
    let mut seen = HashSet::new();
    for value in values {
        if !seen.insert(value) {
            return Err(DomainError::invariant(format!(
                "duplicate {entity} {field} `{value}`"
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl ContentSource for MockSource {
    async fn list_posts(
        &self,
        filter: &PostFilter,
        page: PageRequest,
    ) -> Result<PostPage, SourceError> {
        let needle = filter.query.as_deref().map(str::to_lowercase);
        let matching: Vec<&Post> = self
            .posts
            .iter()
            .filter(|post| {
                filter
                    .category
                    .as_deref()
                    .is_none_or(|slug| post.category.slug == slug)
            })
            .filter(|post| filter.tag.as_deref().is_none_or(|slug| post.has_tag_slug(slug)))
            .filter(|post| {
                needle
                    .as_deref()
                    .is_none_or(|needle| matches_query(post, needle))
            })
            .collect();

        let pagination = Pagination::resolve(page, matching.len() as u64);
        let posts = matching[pagination.window(&matching)]
            .iter()
            .copied()
            .cloned()
            .collect();
        Ok(PostPage { posts, pagination })
    }

    async fn find_post_by_id(&self, id: &str) -> Result<Option<Post>, SourceError> {
        Ok(self.post_by_id(id).cloned())
    }

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, SourceError> {
        Ok(self.posts.iter().find(|post| post.slug == slug).cloned())
    }

    async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>, SourceError> {
        Ok(self.posts.iter().take(limit).cloned().collect())
    }

    async fn related_posts(&self, post_id: &str, limit: usize) -> Result<Vec<Post>, SourceError> {
        Ok(find_related(&self.posts, post_id, limit)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn search_posts(&self, query: &str, limit: usize) -> Result<Vec<Post>, SourceError> {
        Ok(rank_search_results(&self.posts, query, Some(limit))
            .into_iter()
            .cloned()
            .collect())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, SourceError> {
        Ok(self.categories.clone())
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, SourceError> {
        Ok(self.categories.iter().find(|c| c.slug == slug).cloned())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, SourceError> {
        Ok(self.tags.clone())
    }

    async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>, SourceError> {
        Ok(self.tags.iter().find(|t| t.slug == slug).cloned())
    }

    async fn list_authors(&self) -> Result<Vec<Author>, SourceError> {
        Ok(self.authors.clone())
    }

    async fn find_author_by_id(&self, id: &str) -> Result<Option<Author>, SourceError> {
        Ok(self.authors.iter().find(|a| a.id == id).cloned())
    }

    async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>, SourceError> {
        let comments = self.comments.read().await;
        let mut approved: Vec<Comment> = comments
            .iter()
            .filter(|c| c.post_id == post_id && c.status == CommentStatus::Approved)
            .cloned()
            .collect();
        approved.sort_by_key(|c| c.created_at);
        Ok(approved)
    }

    async fn add_comment(&self, comment: NewComment) -> Result<Comment, SourceError> {
        if self.post_by_id(&comment.post_id).is_none() {
            return Err(SourceError::not_found("post"));
        }

        let created = Comment {
            id: Uuid::new_v4().to_string(),
            post_id: comment.post_id,
            author: comment.author,
            email: comment.email,
            content: comment.content,
            status: CommentStatus::Pending,
            created_at: OffsetDateTime::now_utc(),
        };
        self.comments.write().await.push(created.clone());
        debug!(comment = %created.id, post = %created.post_id, "stored pending comment");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
[[authors]]
id = "a1"
name = "Mina Ito"

[[categories]]
id = "c1"
name = "Engineering"
slug = "engineering"

[[categories]]
id = "c2"
name = "Design"
slug = "design"

[[tags]]
id = "t1"
name = "Rust"
slug = "rust"

[[tags]]
id = "t2"
name = "CSS"
slug = "css"

[[posts]]
id = "1"
slug = "older-rust-post"
title = "Ownership in practice"
content = "Borrowing rules"
author_id = "a1"
category_id = "c1"
tag_ids = ["t1", "t1"]
published_at = "2024-01-01T09:00:00Z"

[[posts]]
id = "2"
slug = "newer-design-post"
title = "Grid layouts"
excerpt = "CSS grid from scratch"
author_id = "a1"
category_id = "c2"
tag_ids = ["t2"]
published_at = "2024-02-01T09:00:00Z"

[[posts]]
id = "3"
slug = "draft-post"
title = "Unfinished rust notes"
author_id = "a1"
category_id = "c1"
status = "draft"
published_at = "2024-03-01T09:00:00Z"

[[comments]]
id = "m2"
post_id = "1"
author = "Ken"
email = "ken@example.com"
content = "Second"
created_at = "2024-01-03T09:00:00Z"

[[comments]]
id = "m1"
post_id = "1"
author = "Aya"
email = "aya@example.com"
content = "First"
created_at = "2024-01-02T09:00:00Z"

[[comments]]
id = "m3"
post_id = "1"
author = "Spam"
email = "spam@example.com"
content = "Buy now"
status = "rejected"
created_at = "2024-01-02T10:00:00Z"
"#;

    fn source() -> MockSource {
        MockSource::from_toml_str(SMALL, "test").expect("fixture loads")
    }

    fn ids(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn bundled_fixture_is_valid() {
        let source = MockSource::bundled().expect("bundled fixture loads");
        assert!(!source.posts.is_empty());
        assert!(source.posts.iter().all(Post::is_published));
    }

    #[test]
    fn drafts_are_hidden_and_tags_deduplicated() {
        let source = source();
        assert_eq!(ids(&source.posts), ["2", "1"]);
        assert_eq!(source.posts[1].tags.len(), 1);
    }

    #[test]
    fn reading_time_is_derived_when_absent() {
        let source = source();
        assert!(source.posts.iter().all(|p| p.reading_time >= 1));
    }

    #[tokio::test]
    async fn listing_filters_and_paginates() {
        let source = source();
        let filter = PostFilter {
            category: Some("engineering".to_string()),
            ..PostFilter::default()
        };
        let page = source
            .list_posts(&filter, PageRequest::new(1, 10))
            .await
            .expect("listing");
        assert_eq!(ids(&page.posts), ["1"]);
        assert_eq!(page.pagination.total_items, 1);

        let by_query = PostFilter {
            query: Some("GRID".to_string()),
            ..PostFilter::default()
        };
        let page = source
            .list_posts(&by_query, PageRequest::new(1, 10))
            .await
            .expect("listing");
        assert_eq!(ids(&page.posts), ["2"]);
    }

    #[tokio::test]
    async fn listing_text_filter_ignores_author_names() {
        let source = source();
        let by_author = PostFilter {
            query: Some("mina".to_string()),
            ..PostFilter::default()
        };
        let page = source
            .list_posts(&by_author, PageRequest::new(1, 10))
            .await
            .expect("listing");
        assert!(page.posts.is_empty());
        assert_eq!(page.pagination.total_items, 0);

        let by_category = PostFilter {
            query: Some("engineering".to_string()),
            ..PostFilter::default()
        };
        let page = source
            .list_posts(&by_category, PageRequest::new(1, 10))
            .await
            .expect("listing");
        assert_eq!(ids(&page.posts), ["1"]);

        let ranked = source.search_posts("mina", 10).await.expect("search");
        assert_eq!(ids(&ranked), ["2", "1"]);
    }

    #[tokio::test]
    async fn out_of_range_page_clamps_to_last() {
        let source = source();
        let page = source
            .list_posts(&PostFilter::default(), PageRequest::new(7, 1))
            .await
            .expect("listing");
        assert_eq!(page.pagination.current_page, 2);
        assert_eq!(ids(&page.posts), ["1"]);
    }

    #[tokio::test]
    async fn comments_are_approved_only_and_oldest_first() {
        let source = source();
        let comments = source.list_comments("1").await.expect("comments");
        let ids: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2"]);
    }

    #[tokio::test]
    async fn new_comments_are_pending() {
        let source = source();
        let created = source
            .add_comment(NewComment {
                post_id: "2".to_string(),
                author: "Reader".to_string(),
                email: "reader@example.com".to_string(),
                content: "Thanks".to_string(),
            })
            .await
            .expect("comment stored");
        assert_eq!(created.status, CommentStatus::Pending);
        assert!(source.list_comments("2").await.expect("comments").is_empty());
    }

    #[tokio::test]
    async fn comments_on_unknown_posts_are_rejected() {
        let err = source()
            .add_comment(NewComment {
                post_id: "3".to_string(),
                author: "Reader".to_string(),
                email: "reader@example.com".to_string(),
                content: "Hidden draft".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound { entity: "post" }));
    }

    #[test]
    fn dangling_references_fail_loading() {
        let broken = SMALL.replace("category_id = \"c2\"", "category_id = \"c9\"");
        let err = MockSource::from_toml_str(&broken, "test").err().expect("load fails");
        assert!(matches!(
            err,
            InfraError::FixtureInvariant {
                source: DomainError::DanglingReference { target: "category", .. },
                ..
            }
        ));
    }

    #[test]
    fn duplicate_slugs_fail_loading() {
        let broken = SMALL.replace("slug = \"css\"", "slug = \"rust\"");
        let err = MockSource::from_toml_str(&broken, "test").err().expect("load fails");
        assert!(matches!(
            err,
            InfraError::FixtureInvariant {
                source: DomainError::Invariant { .. },
                ..
            }
        ));
    }

    #[test]
    fn malformed_slugs_fail_loading() {
        let broken = SMALL.replace("slug = \"design\"", "slug = \"Design Notes\"");
        assert!(MockSource::from_toml_str(&broken, "test").is_err());
    }
}
