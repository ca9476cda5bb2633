//! Content source backed by the blog's REST API.
//!
//! Lists use the paginated envelope `{count, next, previous, results}`.
//! Single-resource lookups map 404 to "not found"; no request is retried.

mod client;
mod models;

use std::cmp::Reverse;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::application::pagination::{MAX_PAGE_SIZE, PageRequest, Pagination};
use crate::application::repos::{ContentSource, PostFilter, PostPage, SourceError};
use crate::config::RemoteSettings;
use crate::domain::entities::{Author, Category, Comment, NewComment, Post, Tag};
use crate::domain::relevance::search_score;
use crate::domain::types::CommentStatus;
use crate::infra::error::InfraError;

use self::client::{ApiClient, Query};
use self::models::{
    ListBody, Paginated, WireAuthor, WireCategory, WireComment, WireNewComment, WirePost, WireTag,
};

const POSTS: &str = "posts";
const TAXONOMY_PAGE_SIZE: u32 = MAX_PAGE_SIZE;

/// REST-backed [`ContentSource`].
#[derive(Clone)]
pub struct RemoteSource {
    client: ApiClient,
}

impl RemoteSource {
    pub fn new(settings: &RemoteSettings) -> Result<Self, InfraError> {
        let client = ApiClient::new(settings)?;
        debug!(base_url = %client.base_url(), "configured remote content source");
        Ok(Self { client })
    }

    async fn post_page(
        &self,
        filter: &PostFilter,
        page: u32,
        per_page: u32,
    ) -> Result<Option<Paginated<WirePost>>, SourceError> {
        let mut query: Vec<(&str, String)> = vec![
            ("page", page.to_string()),
            ("page_size", per_page.to_string()),
        ];
        if let Some(category) = filter.category.as_ref() {
            query.push(("category", category.clone()));
        }
        if let Some(tag) = filter.tag.as_ref() {
            query.push(("tags", tag.clone()));
        }
        if let Some(text) = filter.query.as_ref() {
            query.push(("search", text.clone()));
        }
        self.client.get_optional(&["blog", POSTS], &query).await
    }

    async fn post_list(&self, query: &Query<'_>) -> Result<Vec<Post>, SourceError> {
        let body: ListBody<WirePost> = self.client.get(&["blog", POSTS], query).await?;
        Ok(published(body.into_results()))
    }

    async fn first_match<W, T>(&self, resource: &str, slug: &str) -> Result<Option<T>, SourceError>
    where
        W: serde::de::DeserializeOwned,
        T: From<W>,
    {
        let body: Option<ListBody<W>> = self
            .client
            .get_optional(&["blog", resource], &[("slug", slug.to_string())])
            .await?;
        Ok(body
            .and_then(|body| body.into_results().into_iter().next())
            .map(T::from))
    }

    async fn all<W, T>(&self, resource: &str) -> Result<Vec<T>, SourceError>
    where
        W: serde::de::DeserializeOwned,
        T: From<W>,
    {
        let body: ListBody<W> = self
            .client
            .get(
                &["blog", resource],
                &[("page_size", TAXONOMY_PAGE_SIZE.to_string())],
            )
            .await?;
        Ok(body.into_results().into_iter().map(T::from).collect())
    }

    /// Same-category recent posts, used when the related endpoint is unavailable.
    async fn related_fallback(
        &self,
        post_id: &str,
        limit: usize,
    ) -> Result<Vec<Post>, SourceError> {
        let Some(post) = self.find_post_by_id(post_id).await? else {
            return Ok(Vec::new());
        };
        let query = [
            ("category", post.category.slug.clone()),
            ("ordering", "-published_at".to_string()),
            ("page_size", (limit + 1).to_string()),
        ];
        let mut candidates = self.post_list(&query).await?;
        candidates.retain(|candidate| candidate.id != post.id);
        candidates.truncate(limit);
        Ok(candidates)
    }
}

fn published(posts: Vec<WirePost>) -> Vec<Post> {
    posts
        .into_iter()
        .filter_map(WirePost::into_published)
        .collect()
}

#[async_trait]
impl ContentSource for RemoteSource {
    async fn list_posts(
        &self,
        filter: &PostFilter,
        page: PageRequest,
    ) -> Result<PostPage, SourceError> {
        let per_page = page.per_page();
        let response = match self.post_page(filter, page.page(), per_page).await? {
            Some(response) => response,
            // The API answers 404 for pages past the end; clamp to the last page.
            None => {
                let first = self
                    .post_page(filter, 1, per_page)
                    .await?
                    .ok_or_else(|| SourceError::not_found("post listing"))?;
                let last_page = Pagination::resolve(page, first.count).current_page;
                debug!(requested = page.page(), last_page, "clamped remote listing page");
                if last_page == 1 {
                    first
                } else {
                    self.post_page(filter, last_page, per_page)
                        .await?
                        .ok_or_else(|| SourceError::not_found("post listing"))?
                }
            }
        };

        let pagination = Pagination::resolve(page, response.count);
        Ok(PostPage {
            posts: published(response.results),
            pagination,
        })
    }

    async fn find_post_by_id(&self, id: &str) -> Result<Option<Post>, SourceError> {
        let post: Option<WirePost> = self.client.get_optional(&["blog", POSTS, id], &[]).await?;
        Ok(post.and_then(WirePost::into_published))
    }

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, SourceError> {
        let body: Option<ListBody<WirePost>> = self
            .client
            .get_optional(&["blog", POSTS], &[("slug", slug.to_string())])
            .await?;
        Ok(body
            .map(|body| published(body.into_results()))
            .and_then(|posts| posts.into_iter().find(|post| post.slug == slug)))
    }

    async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>, SourceError> {
        let query = [
            ("ordering", "-published_at".to_string()),
            ("page_size", limit.to_string()),
        ];
        let mut posts = self.post_list(&query).await?;
        posts.truncate(limit);
        Ok(posts)
    }

    async fn related_posts(&self, post_id: &str, limit: usize) -> Result<Vec<Post>, SourceError> {
        let related: Result<Option<ListBody<WirePost>>, SourceError> = self
            .client
            .get_optional(
                &["blog", POSTS, post_id, "related"],
                &[("limit", limit.to_string())],
            )
            .await;

        match related {
            Ok(Some(body)) => {
                let mut posts = published(body.into_results());
                posts.retain(|post| post.id != post_id);
                posts.truncate(limit);
                Ok(posts)
            }
            Ok(None) => self.related_fallback(post_id, limit).await,
            Err(err) => {
                warn!(post_id, error = %err, "related endpoint failed, using category fallback");
                self.related_fallback(post_id, limit).await
            }
        }
    }

    /// Backend full-text matches, re-ordered by the local relevance score.
    ///
    /// List responses omit post bodies, so matches the backend found only in
    /// content keep their backend order after the locally scored ones.
    async fn search_posts(&self, query: &str, limit: usize) -> Result<Vec<Post>, SourceError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let params = [
            ("search", query.to_string()),
            ("page_size", limit.to_string()),
        ];
        let mut posts = self.post_list(&params).await?;
        let needle = query.to_lowercase();
        posts.sort_by_key(|post| Reverse(search_score(post, &needle)));
        posts.truncate(limit);
        Ok(posts)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, SourceError> {
        self.all::<WireCategory, Category>("categories").await
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, SourceError> {
        self.first_match::<WireCategory, Category>("categories", slug)
            .await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, SourceError> {
        self.all::<WireTag, Tag>("tags").await
    }

    async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>, SourceError> {
        self.first_match::<WireTag, Tag>("tags", slug).await
    }

    async fn list_authors(&self) -> Result<Vec<Author>, SourceError> {
        self.all::<WireAuthor, Author>("authors").await
    }

    async fn find_author_by_id(&self, id: &str) -> Result<Option<Author>, SourceError> {
        let author: Option<WireAuthor> = self
            .client
            .get_optional(&["blog", "authors", id], &[])
            .await?;
        Ok(author.map(Author::from))
    }

    async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>, SourceError> {
        let query = [
            ("post", post_id.to_string()),
            ("status", "approved".to_string()),
        ];
        let body: ListBody<WireComment> = self.client.get(&["blog", "comments"], &query).await?;
        let mut comments: Vec<Comment> = body
            .into_results()
            .into_iter()
            .map(Comment::from)
            .filter(|comment| comment.status == CommentStatus::Approved)
            .collect();
        comments.sort_by_key(|comment| comment.created_at);
        Ok(comments)
    }

    async fn add_comment(&self, comment: NewComment) -> Result<Comment, SourceError> {
        let created: WireComment = self
            .client
            .post(&["blog", "comments"], &WireNewComment::from(&comment))
            .await?;
        Ok(created.into())
    }
}
