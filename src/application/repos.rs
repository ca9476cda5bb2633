//! Content source contract shared by the fixture store and the REST client.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::application::pagination::{PageRequest, Pagination};
use crate::domain::entities::{Author, Category, Comment, NewComment, Post, Tag};
use crate::domain::error::DomainError;

#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("content backend rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("content backend unreachable: {message}")]
    Transport { message: String },
    #[error("content backend returned a malformed body: {message}")]
    Decode { message: String },
    #[error("invalid content data: {message}")]
    Invalid { message: String },
    #[error("unexpected source failure: {message}")]
    Unexpected { message: String },
}

impl SourceError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }
}

impl From<DomainError> for SourceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { entity } => Self::NotFound { entity },
            other => Self::invalid(other.to_string()),
        }
    }
}

/// Listing filters. Category and tag are matched by slug.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub query: Option<String>,
}

impl PostFilter {
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.tag.is_none() && self.query.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub pagination: Pagination,
}

/// Canonical owner of posts, taxonomy, authors and comments.
///
/// Single-resource lookups return `Ok(None)` when nothing matches; only
/// backend failures are errors. Only published posts are ever returned.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Filtered listing ordered by publication date, newest first.
    async fn list_posts(
        &self,
        filter: &PostFilter,
        page: PageRequest,
    ) -> Result<PostPage, SourceError>;

    async fn find_post_by_id(&self, id: &str) -> Result<Option<Post>, SourceError>;

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, SourceError>;

    async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>, SourceError>;

    /// Posts related to `post_id`; empty when the post does not exist.
    async fn related_posts(&self, post_id: &str, limit: usize) -> Result<Vec<Post>, SourceError>;

    async fn search_posts(&self, query: &str, limit: usize) -> Result<Vec<Post>, SourceError>;

    async fn list_categories(&self) -> Result<Vec<Category>, SourceError>;

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, SourceError>;

    async fn list_tags(&self) -> Result<Vec<Tag>, SourceError>;

    async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>, SourceError>;

    async fn list_authors(&self) -> Result<Vec<Author>, SourceError>;

    async fn find_author_by_id(&self, id: &str) -> Result<Option<Author>, SourceError>;

    /// Approved comments for a post, oldest first.
    async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>, SourceError>;

    /// Persist a validated comment. New comments start out pending moderation.
    async fn add_comment(&self, comment: NewComment) -> Result<Comment, SourceError>;
}
