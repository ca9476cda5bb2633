//! Wire shapes of the REST content API and their conversion into domain entities.

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::domain::entities::{Author, Category, Comment, NewComment, Post, Tag};
use crate::domain::posts::reading_time_minutes;
use crate::domain::types::{CommentStatus, PostStatus};

const UNCATEGORIZED_ID: &str = "uncategorized";

/// Paginated list envelope.
#[derive(Debug, Deserialize)]
pub(super) struct Paginated<T> {
    pub count: u64,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// Some endpoints answer with a bare list, others with the paginated envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum ListBody<T> {
    Page(Paginated<T>),
    Bare(Vec<T>),
}

impl<T> ListBody<T> {
    pub fn into_results(self) -> Vec<T> {
        match self {
            ListBody::Page(page) => page.results,
            ListBody::Bare(items) => items,
        }
    }
}

/// Ids arrive as JSON numbers from some backends and strings from others.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

#[derive(Debug, Deserialize)]
pub(super) struct WireAuthor {
    #[serde(deserialize_with = "id_string")]
    id: String,
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
}

impl From<WireAuthor> for Author {
    fn from(wire: WireAuthor) -> Self {
        Self {
            id: wire.id,
            name: wire.name,
            email: non_empty(wire.email),
            bio: non_empty(wire.bio),
            avatar: non_empty(wire.avatar),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct WireCategory {
    #[serde(deserialize_with = "id_string")]
    id: String,
    name: String,
    slug: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

impl From<WireCategory> for Category {
    fn from(wire: WireCategory) -> Self {
        Self {
            id: wire.id,
            name: wire.name,
            slug: wire.slug,
            description: non_empty(wire.description),
            color: non_empty(wire.color),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct WireTag {
    #[serde(deserialize_with = "id_string")]
    id: String,
    name: String,
    slug: String,
}

impl From<WireTag> for Tag {
    fn from(wire: WireTag) -> Self {
        Self {
            id: wire.id,
            name: wire.name,
            slug: wire.slug,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct WirePost {
    #[serde(deserialize_with = "id_string")]
    id: String,
    slug: String,
    title: String,
    #[serde(default)]
    excerpt: String,
    /// Absent from list responses.
    #[serde(default)]
    content: String,
    author: WireAuthor,
    #[serde(default)]
    category: Option<WireCategory>,
    #[serde(default)]
    tags: Vec<WireTag>,
    #[serde(default)]
    featured_image: Option<String>,
    #[serde(default)]
    status: PostStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    published_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    updated_at: Option<OffsetDateTime>,
    #[serde(default)]
    reading_time: Option<u32>,
}

impl WirePost {
    /// Convert a published post; drafts and undated posts yield `None`.
    pub fn into_published(self) -> Option<Post> {
        let published_at = self.published_at?;
        if self.status != PostStatus::Published {
            return None;
        }

        let category = self.category.map(Category::from).unwrap_or_else(|| Category {
            id: UNCATEGORIZED_ID.to_string(),
            name: "Uncategorized".to_string(),
            slug: UNCATEGORIZED_ID.to_string(),
            description: None,
            color: None,
        });
        let reading_time = self
            .reading_time
            .unwrap_or_else(|| reading_time_minutes(&self.content));

        Some(Post {
            id: self.id,
            slug: self.slug,
            title: self.title,
            excerpt: self.excerpt,
            content: self.content,
            author: self.author.into(),
            category,
            tags: self.tags.into_iter().map(Tag::from).collect(),
            featured_image: non_empty(self.featured_image),
            status: self.status,
            reading_time,
            published_at,
            updated_at: self.updated_at.unwrap_or(published_at),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct WireComment {
    #[serde(deserialize_with = "id_string")]
    id: String,
    #[serde(alias = "post", deserialize_with = "id_string")]
    post_id: String,
    author: String,
    #[serde(default)]
    email: String,
    content: String,
    #[serde(default)]
    status: CommentStatus,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl From<WireComment> for Comment {
    fn from(wire: WireComment) -> Self {
        Self {
            id: wire.id,
            post_id: wire.post_id,
            author: wire.author,
            email: wire.email,
            content: wire.content,
            status: wire.status,
            created_at: wire.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct WireNewComment<'a> {
    post: &'a str,
    author: &'a str,
    email: &'a str,
    content: &'a str,
}

impl<'a> From<&'a NewComment> for WireNewComment<'a> {
    fn from(comment: &'a NewComment) -> Self {
        Self {
            post: &comment.post_id,
            author: &comment.author,
            email: &comment.email,
            content: &comment.content,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
