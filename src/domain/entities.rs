//! Content entities shared by every content source.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::{
    error::DomainError,
    types::{CommentStatus, PostStatus},
};

const AUTHOR_NAME_MAX_CHARS: usize = 50;
const COMMENT_MAX_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub slug: String,
}

/// A published article with its author, category and tags resolved inline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub author: Author,
    pub category: Category,
    pub tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    pub status: PostStatus,
    pub reading_time: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    pub fn has_tag_slug(&self, slug: &str) -> bool {
        self.tags.iter().any(|tag| tag.slug == slug)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author: String,
    pub email: String,
    pub content: String,
    pub status: CommentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A reader-submitted comment awaiting persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub post_id: String,
    pub author: String,
    pub email: String,
    pub content: String,
}

impl NewComment {
    /// Trim and check the submission, returning the normalized comment.
    ///
    /// Emails are lower-cased so moderation tooling can match them exactly.
    pub fn validate(self) -> Result<Self, DomainError> {
        let post_id = self.post_id.trim().to_string();
        if post_id.is_empty() {
            return Err(DomainError::validation("post id is required"));
        }

        let author = self.author.trim().to_string();
        let author_len = author.chars().count();
        if author_len == 0 {
            return Err(DomainError::validation("author name is required"));
        }
        if author_len > AUTHOR_NAME_MAX_CHARS {
            return Err(DomainError::validation(format!(
                "author name must be at most {AUTHOR_NAME_MAX_CHARS} characters"
            )));
        }

        let email = self.email.trim().to_lowercase();
        if !looks_like_email(&email) {
            return Err(DomainError::validation("a valid email address is required"));
        }

        let content = self.content.trim().to_string();
        let content_len = content.chars().count();
        if content_len == 0 {
            return Err(DomainError::validation("comment content is required"));
        }
        if content_len > COMMENT_MAX_CHARS {
            return Err(DomainError::validation(format!(
                "comment must be at most {COMMENT_MAX_CHARS} characters"
            )));
        }

        Ok(Self {
            post_id,
            author,
            email,
            content,
        })
    }
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || value.chars().any(char::is_whitespace) {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
