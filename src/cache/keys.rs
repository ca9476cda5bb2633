//! Cache key definitions.
//!
//! `QueryDescriptor` identifies a logical data query; two descriptors with the
//! same operation and parameters address the same cache entry. `CacheTag`
//! groups entries for bulk invalidation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Logical data operation a descriptor refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    ListPosts,
    PostBySlug,
    PostById,
    RecentPosts,
    RelatedPosts,
    SearchPosts,
    Categories,
    Tags,
    Authors,
    Comments,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::ListPosts => "list_posts",
            Operation::PostBySlug => "post_by_slug",
            Operation::PostById => "post_by_id",
            Operation::RecentPosts => "recent_posts",
            Operation::RelatedPosts => "related_posts",
            Operation::SearchPosts => "search_posts",
            Operation::Categories => "categories",
            Operation::Tags => "tags",
            Operation::Authors => "authors",
            Operation::Comments => "comments",
        }
    }
}

/// A single descriptor parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamValue {
    Int(i64),
    Text(String),
    Flag(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(value) => write!(f, "{value}"),
            ParamValue::Text(value) => f.write_str(value),
            ParamValue::Flag(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        ParamValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Flag(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

/// Identity of a logical data request.
///
/// Parameters are held in a `BTreeMap`, so insertion order never affects
/// equality or hashing. Absent optional parameters are simply not inserted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryDescriptor {
    operation: Operation,
    params: BTreeMap<String, ParamValue>,
}

impl QueryDescriptor {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    /// Insert the parameter only when a value is present.
    pub fn param_opt<V: Into<ParamValue>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.param(name, value),
            None => self,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }
}

impl fmt::Display for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation.as_str())?;
        for (index, (name, value)) in self.params.iter().enumerate() {
            let separator = if index == 0 { '?' } else { '&' };
            write!(f, "{separator}{name}={value}")?;
        }
        Ok(())
    }
}

/// Invalidation label attached to cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CacheTag {
    Posts,
    Categories,
    Tags,
    Authors,
    Comments,
    /// Comments of one post, so a new comment does not flush every thread.
    PostComments(String),
}

const POST_COMMENTS_PREFIX: &str = "comments:";

impl CacheTag {
    /// Every collection-level tag, used for a full revalidation.
    pub const ALL: [CacheTag; 5] = [
        CacheTag::Posts,
        CacheTag::Categories,
        CacheTag::Tags,
        CacheTag::Authors,
        CacheTag::Comments,
    ];

    pub fn post_comments(post_id: impl Into<String>) -> Self {
        CacheTag::PostComments(post_id.into())
    }

    pub fn label(&self) -> String {
        match self {
            CacheTag::Posts => "posts".to_string(),
            CacheTag::Categories => "categories".to_string(),
            CacheTag::Tags => "tags".to_string(),
            CacheTag::Authors => "authors".to_string(),
            CacheTag::Comments => "comments".to_string(),
            CacheTag::PostComments(post_id) => format!("{POST_COMMENTS_PREFIX}{post_id}"),
        }
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cache tag `{0}`")]
pub struct UnknownTag(pub String);

impl FromStr for CacheTag {
    type Err = UnknownTag;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "posts" => Ok(CacheTag::Posts),
            "categories" => Ok(CacheTag::Categories),
            "tags" => Ok(CacheTag::Tags),
            "authors" => Ok(CacheTag::Authors),
            "comments" => Ok(CacheTag::Comments),
            other => match other.strip_prefix(POST_COMMENTS_PREFIX) {
                Some(post_id) if !post_id.is_empty() => Ok(CacheTag::post_comments(post_id)),
                _ => Err(UnknownTag(other.to_string())),
            },
        }
    }
}

impl TryFrom<String> for CacheTag {
    type Error = UnknownTag;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CacheTag> for String {
    fn from(tag: CacheTag) -> Self {
        tag.label()
    }
}
