#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use inkpost::application::blog::{BlogService, ContentLimits};
use inkpost::application::pagination::PageRequest;
use inkpost::application::repos::{ContentSource, PostFilter, PostPage, SourceError};
use inkpost::cache::{CacheConfig, QueryCache};
use inkpost::domain::entities::{Author, Category, Comment, NewComment, Post, Tag};
use inkpost::infra::http::{AppState, build_router};
use inkpost::infra::mock::MockSource;
use serde_json::Value;
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "test-revalidate-token";

/// Wraps the bundled fixture and counts every call reaching the source.
pub struct CountingSource {
    inner: MockSource,
    calls: AtomicUsize,
}

impl CountingSource {
    pub fn bundled() -> Arc<Self> {
        Arc::new(Self {
            inner: MockSource::bundled().expect("bundled fixture loads"),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentSource for CountingSource {
    async fn list_posts(
        &self,
        filter: &PostFilter,
        page: PageRequest,
    ) -> Result<PostPage, SourceError> {
        self.hit();
        self.inner.list_posts(filter, page).await
    }

    async fn find_post_by_id(&self, id: &str) -> Result<Option<Post>, SourceError> {
        self.hit();
        self.inner.find_post_by_id(id).await
    }

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, SourceError> {
        self.hit();
        self.inner.find_post_by_slug(slug).await
    }

    async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>, SourceError> {
        self.hit();
        self.inner.recent_posts(limit).await
    }

    async fn related_posts(&self, post_id: &str, limit: usize) -> Result<Vec<Post>, SourceError> {
        self.hit();
        self.inner.related_posts(post_id, limit).await
    }

    async fn search_posts(&self, query: &str, limit: usize) -> Result<Vec<Post>, SourceError> {
        self.hit();
        self.inner.search_posts(query, limit).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, SourceError> {
        self.hit();
        self.inner.list_categories().await
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, SourceError> {
        self.hit();
        self.inner.find_category_by_slug(slug).await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, SourceError> {
        self.hit();
        self.inner.list_tags().await
    }

    async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>, SourceError> {
        self.hit();
        self.inner.find_tag_by_slug(slug).await
    }

    async fn list_authors(&self) -> Result<Vec<Author>, SourceError> {
        self.hit();
        self.inner.list_authors().await
    }

    async fn find_author_by_id(&self, id: &str) -> Result<Option<Author>, SourceError> {
        self.hit();
        self.inner.find_author_by_id(id).await
    }

    async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>, SourceError> {
        self.hit();
        self.inner.list_comments(post_id).await
    }

    async fn add_comment(&self, comment: NewComment) -> Result<Comment, SourceError> {
        self.hit();
        self.inner.add_comment(comment).await
    }
}

pub fn blog_service(source: Arc<dyn ContentSource>) -> BlogService {
    BlogService::new(
        source,
        QueryCache::new(CacheConfig::default()),
        ContentLimits::default(),
    )
}

pub fn router(blog: BlogService, revalidate_token: Option<&str>) -> Router {
    build_router(AppState {
        blog,
        revalidate_token: revalidate_token.map(str::to_string),
    })
}

pub fn bundled_router() -> Router {
    let source = MockSource::bundled().expect("bundled fixture loads");
    router(blog_service(Arc::new(source)), Some(ADMIN_TOKEN))
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body should be JSON")
    };
    (status, json)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, None, None).await
}

pub fn ids(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("array of posts")
        .iter()
        .map(|post| post["id"].as_str().expect("post id").to_string())
        .collect()
}
