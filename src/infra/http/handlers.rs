use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::blog::{BlogPage, CategoryHighlight, ListQuery, PostView, Sidebar};
use crate::application::repos::PostPage;
use crate::cache::CacheTag;
use crate::domain::entities::{Author, Category, Comment, NewComment, Post, Tag};

use super::AppState;
use super::error::ApiError;
use super::extract::{ApiJson, ApiPath, ApiQuery};

const DEFAULT_HIGHLIGHTS_PER_CATEGORY: u32 = 3;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub q: Option<String>,
    pub page: Option<i64>,
}

impl From<ListParams> for ListQuery {
    fn from(params: ListParams) -> Self {
        ListQuery {
            category: params.category,
            tag: params.tag,
            query: params.q,
            page: params.page,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HighlightParams {
    pub per_category: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub author: String,
    pub email: String,
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RevalidateBody {
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct RevalidateResponse {
    pub revalidated: Vec<String>,
    pub removed: usize,
}

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn list_posts(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<PostPage>, ApiError> {
    let page = state.blog.list_posts(&params.into()).await?;
    Ok(Json(page))
}

pub async fn blog_page(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<BlogPage>, ApiError> {
    let page = state.blog.blog_page(&params.into()).await?;
    Ok(Json(page))
}

pub async fn post_detail(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<PostView>, ApiError> {
    state
        .blog
        .post_page(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Post not found"))
}

pub async fn related_posts(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<String>,
    ApiQuery(params): ApiQuery<LimitParams>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let posts = state.blog.related_posts(&post_id, params.limit).await?;
    Ok(Json(posts))
}

pub async fn search(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let posts = state.blog.search(&params.q, params.limit).await?;
    Ok(Json(posts))
}

pub async fn sidebar(State(state): State<AppState>) -> Result<Json<Sidebar>, ApiError> {
    Ok(Json(state.blog.sidebar().await?))
}

pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.blog.categories().await?))
}

pub async fn tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, ApiError> {
    Ok(Json(state.blog.tags().await?))
}

pub async fn authors(State(state): State<AppState>) -> Result<Json<Vec<Author>>, ApiError> {
    Ok(Json(state.blog.authors().await?))
}

pub async fn highlights(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HighlightParams>,
) -> Result<Json<Vec<CategoryHighlight>>, ApiError> {
    let per_category = params
        .per_category
        .unwrap_or(DEFAULT_HIGHLIGHTS_PER_CATEGORY);
    Ok(Json(state.blog.category_highlights(per_category).await?))
}

pub async fn list_comments(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<String>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    Ok(Json(state.blog.comments(&post_id).await?))
}

pub async fn add_comment(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<String>,
    ApiJson(body): ApiJson<CommentBody>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = NewComment {
        post_id,
        author: body.author,
        email: body.email,
        content: body.content,
    };
    let created = state.blog.add_comment(comment).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Drop cached entries by tag. An empty body revalidates every collection.
pub async fn revalidate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RevalidateResponse>, ApiError> {
    let request: RevalidateBody = if body.is_empty() {
        RevalidateBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| ApiError::bad_request("Invalid request body", Some(err.to_string())))?
    };

    let tags = match request.tags {
        Some(labels) => labels
            .iter()
            .map(|label| label.parse::<CacheTag>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| ApiError::bad_request("Unknown cache tag", Some(err.to_string())))?,
        None => CacheTag::ALL.to_vec(),
    };

    let removed = state.blog.revalidate(&tags);
    let revalidated: Vec<String> = tags.iter().map(CacheTag::label).collect();
    info!(tags = ?revalidated, removed, "revalidated cache");
    Ok(Json(RevalidateResponse {
        revalidated,
        removed,
    }))
}
