//! Cached read/write façade over a [`ContentSource`].
//!
//! Every read goes through the shared [`QueryCache`] with a TTL class and the
//! invalidation tags of the collections it depends on. Writes invalidate the
//! tags they affect.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::application::error::AppError;
use crate::application::pagination::{
    MAX_RELATED_LIMIT, MAX_SEARCH_LIMIT, PageRequest, Pagination, clamp_limit,
};
use crate::application::repos::{ContentSource, PostFilter, PostPage, SourceError};
use crate::cache::{
    BatchQuery, CacheOptions, CacheTag, Operation, QueryCache, QueryDescriptor, TtlClass,
};
use crate::domain::entities::{Author, Category, Comment, NewComment, Post, Tag};
use crate::domain::slug::validate_slug;

/// Listing sizes used by the composite views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentLimits {
    pub page_size: u32,
    pub recent_limit: usize,
    pub related_limit: usize,
}

impl Default for ContentLimits {
    fn default() -> Self {
        Self {
            page_size: crate::application::pagination::DEFAULT_PAGE_SIZE,
            recent_limit: 5,
            related_limit: crate::domain::relevance::DEFAULT_RELATED_LIMIT,
        }
    }
}

/// Raw listing parameters as received from a caller.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub query: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Sidebar {
    pub categories: Vec<Category>,
    pub tags: Vec<Tag>,
    pub recent_posts: Vec<Post>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlogPage {
    pub posts: Vec<Post>,
    pub pagination: Pagination,
    pub sidebar: Sidebar,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub post: Post,
    pub related: Vec<Post>,
    pub comments: Vec<Comment>,
    pub sidebar: Sidebar,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryHighlight {
    pub category: Category,
    pub posts: Vec<Post>,
    pub total_posts: u64,
}

#[derive(Clone)]
pub struct BlogService {
    source: Arc<dyn ContentSource>,
    cache: QueryCache,
    limits: ContentLimits,
}

impl BlogService {
    pub fn new(source: Arc<dyn ContentSource>, cache: QueryCache, limits: ContentLimits) -> Self {
        Self {
            source,
            cache,
            limits,
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn limits(&self) -> ContentLimits {
        self.limits
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn list_posts(&self, query: &ListQuery) -> Result<PostPage, AppError> {
        let filter = normalize_filter(query)?;
        let request = PageRequest::new(query.page.unwrap_or(1), self.limits.page_size);
        self.cached_listing(filter, request).await
    }

    pub async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>, AppError> {
        let slug = validate_slug(slug)?.to_string();
        let descriptor = QueryDescriptor::new(Operation::PostBySlug).param("slug", slug.as_str());
        self.cached(descriptor, TtlClass::Medium, [CacheTag::Posts], |source| async move {
            source.find_post_by_slug(&slug).await
        })
        .await
    }

    pub async fn post_by_id(&self, id: &str) -> Result<Option<Post>, AppError> {
        let id = normalize_id(id)?;
        let descriptor = QueryDescriptor::new(Operation::PostById).param("id", id.as_str());
        self.cached(descriptor, TtlClass::Medium, [CacheTag::Posts], |source| async move {
            source.find_post_by_id(&id).await
        })
        .await
    }

    pub async fn recent_posts(&self) -> Result<Vec<Post>, AppError> {
        let limit = self.limits.recent_limit;
        let descriptor = QueryDescriptor::new(Operation::RecentPosts).param("limit", limit);
        self.cached(descriptor, TtlClass::Medium, [CacheTag::Posts], move |source| async move {
            source.recent_posts(limit).await
        })
        .await
    }

    pub async fn related_posts(
        &self,
        post_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Post>, AppError> {
        let post_id = normalize_id(post_id)?;
        let limit = clamp_limit(limit.unwrap_or(self.limits.related_limit), MAX_RELATED_LIMIT);
        let descriptor = QueryDescriptor::new(Operation::RelatedPosts)
            .param("post_id", post_id.as_str())
            .param("limit", limit);
        self.cached(descriptor, TtlClass::Medium, [CacheTag::Posts], move |source| async move {
            source.related_posts(&post_id, limit).await
        })
        .await
    }

    /// Ranked full-text search. A blank query yields nothing.
    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<Post>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            debug!("blank search query, skipping lookup");
            return Ok(Vec::new());
        }
        let query = query.to_string();
        let limit = clamp_limit(limit.unwrap_or(MAX_SEARCH_LIMIT), MAX_SEARCH_LIMIT);
        let descriptor = QueryDescriptor::new(Operation::SearchPosts)
            .param("q", query.as_str())
            .param("limit", limit);
        self.cached(descriptor, TtlClass::Short, [CacheTag::Posts], move |source| async move {
            source.search_posts(&query, limit).await
        })
        .await
    }

    pub async fn categories(&self) -> Result<Vec<Category>, AppError> {
        let descriptor = QueryDescriptor::new(Operation::Categories);
        self.cached(descriptor, TtlClass::Long, [CacheTag::Categories], |source| async move {
            source.list_categories().await
        })
        .await
    }

    pub async fn tags(&self) -> Result<Vec<Tag>, AppError> {
        let descriptor = QueryDescriptor::new(Operation::Tags);
        self.cached(descriptor, TtlClass::Long, [CacheTag::Tags], |source| async move {
            source.list_tags().await
        })
        .await
    }

    pub async fn authors(&self) -> Result<Vec<Author>, AppError> {
        let descriptor = QueryDescriptor::new(Operation::Authors);
        self.cached(descriptor, TtlClass::Long, [CacheTag::Authors], |source| async move {
            source.list_authors().await
        })
        .await
    }

    pub async fn comments(&self, post_id: &str) -> Result<Vec<Comment>, AppError> {
        let post_id = normalize_id(post_id)?;
        let descriptor =
            QueryDescriptor::new(Operation::Comments).param("post_id", post_id.as_str());
        let tags = [CacheTag::Comments, CacheTag::post_comments(post_id.as_str())];
        self.cached(descriptor, TtlClass::Short, tags, |source| async move {
            source.list_comments(&post_id).await
        })
        .await
    }

    /// Validate and submit a comment, then drop the post's cached thread.
    #[instrument(level = "debug", skip_all, fields(post_id = %comment.post_id))]
    pub async fn add_comment(&self, comment: NewComment) -> Result<Comment, AppError> {
        let comment = comment.validate()?;
        let post_id = comment.post_id.clone();
        let created = self.source.add_comment(comment).await?;
        self.cache.invalidate(&[CacheTag::post_comments(post_id)]);
        Ok(created)
    }

    /// Drop every cached entry carrying any of `tags`.
    pub fn revalidate(&self, tags: &[CacheTag]) -> usize {
        self.cache.invalidate(tags)
    }

    pub async fn sidebar(&self) -> Result<Sidebar, AppError> {
        let (categories, tags, recent_posts) =
            futures::try_join!(self.categories(), self.tags(), self.recent_posts())?;
        Ok(Sidebar {
            categories,
            tags,
            recent_posts,
        })
    }

    pub async fn blog_page(&self, query: &ListQuery) -> Result<BlogPage, AppError> {
        let (page, sidebar) = futures::try_join!(self.list_posts(query), self.sidebar())?;
        Ok(BlogPage {
            posts: page.posts,
            pagination: page.pagination,
            sidebar,
        })
    }

    /// Everything a post detail view needs, or `None` for an unknown slug.
    pub async fn post_page(&self, slug: &str) -> Result<Option<PostView>, AppError> {
        let Some(post) = self.post_by_slug(slug).await? else {
            return Ok(None);
        };
        let (related, comments, sidebar) = futures::try_join!(
            self.related_posts(&post.id, None),
            self.comments(&post.id),
            self.sidebar()
        )?;
        Ok(Some(PostView {
            post,
            related,
            comments,
            sidebar,
        }))
    }

    /// The newest `per_category` posts of every category, fetched as one batch.
    pub async fn category_highlights(
        &self,
        per_category: u32,
    ) -> Result<Vec<CategoryHighlight>, AppError> {
        let categories = self.categories().await?;
        let request = PageRequest::first(per_category);
        let queries = categories
            .iter()
            .map(|category| {
                let filter = PostFilter {
                    category: Some(category.slug.clone()),
                    ..PostFilter::default()
                };
                self.listing_query(filter, request)
            })
            .collect();
        let pages = self.cache.batch_fetch(queries).await?;

        Ok(categories
            .into_iter()
            .zip(pages)
            .map(|(category, page)| CategoryHighlight {
                category,
                total_posts: page.pagination.total_items,
                posts: page.posts,
            })
            .collect())
    }

    async fn cached_listing(
        &self,
        filter: PostFilter,
        request: PageRequest,
    ) -> Result<PostPage, AppError> {
        let descriptor = listing_descriptor(&filter, request);
        let options = listing_options(&self.cache, &filter);
        let source = Arc::clone(&self.source);
        let page = self
            .cache
            .get_or_compute(descriptor, options, move || async move {
                source.list_posts(&filter, request).await
            })
            .await?;
        Ok(page)
    }

    fn listing_query(&self, filter: PostFilter, request: PageRequest) -> BatchQuery<PostPage> {
        let descriptor = listing_descriptor(&filter, request);
        let options = listing_options(&self.cache, &filter);
        let source = Arc::clone(&self.source);
        BatchQuery::new(descriptor, options, move || async move {
            source.list_posts(&filter, request).await
        })
    }

    async fn cached<T, F, Fut>(
        &self,
        descriptor: QueryDescriptor,
        class: TtlClass,
        tags: impl IntoIterator<Item = CacheTag>,
        compute: F,
    ) -> Result<T, AppError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(Arc<dyn ContentSource>) -> Fut + Send,
        Fut: Future<Output = Result<T, SourceError>> + Send + 'static,
    {
        let options = CacheOptions::new(self.cache.config().ttl(class)).tags(tags);
        let source = Arc::clone(&self.source);
        let value = self
            .cache
            .get_or_compute(descriptor, options, move || compute(source))
            .await?;
        Ok(value)
    }
}

fn listing_descriptor(filter: &PostFilter, request: PageRequest) -> QueryDescriptor {
    QueryDescriptor::new(Operation::ListPosts)
        .param_opt("category", filter.category.as_deref())
        .param_opt("tag", filter.tag.as_deref())
        .param_opt("q", filter.query.as_deref())
        .param("page", request.page())
        .param("per_page", request.per_page())
}

fn listing_options(cache: &QueryCache, filter: &PostFilter) -> CacheOptions {
    let mut options =
        CacheOptions::new(cache.config().ttl(TtlClass::Short)).tag(CacheTag::Posts);
    if filter.category.is_some() {
        options = options.tag(CacheTag::Categories);
    }
    if filter.tag.is_some() {
        options = options.tag(CacheTag::Tags);
    }
    options
}

fn normalize_filter(query: &ListQuery) -> Result<PostFilter, AppError> {
    let slug_param = |value: &Option<String>| -> Result<Option<String>, AppError> {
        match value.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(slug) => Ok(Some(validate_slug(slug)?.to_string())),
        }
    };
    let text = query
        .query
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);

    Ok(PostFilter {
        category: slug_param(&query.category)?,
        tag: slug_param(&query.tag)?,
        query: text,
    })
}

fn normalize_id(id: &str) -> Result<String, AppError> {
    let id = id.trim();
    if id.is_empty() || id.chars().any(char::is_whitespace) {
        return Err(AppError::invalid_query(format!("`{id}` is not a valid id")));
    }
    Ok(id.to_string())
}
