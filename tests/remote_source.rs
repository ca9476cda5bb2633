use std::time::Duration;

use httpmock::MockServer;
use inkpost::application::pagination::PageRequest;
use inkpost::application::repos::{ContentSource, PostFilter, SourceError};
use inkpost::config::RemoteSettings;
use inkpost::domain::entities::NewComment;
use inkpost::domain::types::CommentStatus;
use inkpost::infra::remote::RemoteSource;
use serde_json::{Value, json};
use url::Url;

fn source(server: &MockServer, token: Option<&str>) -> RemoteSource {
    let base_url = Url::parse(&server.url("/api/")).expect("mock server url");
    RemoteSource::new(&RemoteSettings {
        base_url,
        api_token: token.map(str::to_string),
        timeout: Duration::from_secs(5),
    })
    .expect("remote source builds")
}

fn wire_post(id: i64, slug: &str, title: &str, category: &str) -> Value {
    json!({
        "id": id,
        "slug": slug,
        "title": title,
        "excerpt": "",
        "author": { "id": 1, "name": "Taro Tanaka" },
        "category": { "id": 1, "name": category, "slug": category.to_lowercase() },
        "tags": [{ "id": 3, "name": "Rust", "slug": "rust" }],
        "status": "published",
        "published_at": "2024-01-15T00:00:00Z"
    })
}

fn page(count: u64, results: Vec<Value>) -> Value {
    json!({ "count": count, "next": null, "previous": null, "results": results })
}

#[tokio::test]
async fn listing_maps_envelope_and_skips_drafts() {
    let server = MockServer::start_async().await;
    let mut draft = wire_post(3, "draft", "Draft", "Tech");
    draft["status"] = json!("draft");
    let mock = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/api/blog/posts/")
                .query_param("page", "1")
                .query_param("page_size", "2")
                .query_param("category", "tech");
            then.status(200).json_body(page(
                5,
                vec![wire_post(1, "first", "First", "Tech"), draft],
            ));
        })
        .await;

    let filter = PostFilter {
        category: Some("tech".to_string()),
        ..PostFilter::default()
    };
    let listing = source(&server, None)
        .list_posts(&filter, PageRequest::new(1, 2))
        .await
        .expect("listing");

    mock.assert_async().await;
    assert_eq!(listing.posts.len(), 1);
    assert_eq!(listing.posts[0].id, "1");
    assert_eq!(listing.pagination.total_items, 5);
    assert_eq!(listing.pagination.total_pages, 3);
    assert!(listing.pagination.has_next_page);
}

#[tokio::test]
async fn out_of_range_page_falls_back_to_last_page() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/blog/posts/").query_param("page", "9");
            then.status(404).json_body(json!({ "detail": "Invalid page." }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/blog/posts/").query_param("page", "1");
            then.status(200)
                .json_body(page(3, vec![wire_post(1, "a", "A", "Tech"), wire_post(2, "b", "B", "Tech")]));
        })
        .await;
    let last = server
        .mock_async(|when, then| {
            when.method("GET").path("/api/blog/posts/").query_param("page", "2");
            then.status(200)
                .json_body(page(3, vec![wire_post(3, "c", "C", "Tech")]));
        })
        .await;

    let listing = source(&server, None)
        .list_posts(&PostFilter::default(), PageRequest::new(9, 2))
        .await
        .expect("listing");

    last.assert_async().await;
    assert_eq!(listing.pagination.current_page, 2);
    assert_eq!(listing.posts[0].id, "3");
    assert!(!listing.pagination.has_next_page);
}

#[tokio::test]
async fn missing_post_is_none() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/blog/posts/42/");
            then.status(404).json_body(json!({ "detail": "Not found." }));
        })
        .await;

    let post = source(&server, None)
        .find_post_by_id("42")
        .await
        .expect("lookup");
    assert!(post.is_none());
}

#[tokio::test]
async fn numeric_ids_become_strings() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/blog/posts/7/");
            then.status(200)
                .json_body(wire_post(7, "ownership", "Ownership", "Tech"));
        })
        .await;

    let post = source(&server, None)
        .find_post_by_id("7")
        .await
        .expect("lookup")
        .expect("post exists");
    assert_eq!(post.id, "7");
    assert_eq!(post.author.id, "1");
    assert_eq!(post.tags[0].id, "3");
}

#[tokio::test]
async fn search_reorders_by_local_relevance() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/api/blog/posts/")
                .query_param("search", "borrow")
                .query_param("page_size", "10");
            then.status(200).json_body(page(
                2,
                vec![
                    wire_post(1, "lifetimes", "Lifetimes explained", "Tech"),
                    wire_post(2, "borrow-checker", "The borrow checker", "Tech"),
                ],
            ));
        })
        .await;

    let results = source(&server, None)
        .search_posts("borrow", 10)
        .await
        .expect("search");
    let ids: Vec<&str> = results.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["2", "1"]);
}

#[tokio::test]
async fn related_falls_back_to_same_category() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/blog/posts/1/related/");
            then.status(500).body("boom");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/blog/posts/1/");
            then.status(200).json_body(wire_post(1, "a", "A", "Tech"));
        })
        .await;
    let fallback = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/api/blog/posts/")
                .query_param("category", "tech")
                .query_param("page_size", "3");
            then.status(200).json_body(page(
                3,
                vec![
                    wire_post(1, "a", "A", "Tech"),
                    wire_post(2, "b", "B", "Tech"),
                    wire_post(3, "c", "C", "Tech"),
                ],
            ));
        })
        .await;

    let related = source(&server, None)
        .related_posts("1", 2)
        .await
        .expect("related");

    fallback.assert_async().await;
    let ids: Vec<&str> = related.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["2", "3"]);
}

#[tokio::test]
async fn server_errors_are_rejections() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/blog/categories/");
            then.status(503).body("maintenance");
        })
        .await;

    let err = source(&server, None).list_categories().await.unwrap_err();
    assert!(matches!(err, SourceError::Rejected { status: 503, .. }));
}

#[tokio::test]
async fn malformed_bodies_are_decode_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/blog/tags/");
            then.status(200)
                .header("content-type", "application/json")
                .body("{\"count\": \"many\"");
        })
        .await;

    let err = source(&server, None).list_tags().await.unwrap_err();
    assert!(matches!(err, SourceError::Decode { .. }));
}

#[tokio::test]
async fn bare_lists_are_accepted() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/blog/tags/");
            then.status(200).json_body(json!([
                { "id": 1, "name": "Rust", "slug": "rust" },
                { "id": "2", "name": "Go", "slug": "go" }
            ]));
        })
        .await;

    let tags = source(&server, None).list_tags().await.expect("tags");
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[1].id, "2");
}

#[tokio::test]
async fn envelope_without_results_is_empty() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/blog/categories/");
            then.status(200).json_body(json!({ "count": 0 }));
        })
        .await;

    let categories = source(&server, None)
        .list_categories()
        .await
        .expect("categories");
    assert!(categories.is_empty());
}

#[tokio::test]
async fn query_values_are_percent_encoded() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/api/blog/posts/")
                .query_param("search", "c++ & rust")
                .query_param("page_size", "5");
            then.status(200).json_body(page(
                1,
                vec![wire_post(4, "cpp-and-rust", "C++ & Rust interop", "Tech")],
            ));
        })
        .await;

    let results = source(&server, None)
        .search_posts("c++ & rust", 5)
        .await
        .expect("search");

    mock.assert_async().await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].slug, "cpp-and-rust");
}

#[tokio::test]
async fn comments_keep_approved_oldest_first() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/api/blog/comments/")
                .query_param("post", "1")
                .query_param("status", "approved");
            then.status(200).json_body(page(
                3,
                vec![
                    json!({ "id": 2, "post": 1, "author": "B", "content": "later",
                            "status": "approved", "created_at": "2024-01-03T00:00:00Z" }),
                    json!({ "id": 1, "post": 1, "author": "A", "content": "first",
                            "status": "approved", "created_at": "2024-01-02T00:00:00Z" }),
                    json!({ "id": 3, "post": 1, "author": "C", "content": "spam",
                            "status": "rejected", "created_at": "2024-01-01T00:00:00Z" }),
                ],
            ));
        })
        .await;

    let comments = source(&server, None)
        .list_comments("1")
        .await
        .expect("comments");
    let ids: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["1", "2"]);
}

#[tokio::test]
async fn new_comments_are_posted_with_bearer_token() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/api/blog/comments/")
                .header("authorization", "Bearer s3cret")
                .json_body(json!({
                    "post": "1",
                    "author": "Reader",
                    "email": "reader@example.com",
                    "content": "Nice"
                }));
            then.status(201).json_body(json!({
                "id": 10, "post": 1, "author": "Reader", "email": "reader@example.com",
                "content": "Nice", "status": "pending", "created_at": "2024-02-01T00:00:00Z"
            }));
        })
        .await;

    let created = source(&server, Some("s3cret"))
        .add_comment(NewComment {
            post_id: "1".to_string(),
            author: "Reader".to_string(),
            email: "reader@example.com".to_string(),
            content: "Nice".to_string(),
        })
        .await
        .expect("comment created");

    mock.assert_async().await;
    assert_eq!(created.id, "10");
    assert_eq!(created.post_id, "1");
    assert_eq!(created.status, CommentStatus::Pending);
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let settings = RemoteSettings {
        base_url: Url::parse("http://127.0.0.1:9/api/").expect("url"),
        api_token: None,
        timeout: Duration::from_secs(2),
    };
    let err = RemoteSource::new(&settings)
        .expect("remote source builds")
        .list_authors()
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Transport { .. }));
}
