//! JSON HTTP surface over [`BlogService`].

mod error;
mod extract;
mod handlers;
mod middleware;

pub use error::{ApiError, ApiErrorBody, ApiErrorMessage, codes};
pub use middleware::REQUEST_ID_HEADER;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::application::blog::BlogService;

use self::middleware::{log_responses, require_admin_token, set_request_context};

#[derive(Clone)]
pub struct AppState {
    pub blog: BlogService,
    /// Bearer token for `POST /api/revalidate`; the route is hidden when unset.
    pub revalidate_token: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/api/revalidate", post(handlers::revalidate))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_admin_token,
        ));

    Router::new()
        .route("/_health", get(handlers::health))
        .route("/api/posts", get(handlers::list_posts))
        .route("/api/posts/{slug}", get(handlers::post_detail))
        .route("/api/blog", get(handlers::blog_page))
        .route("/api/related/{id}", get(handlers::related_posts))
        .route("/api/search", get(handlers::search))
        .route("/api/sidebar", get(handlers::sidebar))
        .route("/api/categories", get(handlers::categories))
        .route("/api/tags", get(handlers::tags))
        .route("/api/authors", get(handlers::authors))
        .route("/api/highlights", get(handlers::highlights))
        .route(
            "/api/comments/{post_id}",
            get(handlers::list_comments).post(handlers::add_comment),
        )
        .merge(admin_routes)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
