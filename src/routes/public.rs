use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable without a credential. A bearer token may still be
/// supplied — the read handlers resolve it into an optional actor, which
/// widens what the visibility rules let through (unlisted posts, the caller's
/// own private posts via owner filters).
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitors and load balancer checks.
        .route("/health", get(handlers::health))
        // GET /posts?page=..&per_page=..&sort=..&q=..&owner=..&visibility=..
        // The feed listing: filtered, searched and paginated.
        .route("/posts", get(handlers::list_posts))
        // GET /posts/{post_id}
        // Full post view with the latest-comments preview.
        .route("/posts/{post_id}", get(handlers::get_post))
        // GET /posts/{post_id}/comments?page=..&per_page=..
        // Paginated chronological comment listing.
        .route("/posts/{post_id}/comments", get(handlers::list_comments))
        // GET /files/{file_id}?disposition=..
        // Redirects to a presigned blob URL; media bytes never flow through
        // this service.
        .route("/files/{file_id}", get(handlers::redirect_to_file))
}
