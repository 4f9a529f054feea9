use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, patch, post, put},
};

/// Authenticated Router Module
///
/// Every mutation of posts and comments. The router layer above this module
/// rejects unauthenticated requests up front; the handlers additionally
/// extract the `Actor` themselves, and the ownership checks happen inside the
/// store operations.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /posts
        // Submits a new post with declared media metadata. The media bytes
        // travel through the external blob store.
        .route("/posts", post(handlers::create_post))
        // PATCH/DELETE /posts/{post_id}
        // Partial metadata update, or removal with comment cascade. Both are
        // owner-only, enforced inside the store.
        .route(
            "/posts/{post_id}",
            patch(handlers::update_post_metadata).delete(handlers::delete_post),
        )
        // PUT /posts/{post_id}/media
        // Replaces the media asset; a brand-new media pointer is minted.
        .route("/posts/{post_id}/media", put(handlers::replace_post_media))
        // POST /posts/{post_id}/comments
        // Adds a comment; keeps the parent's comment_count consistent.
        .route("/posts/{post_id}/comments", post(handlers::add_comment))
        // DELETE /posts/{post_id}/comments/{comment_id}
        // Removes a comment. Allowed for the author or the post owner.
        .route(
            "/posts/{post_id}/comments/{comment_id}",
            delete(handlers::delete_comment),
        )
}
