use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use pikshare::{
    AppConfig, AppState, create_router,
    repository::{InMemoryRepository, RepositoryState},
    seed,
    storage::{MediaPointerBuilder, MockStorageService, StorageState},
};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

// --- Test Harness ---

/// Builds the full router over the seeded in-memory store and the mock blob
/// storage. `AppConfig::default()` runs in Env::Local, so tests authenticate
/// with the `x-user-id` dev bypass header.
fn seeded_app() -> Router {
    let pointers = MediaPointerBuilder::new("https://cdn.example.com");
    let (posts, comments) = seed::demo_fixture(&pointers);
    let repo =
        Arc::new(InMemoryRepository::with_data(pointers, posts, comments)) as RepositoryState;
    let storage = Arc::new(MockStorageService::new()) as StorageState;

    create_router(AppState {
        repo,
        storage,
        config: AppConfig::default(),
    })
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_as(uri: &str, user_id: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-user-id", user_id)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, user_id: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-id", user_id)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn item_ids(body: &Value) -> Vec<String> {
    body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect()
}

// --- Health ---

#[tokio::test]
async fn test_health() {
    let response = seeded_app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

// --- Listing visibility ---

#[tokio::test]
async fn test_anonymous_listing_shows_public_only() {
    let response = seeded_app().oneshot(get("/posts")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-total-count").unwrap(),
        &"1".parse::<axum::http::HeaderValue>().unwrap()
    );
    assert!(response.headers().contains_key("x-ratelimit-limit"));

    let body = body_json(response).await;
    assert_eq!(item_ids(&body), vec!["post-1001"]);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_authenticated_listing_includes_unlisted() {
    let response = seeded_app()
        .oneshot(get_as("/posts", "dave"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(item_ids(&body), vec!["post-1001", "post-1002"]);
}

#[tokio::test]
async fn test_private_visibility_filter_is_silently_dropped_for_anonymous() {
    // Instead of an empty (and therefore leaky) result, the filter is dropped
    // and the caller sees the posts they are entitled to.
    let response = seeded_app()
        .oneshot(get("/posts?visibility=private"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(item_ids(&body), vec!["post-1001"]);
}

#[tokio::test]
async fn test_owner_me_requires_authentication() {
    let response = seeded_app().oneshot(get("/posts?owner=me")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_owner_me_includes_private_posts() {
    let response = seeded_app()
        .oneshot(get_as("/posts?owner=me", "carol"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(item_ids(&body), vec!["post-1003"]);
}

#[tokio::test]
async fn test_owner_filter_for_someone_else_hides_their_private_posts() {
    let response = seeded_app()
        .oneshot(get_as("/posts?owner=carol", "dave"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert!(item_ids(&body).is_empty());
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_query_filter_searches_visible_posts_only() {
    // "market" only matches the unlisted post, invisible to anonymous callers.
    let anonymous = seeded_app().oneshot(get("/posts?q=market")).await.unwrap();
    assert!(item_ids(&body_json(anonymous).await).is_empty());

    let authed = seeded_app()
        .oneshot(get_as("/posts?q=market", "dave"))
        .await
        .unwrap();
    assert_eq!(item_ids(&body_json(authed).await), vec!["post-1002"]);
}

#[tokio::test]
async fn test_unsupported_sort_is_rejected() {
    let response = seeded_app()
        .oneshot(get("/posts?sort=alphabetical"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_unknown_visibility_value_is_rejected() {
    let response = seeded_app()
        .oneshot(get("/posts?visibility=secret"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// --- Post detail ---

#[tokio::test]
async fn test_private_post_detail_is_owner_only() {
    let app = seeded_app();

    let anonymous = app.clone().oneshot(get("/posts/post-1003")).await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::NOT_FOUND);
    let body = body_json(anonymous).await;
    assert_eq!(body["error"], "not_found");

    let stranger = app
        .clone()
        .oneshot(get_as("/posts/post-1003", "dave"))
        .await
        .unwrap();
    assert_eq!(stranger.status(), StatusCode::NOT_FOUND);

    let owner = app
        .oneshot(get_as("/posts/post-1003", "carol"))
        .await
        .unwrap();
    assert_eq!(owner.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_post_detail_embeds_latest_comments_preview() {
    let response = seeded_app().oneshot(get("/posts/post-1001")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    assert_eq!(body["id"], "post-1001");
    assert_eq!(body["comment_count"], 2);
    let preview = body["latest_comments"].as_array().unwrap();
    // Newest first.
    assert_eq!(preview[0]["id"], "comment-5002");
    assert_eq!(preview[1]["id"], "comment-5001");
}

// --- Post mutations ---

#[tokio::test]
async fn test_create_post_requires_authentication() {
    let request = Request::builder()
        .method("POST")
        .uri("/posts")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = seeded_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_post_applies_boundary_defaults() {
    let response = seeded_app()
        .oneshot(json_request("POST", "/posts", "dave", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;

    // Seed ids run through post-1003, so the next allocation is post-1004.
    assert_eq!(body["id"], "post-1004");
    assert_eq!(body["title"], "Untitled post");
    assert_eq!(body["visibility"], "public");
    assert_eq!(body["original_file_name"], "upload.bin");
    assert_eq!(body["owner_id"], "dave");
    assert_eq!(body["comment_count"], 0);
    assert!(body["latest_comments"].as_array().unwrap().is_empty());
    assert!(body["file_url"].as_str().unwrap().contains("/files/"));
}

#[tokio::test]
async fn test_create_post_sanitizes_tags() {
    let response = seeded_app()
        .oneshot(json_request(
            "POST",
            "/posts",
            "dave",
            serde_json::json!({ "tags": ["Deep Sea ", "DEEP-sea"] }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["tags"], serde_json::json!(["deep-sea"]));
}

#[tokio::test]
async fn test_create_post_rejects_unknown_visibility() {
    let response = seeded_app()
        .oneshot(json_request(
            "POST",
            "/posts",
            "dave",
            serde_json::json!({ "visibility": "secret" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_patch_distinguishes_forbidden_from_not_found() {
    let app = seeded_app();

    let not_owner = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/posts/post-1001",
            "bob",
            serde_json::json!({ "title": "Hijacked" }),
        ))
        .await
        .unwrap();
    assert_eq!(not_owner.status(), StatusCode::FORBIDDEN);
    let body = body_json(not_owner).await;
    assert_eq!(body["error"], "forbidden");

    let missing = app
        .oneshot(json_request(
            "PATCH",
            "/posts/post-9999",
            "bob",
            serde_json::json!({ "title": "Ghost" }),
        ))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_replace_media_mints_new_pointer() {
    let app = seeded_app();

    let before = body_json(app.clone().oneshot(get("/posts/post-1001")).await.unwrap()).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/posts/post-1001/media",
            "alice",
            serde_json::json!({ "original_file_name": "recut.mp4", "file_size_bytes": 31000000 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let after = body_json(response).await;

    assert_ne!(after["file_id"], before["file_id"]);
    assert_eq!(after["original_file_name"], "recut.mp4");
    assert_eq!(after["file_size_bytes"], 31000000);
}

#[tokio::test]
async fn test_delete_post_cascades_to_comments() {
    let app = seeded_app();

    let denied = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/posts/post-1001")
                .header("x-user-id", "bob")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let deleted = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/posts/post-1001")
                .header("x-user-id", "alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    // The comment listing now reports the post as gone.
    let comments = app.oneshot(get("/posts/post-1001/comments")).await.unwrap();
    assert_eq!(comments.status(), StatusCode::NOT_FOUND);
}

// --- Comments ---

#[tokio::test]
async fn test_comment_listing_is_paginated_with_total_header() {
    let response = seeded_app()
        .oneshot(get("/posts/post-1001/comments?page=1&per_page=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-total-count").unwrap(),
        &"2".parse::<axum::http::HeaderValue>().unwrap()
    );
    let body = body_json(response).await;
    // Oldest first.
    assert_eq!(item_ids(&body), vec!["comment-5001"]);
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn test_blank_comment_text_is_rejected_before_the_store() {
    let response = seeded_app()
        .oneshot(json_request(
            "POST",
            "/posts/post-1001/comments",
            "dave",
            serde_json::json!({ "text": "   " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_comment_lifecycle_keeps_count_consistent() {
    let app = seeded_app();

    let created = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/posts/post-1001/comments",
            "dave",
            serde_json::json!({ "text": "Great colors." }),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let comment = body_json(created).await;
    assert_eq!(comment["id"], "comment-5003");
    assert_eq!(comment["author_id"], "dave");

    let detail = body_json(app.clone().oneshot(get("/posts/post-1001")).await.unwrap()).await;
    assert_eq!(detail["comment_count"], 3);

    // A stranger (neither author nor post owner) may not delete it.
    let stranger = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/posts/post-1001/comments/comment-5003")
                .header("x-user-id", "eve")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(stranger.status(), StatusCode::FORBIDDEN);

    // The author may.
    let author = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/posts/post-1001/comments/comment-5003")
                .header("x-user-id", "dave")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(author.status(), StatusCode::NO_CONTENT);

    let detail = body_json(app.oneshot(get("/posts/post-1001")).await.unwrap()).await;
    assert_eq!(detail["comment_count"], 2);
}

#[tokio::test]
async fn test_delete_comment_not_found_cases() {
    let app = seeded_app();

    let missing_post = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/posts/post-9999/comments/comment-5001")
                .header("x-user-id", "alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing_post.status(), StatusCode::NOT_FOUND);
    let body = body_json(missing_post).await;
    assert_eq!(body["message"], "Post not found");

    let missing_comment = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/posts/post-1001/comments/comment-9999")
                .header("x-user-id", "alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing_comment.status(), StatusCode::NOT_FOUND);
    let body = body_json(missing_comment).await;
    assert_eq!(body["message"], "Comment not found");
}

// --- File redirect ---

#[tokio::test]
async fn test_file_redirect_points_at_presigned_url() {
    let response = seeded_app()
        .oneshot(get("/files/abc-123?disposition=attachment"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.contains("abc-123"));
    assert!(location.contains("disposition=attachment"));
}

#[tokio::test]
async fn test_file_redirect_failure_maps_to_internal_error() {
    let pointers = MediaPointerBuilder::new("https://cdn.example.com");
    let (posts, comments) = seed::demo_fixture(&pointers);
    let repo =
        Arc::new(InMemoryRepository::with_data(pointers, posts, comments)) as RepositoryState;
    let storage = Arc::new(MockStorageService::new_failing()) as StorageState;
    let app = create_router(AppState {
        repo,
        storage,
        config: AppConfig::default(),
    });

    let response = app.oneshot(get("/files/abc-123")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "internal_error");
    // The raw cause is never echoed to the client.
    assert!(!body["message"].as_str().unwrap().contains("Mock Storage"));
}
