use crate::{
    AppState,
    auth::{Actor, OptionalActor},
    error::ApiError,
    listing::PostFilter,
    models::{
        Comment, CreateCommentRequest, CreatePostRequest, MetadataPatch, NewPost, PagedResult,
        PostResponse, PostSummary, ReplaceMediaRequest, UpdatePostMetadataRequest, Visibility,
        has_text,
    },
    repository::{DeleteCommentOutcome, LATEST_COMMENTS_LIMIT, MutationOutcome},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderName, StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;

// Boundary defaults for creation payloads.
const DEFAULT_TITLE: &str = "Untitled post";
const DEFAULT_FILE_NAME: &str = "upload.bin";

// Accepted values for the `sort` query parameter. Listing always orders by
// created_at descending; the other values are accepted for API compatibility.
const SUPPORTED_SORTS: [&str; 4] = ["created_desc", "created_asc", "popular", "trending"];

// --- Query Parameter Structs ---

/// ListPostsParams
///
/// Accepted query parameters for the feed listing endpoint (GET /posts).
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ListPostsParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// One of created_desc, created_asc, popular, trending.
    pub sort: Option<String>,
    /// Case-insensitive substring match over title, description and tags.
    pub q: Option<String>,
    /// Exact owner id, or `me` for the authenticated caller's own posts.
    pub owner: Option<String>,
    /// Exact visibility filter (public, unlisted, private).
    pub visibility: Option<String>,
}

/// ListCommentsParams
///
/// Accepted query parameters for the comment listing endpoint.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ListCommentsParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// FileRedirectParams
///
/// Accepted query parameters for the media download redirect.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct FileRedirectParams {
    /// Content disposition forwarded to the blob store (default `inline`).
    pub disposition: Option<String>,
}

// --- Handlers ---

/// health
///
/// [Public Route] Unauthenticated liveness probe for monitors and load
/// balancers.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// list_posts
///
/// [Public Route, optional auth] Lists posts with filtering, search and
/// pagination. What the caller can see depends on the resolved actor:
/// anonymous callers get public posts only; authenticated callers also see
/// unlisted ones; private posts only ever surface through an owner filter.
#[utoipa::path(
    get,
    path = "/posts",
    params(ListPostsParams),
    responses(
        (status = 200, description = "One page of post summaries", body = PagedResult<PostSummary>),
        (status = 400, description = "Unsupported sort or visibility value", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_posts(
    OptionalActor(actor): OptionalActor,
    State(state): State<AppState>,
    Query(params): Query<ListPostsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let sort = params.sort.unwrap_or_else(|| "created_desc".to_string());
    if !SUPPORTED_SORTS.contains(&sort.as_str()) {
        return Err(ApiError::InvalidArgument(format!(
            "Unsupported sort value: {}",
            sort
        )));
    }

    let mut owner_filter: Option<String> = None;
    let mut include_private = false;

    if let Some(owner) = params.owner.filter(|owner| has_text(owner)) {
        if owner.eq_ignore_ascii_case("me") {
            let actor = actor.as_ref().ok_or_else(|| {
                ApiError::Unauthorized("owner=me requires authentication".to_string())
            })?;
            owner_filter = Some(actor.user_id.clone());
            include_private = true;
        } else {
            include_private = actor
                .as_ref()
                .is_some_and(|actor| actor.user_id == owner);
            owner_filter = Some(owner);
        }
    }

    let mut visibility_filter = match params.visibility.filter(|value| has_text(value)) {
        Some(value) => Some(Visibility::parse(&value).ok_or_else(|| {
            ApiError::InvalidArgument(format!("Unknown visibility value: {}", value))
        })?),
        None => None,
    };

    let include_unlisted = actor.is_some() || owner_filter.is_some();

    // Silently drop a private filter the caller is not entitled to, so the
    // 0-result vs populated-result difference cannot leak that private
    // content exists.
    if visibility_filter == Some(Visibility::Private) && !include_private {
        visibility_filter = None;
    }

    let result = state
        .repo
        .list_posts(PostFilter {
            page: params.page.unwrap_or(1),
            per_page: params.per_page.unwrap_or(24),
            owner: owner_filter,
            include_private,
            include_unlisted,
            query: params.q.filter(|q| has_text(q)),
            visibility: visibility_filter,
        })
        .await;

    Ok((listing_headers(result.total), Json(result)))
}

/// get_post
///
/// [Public Route, optional auth] Retrieves the full post view, embedding the
/// latest-comments preview. A private post reads as not-found for everyone
/// but its owner.
#[utoipa::path(
    get,
    path = "/posts/{post_id}",
    params(("post_id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = PostResponse),
        (status = 404, description = "Missing or inaccessible", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_post(
    OptionalActor(actor): OptionalActor,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = state
        .repo
        .find_post(&post_id, actor.as_ref())
        .await
        .ok_or_else(|| ApiError::NotFound("Post not found or inaccessible".to_string()))?;
    Ok(Json(post_response(&state, post).await))
}

/// create_post
///
/// [Authenticated Route] Submits a new post. Boundary defaults: a blank title
/// becomes a placeholder, visibility defaults to public, the file name to a
/// generic one. The store allocates the id and the media pointer.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = PostResponse),
        (status = 400, description = "Unknown visibility value", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_post(
    actor: Actor,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let visibility = match payload.visibility.filter(|value| has_text(value)) {
        Some(value) => Visibility::parse(&value).ok_or_else(|| {
            ApiError::InvalidArgument(format!("Unknown visibility value: {}", value))
        })?,
        None => Visibility::Public,
    };

    let new_post = NewPost {
        title: payload
            .title
            .filter(|title| has_text(title))
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        description: payload.description,
        tags: payload.tags.unwrap_or_default(),
        visibility,
        original_file_name: payload
            .original_file_name
            .filter(|name| has_text(name))
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
        file_size_bytes: payload.file_size_bytes.unwrap_or(0).max(0),
    };

    let post = state.repo.create_post(&actor, new_post).await;
    let response = post_response(&state, post).await;
    Ok((StatusCode::CREATED, Json(response)))
}

/// update_post_metadata
///
/// [Authenticated Route] Partial metadata patch, owner-only. The store
/// resolves the not-found vs forbidden duality atomically.
#[utoipa::path(
    patch,
    path = "/posts/{post_id}",
    params(("post_id" = String, Path, description = "Post ID")),
    request_body = UpdatePostMetadataRequest,
    responses(
        (status = 200, description = "Updated", body = PostResponse),
        (status = 403, description = "Not the owner", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_post_metadata(
    actor: Actor,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(payload): Json<UpdatePostMetadataRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    let visibility = match payload.visibility.filter(|value| has_text(value)) {
        Some(value) => Some(Visibility::parse(&value).ok_or_else(|| {
            ApiError::InvalidArgument(format!("Unknown visibility value: {}", value))
        })?),
        None => None,
    };

    let patch = MetadataPatch {
        title: payload.title,
        description: payload.description,
        tags: payload.tags,
        visibility,
    };

    match state.repo.update_metadata(&post_id, &actor, patch).await {
        MutationOutcome::Ok(post) => Ok(Json(post_response(&state, post).await)),
        MutationOutcome::NotFound => Err(ApiError::NotFound("Post not found".to_string())),
        MutationOutcome::Forbidden => Err(ApiError::Forbidden(
            "You are not allowed to update this post".to_string(),
        )),
    }
}

/// replace_post_media
///
/// [Authenticated Route] Swaps the media asset behind a post, owner-only.
/// Always mints a brand-new media pointer.
#[utoipa::path(
    put,
    path = "/posts/{post_id}/media",
    params(("post_id" = String, Path, description = "Post ID")),
    request_body = ReplaceMediaRequest,
    responses(
        (status = 200, description = "Media replaced", body = PostResponse),
        (status = 403, description = "Not the owner", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn replace_post_media(
    actor: Actor,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(payload): Json<ReplaceMediaRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    let original_file_name = payload
        .original_file_name
        .filter(|name| has_text(name))
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
    let file_size_bytes = payload.file_size_bytes.unwrap_or(0).max(0);

    match state
        .repo
        .replace_media(&post_id, &actor, original_file_name, file_size_bytes)
        .await
    {
        MutationOutcome::Ok(post) => Ok(Json(post_response(&state, post).await)),
        MutationOutcome::NotFound => Err(ApiError::NotFound("Post not found".to_string())),
        MutationOutcome::Forbidden => Err(ApiError::Forbidden(
            "You are not allowed to replace this media".to_string(),
        )),
    }
}

/// delete_post
///
/// [Authenticated Route] Deletes a post and cascades to all of its comments,
/// owner-only.
#[utoipa::path(
    delete,
    path = "/posts/{post_id}",
    params(("post_id" = String, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the owner", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_post(
    actor: Actor,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.repo.delete_post(&post_id, &actor).await {
        MutationOutcome::Ok(()) => Ok(StatusCode::NO_CONTENT),
        MutationOutcome::NotFound => Err(ApiError::NotFound("Post not found".to_string())),
        MutationOutcome::Forbidden => Err(ApiError::Forbidden(
            "You are not allowed to delete this post".to_string(),
        )),
    }
}

/// list_comments
///
/// [Public Route] One page of a post's comments, oldest first.
#[utoipa::path(
    get,
    path = "/posts/{post_id}/comments",
    params(("post_id" = String, Path, description = "Post ID"), ListCommentsParams),
    responses(
        (status = 200, description = "One page of comments", body = PagedResult<Comment>),
        (status = 404, description = "Post not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Query(params): Query<ListCommentsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .repo
        .list_comments(
            &post_id,
            params.page.unwrap_or(1),
            params.per_page.unwrap_or(20),
        )
        .await
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    Ok((
        [(
            HeaderName::from_static("x-total-count"),
            result.total.to_string(),
        )],
        Json(result),
    ))
}

/// add_comment
///
/// [Authenticated Route] Posts a new comment. Blank text is rejected at this
/// boundary; the store is never invoked with it.
#[utoipa::path(
    post,
    path = "/posts/{post_id}/comments",
    params(("post_id" = String, Path, description = "Post ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 400, description = "Blank text", body = crate::error::ErrorResponse),
        (status = 404, description = "Post not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn add_comment(
    actor: Actor,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !has_text(&payload.text) {
        return Err(ApiError::InvalidArgument("text is required".to_string()));
    }

    let comment = state
        .repo
        .add_comment(&post_id, &actor, payload.text)
        .await
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// delete_comment
///
/// [Authenticated Route] Deletes a comment. Allowed for the comment's author
/// or the parent post's owner; outcomes map 1:1 to statuses.
#[utoipa::path(
    delete,
    path = "/posts/{post_id}/comments/{comment_id}",
    params(
        ("post_id" = String, Path, description = "Post ID"),
        ("comment_id" = String, Path, description = "Comment ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not author nor post owner", body = crate::error::ErrorResponse),
        (status = 404, description = "Post or comment not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_comment(
    actor: Actor,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    match state
        .repo
        .delete_comment(&post_id, &comment_id, &actor)
        .await
    {
        DeleteCommentOutcome::Success => Ok(StatusCode::NO_CONTENT),
        DeleteCommentOutcome::PostNotFound => {
            Err(ApiError::NotFound("Post not found".to_string()))
        }
        DeleteCommentOutcome::CommentNotFound => {
            Err(ApiError::NotFound("Comment not found".to_string()))
        }
        DeleteCommentOutcome::Forbidden => Err(ApiError::Forbidden(
            "You are not allowed to delete this comment".to_string(),
        )),
    }
}

/// redirect_to_file
///
/// [Public Route] Redirects an opaque file id to a short-lived presigned blob
/// URL. The service never serves media bytes itself.
#[utoipa::path(
    get,
    path = "/files/{file_id}",
    params(("file_id" = String, Path, description = "Opaque file ID"), FileRedirectParams),
    responses((status = 302, description = "Redirect to the presigned URL"))
)]
pub async fn redirect_to_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    Query(params): Query<FileRedirectParams>,
) -> Result<impl IntoResponse, ApiError> {
    let disposition = params
        .disposition
        .filter(|value| has_text(value))
        .unwrap_or_else(|| "inline".to_string());

    let url = state
        .storage
        .presigned_download_url(&file_id, &disposition)
        .await
        .map_err(ApiError::Internal)?;

    Ok((StatusCode::FOUND, [(header::LOCATION, url)]))
}

// --- Helpers ---

/// Assembles the full post view: the record plus its latest-comments preview.
async fn post_response(state: &AppState, post: crate::models::Post) -> PostResponse {
    let latest = state
        .repo
        .latest_comments(&post.id, LATEST_COMMENTS_LIMIT)
        .await;
    PostResponse::new(post, latest)
}

/// Listing response headers: the filtered total plus illustrative rate-limit
/// headers (enforcement lives outside this service).
fn listing_headers(total: i64) -> [(HeaderName, String); 4] {
    [
        (HeaderName::from_static("x-total-count"), total.to_string()),
        (
            HeaderName::from_static("x-ratelimit-limit"),
            "120".to_string(),
        ),
        (
            HeaderName::from_static("x-ratelimit-remaining"),
            "118".to_string(),
        ),
        (
            HeaderName::from_static("x-ratelimit-reset"),
            (Utc::now().timestamp() + 60).to_string(),
        ),
    ]
}
