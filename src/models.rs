use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Application Schemas ---

/// Visibility
///
/// Closed set of audience levels for a post. Serialized lowercase on the wire
/// (`public`, `unlisted`, `private`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
}

impl Visibility {
    /// Case-insensitive parse used at the request boundary, where an unknown
    /// value must surface as an invalid-argument failure rather than a 422.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "public" => Some(Visibility::Public),
            "unlisted" => Some(Visibility::Unlisted),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Unlisted => "unlisted",
            Visibility::Private => "private",
        }
    }
}

/// Post
///
/// The canonical post record. `id` is an opaque string allocated from the
/// post sequence and never changes; the media pointer triple
/// (`file_id`/`file_url`/`thumbnail_url`) is only ever replaced as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    // Sanitized: trimmed, whitespace collapsed to hyphens, lowercased, de-duplicated.
    pub tags: Vec<String>,
    pub visibility: Visibility,
    // Captured from the acting identity at creation; owner_id never changes.
    pub owner_id: String,
    pub owner_display_name: String,
    pub file_id: String,
    pub file_url: String,
    pub thumbnail_url: String,
    pub original_file_name: String,
    pub file_size_bytes: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    // Bumped on every mutation, including comment add/remove.
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    // Denormalized: always equals the number of comments attached to the post.
    pub comment_count: i64,
    // Write-only at seed time; no operation mutates it.
    pub like_count: i64,
}

/// Comment
///
/// A comment scoped to its parent post. Immutable once created, only deletable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_display_name: String,
    pub text: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// PagedResult
///
/// A deterministic page over a filtered collection. `total` is the filtered
/// count, not the global one.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

// --- Output Schemas ---

/// PostSummary
///
/// The listing projection of a post: everything a feed tile needs, without the
/// full media pointer or file metadata.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub visibility: Visibility,
    pub owner_id: String,
    pub owner_display_name: String,
    pub thumbnail_url: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    pub comment_count: i64,
    pub like_count: i64,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            description: post.description.clone(),
            tags: post.tags.clone(),
            visibility: post.visibility,
            owner_id: post.owner_id.clone(),
            owner_display_name: post.owner_display_name.clone(),
            thumbnail_url: post.thumbnail_url.clone(),
            created_at: post.created_at,
            updated_at: post.updated_at,
            comment_count: post.comment_count,
            like_count: post.like_count,
        }
    }
}

/// PostResponse
///
/// The full post view returned by detail reads and every post mutation. Embeds
/// a preview of the most recent comments (up to 3, newest first), independent
/// of the paginated ascending comment listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostResponse {
    #[serde(flatten)]
    #[ts(flatten)]
    pub post: Post,
    pub latest_comments: Vec<Comment>,
}

impl PostResponse {
    pub fn new(post: Post, latest_comments: Vec<Comment>) -> Self {
        Self {
            post,
            latest_comments,
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// CreatePostRequest
///
/// Input payload for submitting a new post. The media bytes themselves travel
/// through the external blob store; this carries only the declared metadata.
/// Missing fields receive boundary defaults (see the create handler).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Parsed case-insensitively; an unknown value is an invalid_request.
    pub visibility: Option<String>,
    pub original_file_name: Option<String>,
    pub file_size_bytes: Option<i64>,
}

/// UpdatePostMetadataRequest
///
/// Partial update payload. Absent fields are untouched; a present-but-empty
/// tags list replaces tags with empty; a blank title is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostMetadataRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
}

/// ReplaceMediaRequest
///
/// Input payload for swapping a post's media asset. A brand-new media pointer
/// is always allocated; the old `file_id` is never reused.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ReplaceMediaRequest {
    pub original_file_name: Option<String>,
    pub file_size_bytes: Option<i64>,
}

/// CreateCommentRequest
///
/// Input payload for posting a new comment. `text` must be non-blank.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub text: String,
}

// --- Store Inputs (internal, already validated/defaulted at the boundary) ---

/// NewPost
///
/// Fully resolved creation input handed to the store: defaults applied, tags
/// still raw (the store sanitizes them).
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub visibility: Visibility,
    pub original_file_name: String,
    pub file_size_bytes: i64,
}

/// MetadataPatch
///
/// Parsed metadata patch handed to the store. Field presence semantics match
/// `UpdatePostMetadataRequest`.
#[derive(Debug, Clone, Default)]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub visibility: Option<Visibility>,
}

// --- Shared helpers ---

/// True when the value contains at least one non-whitespace character.
pub fn has_text(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Normalizes a tag collection: drop blank entries, trim, collapse internal
/// whitespace runs to a single hyphen, lowercase, and de-duplicate while
/// preserving first-seen order. Idempotent.
pub fn sanitize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut sanitized = Vec::new();
    for tag in tags {
        if !has_text(tag) {
            continue;
        }
        let normalized = tag
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
            .to_lowercase();
        if seen.insert(normalized.clone()) {
            sanitized.push(normalized);
        }
    }
    sanitized
}
