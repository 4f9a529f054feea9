use crate::auth::Actor;
use crate::listing::PostFilter;
use crate::models::{Comment, MetadataPatch, NewPost, PagedResult, Post, PostSummary, Visibility};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// How many comments a full post read embeds as its preview.
pub const LATEST_COMMENTS_LIMIT: usize = 3;

pub(crate) const POST_ID_PREFIX: &str = "post-";
pub(crate) const COMMENT_ID_PREFIX: &str = "comment-";
// Sequence floors: the first allocation on an empty store yields
// post-1001 / comment-5001.
pub(crate) const POST_SEQUENCE_FLOOR: u64 = 1000;
pub(crate) const COMMENT_SEQUENCE_FLOOR: u64 = 5000;

/// Sequence
///
/// A process-wide monotonic id allocator, safe under concurrent increment.
/// Seeded at startup from the highest numeric suffix among existing ids.
pub struct Sequence {
    counter: AtomicU64,
}

impl Sequence {
    pub fn starting_at(value: u64) -> Self {
        Self {
            counter: AtomicU64::new(value),
        }
    }

    /// Seeds from existing ids: ids not matching `<prefix><digits>` count as 0.
    pub fn seeded<'a>(floor: u64, prefix: &str, ids: impl Iterator<Item = &'a str>) -> Self {
        let highest = ids
            .map(|id| numeric_suffix(id, prefix))
            .max()
            .unwrap_or(0)
            .max(floor);
        Self::starting_at(highest)
    }

    pub fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

fn numeric_suffix(id: &str, prefix: &str) -> u64 {
    id.strip_prefix(prefix)
        .and_then(|suffix| suffix.parse().ok())
        .unwrap_or(0)
}

/// The single access rule for individual post reads: everything but private
/// is world-readable; private is owner-only.
pub(crate) fn can_access(post: &Post, actor: Option<&Actor>) -> bool {
    if post.visibility != Visibility::Private {
        return true;
    }
    actor.is_some_and(|actor| actor.user_id == post.owner_id)
}

/// MutationOutcome
///
/// Three-way result of an ownership-gated post mutation. Computed atomically
/// inside the store, so callers can map not-found vs forbidden without a
/// second existence probe racing against concurrent deletes.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome<T> {
    Ok(T),
    NotFound,
    Forbidden,
}

/// DeleteCommentOutcome
///
/// Four-way result of a comment deletion, checked in order: post existence,
/// comment existence scoped to the post, authorization, deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteCommentOutcome {
    Success,
    PostNotFound,
    CommentNotFound,
    Forbidden,
}

/// Repository Trait
///
/// The abstract contract for the post and comment stores, kept as a single
/// trait because every comment mutation must update the parent post's
/// denormalized `comment_count` within one transactional boundary.
///
/// Gated operations never raise for ordinary not-found/forbidden outcomes;
/// they return explicit optionals or outcome enums for the presentation layer
/// to map.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Listing / retrieval ---

    /// Applies the resolved filter set and returns one deterministic page,
    /// ordered by `created_at` descending (ties keep insertion order).
    async fn list_posts(&self, filter: PostFilter) -> PagedResult<PostSummary>;

    /// Returns the post, or `None` when it is missing — or when it is private
    /// and the actor is absent or not the owner (existence never leaks).
    async fn find_post(&self, post_id: &str, actor: Option<&Actor>) -> Option<Post>;

    /// The most recently created comments of a post, newest first.
    async fn latest_comments(&self, post_id: &str, limit: usize) -> Vec<Comment>;

    /// Existence probe independent of visibility and ownership.
    async fn post_exists(&self, post_id: &str) -> bool;

    // --- Post mutations ---

    /// Allocates the next sequence id and a fresh media pointer, sanitizes
    /// tags and stamps both timestamps. Always succeeds for a resolved actor.
    async fn create_post(&self, actor: &Actor, new_post: NewPost) -> Post;

    /// Applies a partial metadata patch; owner-only.
    async fn update_metadata(
        &self,
        post_id: &str,
        actor: &Actor,
        patch: MetadataPatch,
    ) -> MutationOutcome<Post>;

    /// Swaps the media pointer triple for a freshly allocated one; owner-only.
    async fn replace_media(
        &self,
        post_id: &str,
        actor: &Actor,
        original_file_name: String,
        file_size_bytes: i64,
    ) -> MutationOutcome<Post>;

    /// Deletes the post and cascades to all of its comments; owner-only.
    async fn delete_post(&self, post_id: &str, actor: &Actor) -> MutationOutcome<()>;

    // --- Comments ---

    /// `None` when the post does not exist; otherwise the comments of the
    /// post ordered by `created_at` ascending, paginated with the same clamp
    /// rules as post listing.
    async fn list_comments(
        &self,
        post_id: &str,
        page: i64,
        per_page: i64,
    ) -> Option<PagedResult<Comment>>;

    /// `None` when the post does not exist. Text validity is the caller's
    /// responsibility. Recounts the parent's `comment_count` and bumps its
    /// `updated_at` in the same transactional step.
    async fn add_comment(&self, post_id: &str, actor: &Actor, text: String) -> Option<Comment>;

    /// Deletable by the comment's author or the parent post's owner.
    async fn delete_comment(
        &self,
        post_id: &str,
        comment_id: &str,
        actor: &Actor,
    ) -> DeleteCommentOutcome;
}

/// RepositoryState
///
/// The shared handle to the persistence layer used across the application state.
pub type RepositoryState = Arc<dyn Repository>;
