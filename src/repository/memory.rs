use super::{
    COMMENT_ID_PREFIX, COMMENT_SEQUENCE_FLOOR, DeleteCommentOutcome, MutationOutcome,
    POST_ID_PREFIX, POST_SEQUENCE_FLOOR, Repository, Sequence, can_access,
};
use crate::auth::Actor;
use crate::listing::{PostFilter, paginate};
use crate::models::{
    Comment, MetadataPatch, NewPost, PagedResult, Post, PostSummary, has_text, sanitize_tags,
};
use crate::storage::MediaPointerBuilder;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::RwLock;

// Both collections live behind one lock: every comment mutation also touches
// the parent post's comment_count and updated_at, and that pairing must be
// applied as one atomic unit.
struct StoreState {
    posts: Vec<Post>,
    comments: Vec<Comment>,
}

/// InMemoryRepository
///
/// The in-memory implementation of the store contract. Posts and comments are
/// kept in insertion order, which is what breaks `created_at` ties during the
/// stable ordering sorts.
pub struct InMemoryRepository {
    state: RwLock<StoreState>,
    post_sequence: Sequence,
    comment_sequence: Sequence,
    pointers: MediaPointerBuilder,
}

impl InMemoryRepository {
    pub fn new(pointers: MediaPointerBuilder) -> Self {
        Self::with_data(pointers, Vec::new(), Vec::new())
    }

    /// Builds a store over pre-existing records, seeding both id sequences
    /// from the highest numeric suffix found.
    pub fn with_data(
        pointers: MediaPointerBuilder,
        posts: Vec<Post>,
        comments: Vec<Comment>,
    ) -> Self {
        let post_sequence = Sequence::seeded(
            POST_SEQUENCE_FLOOR,
            POST_ID_PREFIX,
            posts.iter().map(|post| post.id.as_str()),
        );
        let comment_sequence = Sequence::seeded(
            COMMENT_SEQUENCE_FLOOR,
            COMMENT_ID_PREFIX,
            comments.iter().map(|comment| comment.id.as_str()),
        );
        Self {
            state: RwLock::new(StoreState { posts, comments }),
            post_sequence,
            comment_sequence,
            pointers,
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_posts(&self, filter: PostFilter) -> PagedResult<PostSummary> {
        let state = self.state.read().unwrap();

        let mut ordered: Vec<&Post> = state.posts.iter().collect();
        // Stable sort: equal timestamps keep insertion order.
        ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let filtered: Vec<PostSummary> = ordered
            .into_iter()
            .filter(|post| filter.matches(post))
            .map(PostSummary::from)
            .collect();

        paginate(&filtered, filter.page, filter.per_page)
    }

    async fn find_post(&self, post_id: &str, actor: Option<&Actor>) -> Option<Post> {
        let state = self.state.read().unwrap();
        state
            .posts
            .iter()
            .find(|post| post.id == post_id)
            .filter(|post| can_access(post, actor))
            .cloned()
    }

    async fn latest_comments(&self, post_id: &str, limit: usize) -> Vec<Comment> {
        let state = self.state.read().unwrap();
        let mut latest: Vec<&Comment> = state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .collect();
        latest.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        latest.into_iter().take(limit).cloned().collect()
    }

    async fn post_exists(&self, post_id: &str) -> bool {
        let state = self.state.read().unwrap();
        state.posts.iter().any(|post| post.id == post_id)
    }

    async fn create_post(&self, actor: &Actor, new_post: NewPost) -> Post {
        let id = format!("{}{}", POST_ID_PREFIX, self.post_sequence.next());
        let now = Utc::now();
        let pointer = self.pointers.allocate();

        let post = Post {
            id,
            title: new_post.title,
            description: new_post.description,
            tags: sanitize_tags(&new_post.tags),
            visibility: new_post.visibility,
            owner_id: actor.user_id.clone(),
            owner_display_name: actor.display_name.clone(),
            file_id: pointer.file_id,
            file_url: pointer.file_url,
            thumbnail_url: pointer.thumbnail_url,
            original_file_name: new_post.original_file_name,
            file_size_bytes: new_post.file_size_bytes,
            created_at: now,
            updated_at: now,
            comment_count: 0,
            like_count: 0,
        };

        let mut state = self.state.write().unwrap();
        state.posts.push(post.clone());
        post
    }

    async fn update_metadata(
        &self,
        post_id: &str,
        actor: &Actor,
        patch: MetadataPatch,
    ) -> MutationOutcome<Post> {
        let mut state = self.state.write().unwrap();
        let Some(post) = state.posts.iter_mut().find(|post| post.id == post_id) else {
            return MutationOutcome::NotFound;
        };
        if post.owner_id != actor.user_id {
            return MutationOutcome::Forbidden;
        }

        // A blank title is ignored; every other present field overwrites,
        // including an empty tags list.
        if let Some(title) = patch.title.filter(|title| has_text(title)) {
            post.title = title;
        }
        if let Some(description) = patch.description {
            post.description = Some(description);
        }
        if let Some(tags) = patch.tags {
            post.tags = sanitize_tags(&tags);
        }
        if let Some(visibility) = patch.visibility {
            post.visibility = visibility;
        }
        post.updated_at = Utc::now();

        MutationOutcome::Ok(post.clone())
    }

    async fn replace_media(
        &self,
        post_id: &str,
        actor: &Actor,
        original_file_name: String,
        file_size_bytes: i64,
    ) -> MutationOutcome<Post> {
        let mut state = self.state.write().unwrap();
        let Some(post) = state.posts.iter_mut().find(|post| post.id == post_id) else {
            return MutationOutcome::NotFound;
        };
        if post.owner_id != actor.user_id {
            return MutationOutcome::Forbidden;
        }

        // Always a brand-new pointer; the old file_id is never reused.
        let pointer = self.pointers.allocate();
        post.file_id = pointer.file_id;
        post.file_url = pointer.file_url;
        post.thumbnail_url = pointer.thumbnail_url;
        post.original_file_name = original_file_name;
        post.file_size_bytes = file_size_bytes;
        post.updated_at = Utc::now();

        MutationOutcome::Ok(post.clone())
    }

    async fn delete_post(&self, post_id: &str, actor: &Actor) -> MutationOutcome<()> {
        let mut state = self.state.write().unwrap();
        let Some(index) = state.posts.iter().position(|post| post.id == post_id) else {
            return MutationOutcome::NotFound;
        };
        if state.posts[index].owner_id != actor.user_id {
            return MutationOutcome::Forbidden;
        }

        // Cascade first, then the post itself.
        state.comments.retain(|comment| comment.post_id != post_id);
        state.posts.remove(index);
        MutationOutcome::Ok(())
    }

    async fn list_comments(
        &self,
        post_id: &str,
        page: i64,
        per_page: i64,
    ) -> Option<PagedResult<Comment>> {
        let state = self.state.read().unwrap();
        if !state.posts.iter().any(|post| post.id == post_id) {
            return None;
        }

        let mut all: Vec<&Comment> = state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let all: Vec<Comment> = all.into_iter().cloned().collect();

        Some(paginate(&all, page, per_page))
    }

    async fn add_comment(&self, post_id: &str, actor: &Actor, text: String) -> Option<Comment> {
        let mut guard = self.state.write().unwrap();
        let StoreState { posts, comments } = &mut *guard;
        let post = posts.iter_mut().find(|post| post.id == post_id)?;

        let now = Utc::now();
        let comment = Comment {
            id: format!("{}{}", COMMENT_ID_PREFIX, self.comment_sequence.next()),
            post_id: post_id.to_string(),
            author_id: actor.user_id.clone(),
            author_display_name: actor.display_name.clone(),
            text,
            created_at: now,
            updated_at: now,
        };
        comments.push(comment.clone());

        post.comment_count = live_comment_count(comments, post_id);
        post.updated_at = now;

        Some(comment)
    }

    async fn delete_comment(
        &self,
        post_id: &str,
        comment_id: &str,
        actor: &Actor,
    ) -> DeleteCommentOutcome {
        let mut guard = self.state.write().unwrap();
        let StoreState { posts, comments } = &mut *guard;

        let Some(post) = posts.iter_mut().find(|post| post.id == post_id) else {
            return DeleteCommentOutcome::PostNotFound;
        };
        let Some(index) = comments
            .iter()
            .position(|comment| comment.id == comment_id && comment.post_id == post_id)
        else {
            return DeleteCommentOutcome::CommentNotFound;
        };

        let can_delete = comments[index].author_id == actor.user_id
            || post.owner_id == actor.user_id;
        if !can_delete {
            return DeleteCommentOutcome::Forbidden;
        }

        comments.remove(index);
        post.comment_count = live_comment_count(comments, post_id);
        post.updated_at = Utc::now();
        DeleteCommentOutcome::Success
    }
}

fn live_comment_count(comments: &[Comment], post_id: &str) -> i64 {
    comments
        .iter()
        .filter(|comment| comment.post_id == post_id)
        .count() as i64
}
