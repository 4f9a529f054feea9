use chrono::{Duration, Utc};
use pikshare::auth::Actor;
use pikshare::listing::PostFilter;
use pikshare::models::{Comment, MetadataPatch, NewPost, Post, Visibility};
use pikshare::repository::{
    DeleteCommentOutcome, InMemoryRepository, MutationOutcome, Repository,
};
use pikshare::storage::MediaPointerBuilder;

// --- Test Data Helpers ---

fn actor(user_id: &str) -> Actor {
    Actor {
        user_id: user_id.to_string(),
        email: format!("{}@example.com", user_id),
        display_name: user_id.to_string(),
    }
}

fn pointers() -> MediaPointerBuilder {
    MediaPointerBuilder::new("https://cdn.example.com")
}

fn empty_repo() -> InMemoryRepository {
    InMemoryRepository::new(pointers())
}

fn seed_post(id: &str, owner: &str, visibility: Visibility, age_hours: i64) -> Post {
    let created_at = Utc::now() - Duration::hours(age_hours);
    let pointer = pointers().allocate();
    Post {
        id: id.to_string(),
        title: format!("Snapshot {}", id),
        tags: vec!["archive".to_string()],
        visibility,
        owner_id: owner.to_string(),
        owner_display_name: owner.to_string(),
        file_id: pointer.file_id,
        file_url: pointer.file_url,
        thumbnail_url: pointer.thumbnail_url,
        created_at,
        updated_at: created_at,
        ..Default::default()
    }
}

fn seed_comment(id: &str, post_id: &str, author: &str, age_minutes: i64) -> Comment {
    let created_at = Utc::now() - Duration::minutes(age_minutes);
    Comment {
        id: id.to_string(),
        post_id: post_id.to_string(),
        author_id: author.to_string(),
        author_display_name: author.to_string(),
        text: format!("comment by {}", author),
        created_at,
        updated_at: created_at,
    }
}

fn new_post(title: &str, visibility: Visibility) -> NewPost {
    NewPost {
        title: title.to_string(),
        description: Some("a description".to_string()),
        tags: vec![],
        visibility,
        original_file_name: "photo.jpg".to_string(),
        file_size_bytes: 1_024,
    }
}

// --- Sequences ---

#[tokio::test]
async fn test_first_allocation_on_empty_store() {
    let repo = empty_repo();
    let post = repo.create_post(&actor("alice"), new_post("One", Visibility::Public)).await;
    assert_eq!(post.id, "post-1001");

    let next = repo.create_post(&actor("alice"), new_post("Two", Visibility::Public)).await;
    assert_eq!(next.id, "post-1002");
}

#[tokio::test]
async fn test_sequences_seed_from_highest_existing_suffix() {
    let posts = vec![
        seed_post("post-1203", "alice", Visibility::Public, 2),
        // Ids not matching the numeric shape contribute nothing.
        seed_post("post-legacy", "alice", Visibility::Public, 3),
    ];
    let comments = vec![seed_comment("comment-5017", "post-1203", "bob", 10)];
    let repo = InMemoryRepository::with_data(pointers(), posts, comments);

    let post = repo.create_post(&actor("alice"), new_post("Next", Visibility::Public)).await;
    assert_eq!(post.id, "post-1204");

    let comment = repo
        .add_comment("post-1203", &actor("bob"), "next comment".to_string())
        .await
        .unwrap();
    assert_eq!(comment.id, "comment-5018");
}

// --- Creation ---

#[tokio::test]
async fn test_create_captures_actor_and_mints_pointer() {
    let repo = empty_repo();
    let who = Actor {
        user_id: "alice".to_string(),
        email: "alice@example.com".to_string(),
        display_name: "Alice Jensen".to_string(),
    };

    let post = repo.create_post(&who, new_post("Morning", Visibility::Unlisted)).await;

    assert_eq!(post.owner_id, "alice");
    assert_eq!(post.owner_display_name, "Alice Jensen");
    assert_eq!(post.visibility, Visibility::Unlisted);
    assert_eq!(post.comment_count, 0);
    assert_eq!(post.like_count, 0);
    assert_eq!(post.created_at, post.updated_at);
    assert!(post.file_url.contains(&post.file_id));
    assert!(post.thumbnail_url.contains(&post.file_id));
}

#[tokio::test]
async fn test_create_sanitizes_tags() {
    let repo = empty_repo();
    let mut input = new_post("Tagged", Visibility::Public);
    input.tags = vec!["Deep Sea ".to_string(), "DEEP-sea".to_string()];

    let post = repo.create_post(&actor("alice"), input).await;
    assert_eq!(post.tags, vec!["deep-sea".to_string()]);
}

// --- Visibility-gated reads ---

#[tokio::test]
async fn test_find_private_post_is_owner_only() {
    let repo = InMemoryRepository::with_data(
        pointers(),
        vec![seed_post("post-1001", "alice", Visibility::Private, 1)],
        vec![],
    );

    assert!(repo.find_post("post-1001", None).await.is_none());
    assert!(repo.find_post("post-1001", Some(&actor("bob"))).await.is_none());
    assert!(repo.find_post("post-1001", Some(&actor("alice"))).await.is_some());
    // The existence probe stays visibility-independent.
    assert!(repo.post_exists("post-1001").await);
}

#[tokio::test]
async fn test_unlisted_post_is_readable_by_anyone_directly() {
    let repo = InMemoryRepository::with_data(
        pointers(),
        vec![seed_post("post-1001", "alice", Visibility::Unlisted, 1)],
        vec![],
    );
    assert!(repo.find_post("post-1001", None).await.is_some());
}

// --- Listing ordering ---

#[tokio::test]
async fn test_listing_orders_by_created_at_descending() {
    let repo = InMemoryRepository::with_data(
        pointers(),
        vec![
            seed_post("post-1001", "alice", Visibility::Public, 30),
            seed_post("post-1002", "bob", Visibility::Public, 10),
            seed_post("post-1003", "carol", Visibility::Public, 20),
        ],
        vec![],
    );

    let result = repo
        .list_posts(PostFilter {
            page: 1,
            per_page: 24,
            ..Default::default()
        })
        .await;

    let ids: Vec<&str> = result.items.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["post-1002", "post-1003", "post-1001"]);
    assert_eq!(result.total, 3);
}

// --- Gated mutations ---

#[tokio::test]
async fn test_update_metadata_outcomes() {
    let repo = InMemoryRepository::with_data(
        pointers(),
        vec![seed_post("post-1001", "alice", Visibility::Public, 1)],
        vec![],
    );

    let missing = repo
        .update_metadata("post-9999", &actor("alice"), MetadataPatch::default())
        .await;
    assert_eq!(missing, MutationOutcome::NotFound);

    let not_owner = repo
        .update_metadata("post-1001", &actor("bob"), MetadataPatch::default())
        .await;
    assert_eq!(not_owner, MutationOutcome::Forbidden);

    let patch = MetadataPatch {
        title: Some("   ".to_string()), // blank: ignored
        description: Some("updated notes".to_string()),
        tags: Some(vec![]), // present-but-empty: replaces with empty
        visibility: Some(Visibility::Private),
    };
    let outcome = repo.update_metadata("post-1001", &actor("alice"), patch).await;
    let MutationOutcome::Ok(post) = outcome else {
        panic!("expected successful update");
    };
    assert_eq!(post.title, "Snapshot post-1001");
    assert_eq!(post.description.as_deref(), Some("updated notes"));
    assert!(post.tags.is_empty());
    assert_eq!(post.visibility, Visibility::Private);
    assert!(post.updated_at > post.created_at);
}

#[tokio::test]
async fn test_absent_patch_fields_leave_post_untouched() {
    let repo = InMemoryRepository::with_data(
        pointers(),
        vec![seed_post("post-1001", "alice", Visibility::Public, 1)],
        vec![],
    );

    let outcome = repo
        .update_metadata("post-1001", &actor("alice"), MetadataPatch::default())
        .await;
    let MutationOutcome::Ok(post) = outcome else {
        panic!("expected successful update");
    };
    assert_eq!(post.title, "Snapshot post-1001");
    assert_eq!(post.tags, vec!["archive".to_string()]);
    assert_eq!(post.visibility, Visibility::Public);
}

#[tokio::test]
async fn test_replace_media_always_mints_a_fresh_pointer() {
    let repo = InMemoryRepository::with_data(
        pointers(),
        vec![seed_post("post-1001", "alice", Visibility::Public, 1)],
        vec![],
    );
    let before = repo.find_post("post-1001", None).await.unwrap();

    let outcome = repo
        .replace_media("post-1001", &actor("alice"), "updated.mp4".to_string(), 9_000)
        .await;
    let MutationOutcome::Ok(after) = outcome else {
        panic!("expected successful replace");
    };

    assert_ne!(after.file_id, before.file_id);
    assert_ne!(after.file_url, before.file_url);
    assert_ne!(after.thumbnail_url, before.thumbnail_url);
    assert_eq!(after.original_file_name, "updated.mp4");
    assert_eq!(after.file_size_bytes, 9_000);

    let denied = repo
        .replace_media("post-1001", &actor("bob"), "x.bin".to_string(), 1)
        .await;
    assert_eq!(denied, MutationOutcome::Forbidden);
}

#[tokio::test]
async fn test_delete_post_cascades_to_comments() {
    let repo = InMemoryRepository::with_data(
        pointers(),
        vec![
            seed_post("post-1001", "alice", Visibility::Public, 2),
            seed_post("post-1002", "bob", Visibility::Public, 1),
        ],
        vec![
            seed_comment("comment-5001", "post-1001", "bob", 40),
            seed_comment("comment-5002", "post-1001", "carol", 30),
            seed_comment("comment-5003", "post-1002", "alice", 20),
        ],
    );

    assert_eq!(
        repo.delete_post("post-1001", &actor("bob")).await,
        MutationOutcome::Forbidden
    );
    assert_eq!(
        repo.delete_post("post-1001", &actor("alice")).await,
        MutationOutcome::Ok(())
    );

    // No orphans remain retrievable.
    assert!(repo.list_comments("post-1001", 1, 20).await.is_none());
    assert!(repo.latest_comments("post-1001", 3).await.is_empty());
    // The other post's comments are untouched.
    let other = repo.list_comments("post-1002", 1, 20).await.unwrap();
    assert_eq!(other.total, 1);
}

// --- Comments ---

#[tokio::test]
async fn test_comment_count_tracks_live_count() {
    let repo = InMemoryRepository::with_data(
        pointers(),
        vec![seed_post("post-1001", "alice", Visibility::Public, 1)],
        vec![],
    );

    for expected in 1..=3 {
        repo.add_comment("post-1001", &actor("bob"), format!("comment {}", expected))
            .await
            .unwrap();
        let post = repo.find_post("post-1001", None).await.unwrap();
        assert_eq!(post.comment_count, expected);
    }

    let outcome = repo
        .delete_comment("post-1001", "comment-5002", &actor("bob"))
        .await;
    assert_eq!(outcome, DeleteCommentOutcome::Success);

    let post = repo.find_post("post-1001", None).await.unwrap();
    assert_eq!(post.comment_count, 2);
    let listed = repo.list_comments("post-1001", 1, 20).await.unwrap();
    assert_eq!(listed.total, post.comment_count);
}

#[tokio::test]
async fn test_comment_mutations_bump_parent_updated_at() {
    let repo = InMemoryRepository::with_data(
        pointers(),
        vec![seed_post("post-1001", "alice", Visibility::Public, 1)],
        vec![],
    );
    let before = repo.find_post("post-1001", None).await.unwrap();

    repo.add_comment("post-1001", &actor("bob"), "hello".to_string())
        .await
        .unwrap();
    let after = repo.find_post("post-1001", None).await.unwrap();
    assert!(after.updated_at > before.updated_at);
}

#[tokio::test]
async fn test_add_comment_on_missing_post_is_none() {
    let repo = empty_repo();
    let result = repo
        .add_comment("post-9999", &actor("bob"), "hello".to_string())
        .await;
    assert!(result.is_none());
}

#[tokio::test]
async fn test_delete_comment_four_way_outcome_order() {
    let repo = InMemoryRepository::with_data(
        pointers(),
        vec![seed_post("post-1001", "alice", Visibility::Public, 1)],
        vec![seed_comment("comment-5001", "post-1001", "bob", 5)],
    );

    assert_eq!(
        repo.delete_comment("post-9999", "comment-5001", &actor("alice")).await,
        DeleteCommentOutcome::PostNotFound
    );
    assert_eq!(
        repo.delete_comment("post-1001", "comment-9999", &actor("alice")).await,
        DeleteCommentOutcome::CommentNotFound
    );
    // Neither the author nor the post owner.
    assert_eq!(
        repo.delete_comment("post-1001", "comment-5001", &actor("eve")).await,
        DeleteCommentOutcome::Forbidden
    );
    // The post owner may delete another author's comment.
    assert_eq!(
        repo.delete_comment("post-1001", "comment-5001", &actor("alice")).await,
        DeleteCommentOutcome::Success
    );
}

#[tokio::test]
async fn test_comment_author_can_delete_own_comment() {
    let repo = InMemoryRepository::with_data(
        pointers(),
        vec![seed_post("post-1001", "alice", Visibility::Public, 1)],
        vec![seed_comment("comment-5001", "post-1001", "bob", 5)],
    );
    assert_eq!(
        repo.delete_comment("post-1001", "comment-5001", &actor("bob")).await,
        DeleteCommentOutcome::Success
    );
}

#[tokio::test]
async fn test_comment_listing_is_ascending_and_paginated() {
    let repo = InMemoryRepository::with_data(
        pointers(),
        vec![seed_post("post-1001", "alice", Visibility::Public, 1)],
        vec![
            seed_comment("comment-5001", "post-1001", "bob", 50),
            seed_comment("comment-5002", "post-1001", "carol", 40),
            seed_comment("comment-5003", "post-1001", "bob", 30),
            seed_comment("comment-5004", "post-1001", "dave", 20),
            seed_comment("comment-5005", "post-1001", "carol", 10),
        ],
    );

    let first = repo.list_comments("post-1001", 1, 2).await.unwrap();
    let ids: Vec<&str> = first.items.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["comment-5001", "comment-5002"]);
    assert_eq!(first.total, 5);

    let last = repo.list_comments("post-1001", 3, 2).await.unwrap();
    let ids: Vec<&str> = last.items.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["comment-5005"]);
}

#[tokio::test]
async fn test_latest_comments_preview_is_newest_first_capped_at_limit() {
    let repo = InMemoryRepository::with_data(
        pointers(),
        vec![seed_post("post-1001", "alice", Visibility::Public, 1)],
        vec![
            seed_comment("comment-5001", "post-1001", "bob", 50),
            seed_comment("comment-5002", "post-1001", "carol", 40),
            seed_comment("comment-5003", "post-1001", "bob", 30),
            seed_comment("comment-5004", "post-1001", "dave", 20),
        ],
    );

    let latest = repo.latest_comments("post-1001", 3).await;
    let ids: Vec<&str> = latest.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["comment-5004", "comment-5003", "comment-5002"]);
}
