use crate::models::{Comment, Post, Visibility};
use crate::storage::MediaPointerBuilder;
use chrono::{Duration, Utc};

/// Deterministic demo fixture: three posts covering all three visibility
/// levels, owned by distinct users, plus two comments on the public post.
/// Ids deliberately sit above the sequence floors so that counter seeding
/// from existing ids is observable (the next post is `post-1004`).
pub fn demo_fixture(pointers: &MediaPointerBuilder) -> (Vec<Post>, Vec<Comment>) {
    let now = Utc::now();

    let posts = vec![
        seed_post(
            pointers,
            "post-1001",
            "Harbor sunrise timelapse",
            "First light over the marina, shot from the breakwater.",
            &["harbor", "sunrise", "timelapse"],
            Visibility::Public,
            "alice",
            "Alice Jensen",
            "sunrise.mp4",
            24_500_000,
            now - Duration::hours(24),
            2,
            42,
        ),
        seed_post(
            pointers,
            "post-1002",
            "Street market film scans",
            "A roll of Portra 400 from Saturday's market.",
            &["film", "street", "market"],
            Visibility::Unlisted,
            "bob",
            "Bob Smith",
            "market-scans.jpg",
            6_400_000,
            now - Duration::hours(48),
            0,
            12,
        ),
        seed_post(
            pointers,
            "post-1003",
            "Portfolio drafts",
            "Unreviewed edits, not ready to share.",
            &["portfolio", "draft"],
            Visibility::Private,
            "carol",
            "Carol Nguyen",
            "drafts.zip",
            88_000_000,
            now - Duration::hours(72),
            0,
            0,
        ),
    ];

    let comments = vec![
        seed_comment(
            "comment-5001",
            "post-1001",
            "bob",
            "Bob Smith",
            "Fantastic light in this one.",
            now - Duration::minutes(90),
        ),
        seed_comment(
            "comment-5002",
            "post-1001",
            "carol",
            "Carol Nguyen",
            "Looking forward to the full set.",
            now - Duration::minutes(30),
        ),
    ];

    (posts, comments)
}

#[allow(clippy::too_many_arguments)]
fn seed_post(
    pointers: &MediaPointerBuilder,
    id: &str,
    title: &str,
    description: &str,
    tags: &[&str],
    visibility: Visibility,
    owner_id: &str,
    owner_display_name: &str,
    original_file_name: &str,
    file_size_bytes: i64,
    created_at: chrono::DateTime<Utc>,
    comment_count: i64,
    like_count: i64,
) -> Post {
    let pointer = pointers.allocate();
    Post {
        id: id.to_string(),
        title: title.to_string(),
        description: Some(description.to_string()),
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
        visibility,
        owner_id: owner_id.to_string(),
        owner_display_name: owner_display_name.to_string(),
        file_id: pointer.file_id,
        file_url: pointer.file_url,
        thumbnail_url: pointer.thumbnail_url,
        original_file_name: original_file_name.to_string(),
        file_size_bytes,
        created_at,
        updated_at: created_at,
        comment_count,
        like_count,
    }
}

fn seed_comment(
    id: &str,
    post_id: &str,
    author_id: &str,
    author_display_name: &str,
    text: &str,
    created_at: chrono::DateTime<Utc>,
) -> Comment {
    Comment {
        id: id.to_string(),
        post_id: post_id.to_string(),
        author_id: author_id.to_string(),
        author_display_name: author_display_name.to_string(),
        text: text.to_string(),
        created_at,
        updated_at: created_at,
    }
}
