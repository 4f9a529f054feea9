use super::{
    COMMENT_ID_PREFIX, COMMENT_SEQUENCE_FLOOR, DeleteCommentOutcome, MutationOutcome,
    POST_ID_PREFIX, POST_SEQUENCE_FLOOR, Repository, Sequence, can_access,
};
use crate::auth::Actor;
use crate::listing::{PostFilter, clamp_page, clamp_per_page};
use crate::models::{
    Comment, MetadataPatch, NewPost, PagedResult, Post, PostSummary, Visibility, has_text,
    sanitize_tags,
};
use crate::storage::MediaPointerBuilder;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

const POST_COLUMNS: &str = "id, title, description, tags, visibility, owner_id, \
     owner_display_name, file_id, file_url, thumbnail_url, original_file_name, \
     file_size_bytes, created_at, updated_at, comment_count, like_count";

const COMMENT_COLUMNS: &str =
    "id, post_id, author_id, author_display_name, text, created_at, updated_at";

/// Raw `posts` row. Visibility travels as TEXT; an unrecognized stored value
/// resolves to the most restrictive level.
#[derive(sqlx::FromRow)]
struct PostRow {
    id: String,
    title: String,
    description: Option<String>,
    tags: Vec<String>,
    visibility: String,
    owner_id: String,
    owner_display_name: String,
    file_id: String,
    file_url: String,
    thumbnail_url: String,
    original_file_name: String,
    file_size_bytes: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    comment_count: i64,
    like_count: i64,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            title: row.title,
            description: row.description,
            tags: row.tags,
            visibility: Visibility::parse(&row.visibility).unwrap_or(Visibility::Private),
            owner_id: row.owner_id,
            owner_display_name: row.owner_display_name,
            file_id: row.file_id,
            file_url: row.file_url,
            thumbnail_url: row.thumbnail_url,
            original_file_name: row.original_file_name,
            file_size_bytes: row.file_size_bytes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            comment_count: row.comment_count,
            like_count: row.like_count,
        }
    }
}

/// PostgresRepository
///
/// The relational implementation of the store contract, over the two-table
/// schema in `migrations/`. Queries are built at runtime (QueryBuilder or
/// bound statements), and every comment mutation runs inside a transaction
/// that also refreshes the parent post's denormalized count.
pub struct PostgresRepository {
    pool: PgPool,
    pointers: MediaPointerBuilder,
    post_sequence: Sequence,
    comment_sequence: Sequence,
}

impl PostgresRepository {
    /// Connects the repository to an initialized pool, seeding both id
    /// sequences from the highest numeric suffix currently stored.
    pub async fn initialize(
        pool: PgPool,
        pointers: MediaPointerBuilder,
    ) -> Result<Self, sqlx::Error> {
        let highest_post: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX((substring(id from 6))::bigint), $1) \
             FROM posts WHERE id ~ '^post-[0-9]+$'",
        )
        .bind(POST_SEQUENCE_FLOOR as i64)
        .fetch_one(&pool)
        .await?;

        let highest_comment: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX((substring(id from 9))::bigint), $1) \
             FROM comments WHERE id ~ '^comment-[0-9]+$'",
        )
        .bind(COMMENT_SEQUENCE_FLOOR as i64)
        .fetch_one(&pool)
        .await?;

        Ok(Self {
            pool,
            pointers,
            post_sequence: Sequence::starting_at(highest_post.max(POST_SEQUENCE_FLOOR as i64) as u64),
            comment_sequence: Sequence::starting_at(
                highest_comment.max(COMMENT_SEQUENCE_FLOOR as i64) as u64,
            ),
        })
    }

    async fn fetch_post(&self, post_id: &str) -> Option<Post> {
        sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {} FROM posts WHERE id = $1",
            POST_COLUMNS
        ))
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("fetch_post error: {:?}", e);
            None
        })
        .map(Post::from)
    }
}

/// Appends the filter predicates as WHERE clauses, in the same precedence the
/// in-memory engine applies them.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &PostFilter) {
    if let Some(owner) = &filter.owner {
        builder.push(" AND owner_id = ");
        builder.push_bind(owner.clone());
    }
    if !filter.include_private {
        builder.push(" AND visibility <> 'private'");
    }
    if !filter.include_unlisted {
        builder.push(" AND visibility <> 'unlisted'");
    }
    if let Some(visibility) = filter.visibility {
        builder.push(" AND visibility = ");
        builder.push_bind(visibility.as_str());
    }
    if let Some(query) = &filter.query {
        let pattern = format!("%{}%", query);
        builder.push(" AND (title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR description ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR EXISTS (SELECT 1 FROM unnest(tags) AS tag WHERE tag ILIKE ");
        builder.push_bind(pattern);
        builder.push("))");
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_posts(&self, filter: PostFilter) -> PagedResult<PostSummary> {
        let page = clamp_page(filter.page);
        let per_page = clamp_per_page(filter.per_page);

        let mut count_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM posts WHERE true");
        push_filters(&mut count_builder, &filter);
        let total: i64 = match count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
        {
            Ok(total) => total,
            Err(e) => {
                tracing::error!("list_posts count error: {:?}", e);
                return PagedResult {
                    items: vec![],
                    page,
                    per_page,
                    total: 0,
                };
            }
        };

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM posts WHERE true", POST_COLUMNS));
        push_filters(&mut builder, &filter);
        builder.push(" ORDER BY created_at DESC LIMIT ");
        builder.push_bind(per_page);
        builder.push(" OFFSET ");
        builder.push_bind((page - 1) * per_page);

        let items = match builder.build_query_as::<PostRow>().fetch_all(&self.pool).await {
            Ok(rows) => rows
                .into_iter()
                .map(Post::from)
                .map(|post| PostSummary::from(&post))
                .collect(),
            Err(e) => {
                tracing::error!("list_posts error: {:?}", e);
                vec![]
            }
        };

        PagedResult {
            items,
            page,
            per_page,
            total,
        }
    }

    async fn find_post(&self, post_id: &str, actor: Option<&Actor>) -> Option<Post> {
        self.fetch_post(post_id)
            .await
            .filter(|post| can_access(post, actor))
    }

    async fn latest_comments(&self, post_id: &str, limit: usize) -> Vec<Comment> {
        sqlx::query_as::<_, Comment>(&format!(
            "SELECT {} FROM comments WHERE post_id = $1 ORDER BY created_at DESC LIMIT $2",
            COMMENT_COLUMNS
        ))
        .bind(post_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("latest_comments error: {:?}", e);
            vec![]
        })
    }

    async fn post_exists(&self, post_id: &str) -> bool {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("post_exists error: {:?}", e);
                false
            })
    }

    async fn create_post(&self, actor: &Actor, new_post: NewPost) -> Post {
        let now = Utc::now();
        let pointer = self.pointers.allocate();
        let post = Post {
            id: format!("{}{}", POST_ID_PREFIX, self.post_sequence.next()),
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

        sqlx::query(
            "INSERT INTO posts (id, title, description, tags, visibility, owner_id, \
             owner_display_name, file_id, file_url, thumbnail_url, original_file_name, \
             file_size_bytes, created_at, updated_at, comment_count, like_count) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(&post.id)
        .bind(&post.title)
        .bind(&post.description)
        .bind(&post.tags)
        .bind(post.visibility.as_str())
        .bind(&post.owner_id)
        .bind(&post.owner_display_name)
        .bind(&post.file_id)
        .bind(&post.file_url)
        .bind(&post.thumbnail_url)
        .bind(&post.original_file_name)
        .bind(post.file_size_bytes)
        .bind(post.created_at)
        .bind(post.updated_at)
        .bind(post.comment_count)
        .bind(post.like_count)
        .execute(&self.pool)
        .await
        .expect("Failed to insert post");

        post
    }

    async fn update_metadata(
        &self,
        post_id: &str,
        actor: &Actor,
        patch: MetadataPatch,
    ) -> MutationOutcome<Post> {
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::error!("update_metadata begin error: {:?}", e);
                return MutationOutcome::NotFound;
            }
        };

        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {} FROM posts WHERE id = $1 FOR UPDATE",
            POST_COLUMNS
        ))
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("update_metadata select error: {:?}", e);
            None
        });

        let Some(row) = row else {
            return MutationOutcome::NotFound;
        };
        let mut post = Post::from(row);
        if post.owner_id != actor.user_id {
            return MutationOutcome::Forbidden;
        }

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

        let updated = sqlx::query(
            "UPDATE posts SET title = $2, description = $3, tags = $4, visibility = $5, \
             updated_at = $6 WHERE id = $1",
        )
        .bind(&post.id)
        .bind(&post.title)
        .bind(&post.description)
        .bind(&post.tags)
        .bind(post.visibility.as_str())
        .bind(post.updated_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = updated {
            tracing::error!("update_metadata error: {:?}", e);
            return MutationOutcome::NotFound;
        }
        if let Err(e) = tx.commit().await {
            tracing::error!("update_metadata commit error: {:?}", e);
            return MutationOutcome::NotFound;
        }
        MutationOutcome::Ok(post)
    }

    async fn replace_media(
        &self,
        post_id: &str,
        actor: &Actor,
        original_file_name: String,
        file_size_bytes: i64,
    ) -> MutationOutcome<Post> {
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::error!("replace_media begin error: {:?}", e);
                return MutationOutcome::NotFound;
            }
        };

        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {} FROM posts WHERE id = $1 FOR UPDATE",
            POST_COLUMNS
        ))
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("replace_media select error: {:?}", e);
            None
        });

        let Some(row) = row else {
            return MutationOutcome::NotFound;
        };
        let mut post = Post::from(row);
        if post.owner_id != actor.user_id {
            return MutationOutcome::Forbidden;
        }

        let pointer = self.pointers.allocate();
        post.file_id = pointer.file_id;
        post.file_url = pointer.file_url;
        post.thumbnail_url = pointer.thumbnail_url;
        post.original_file_name = original_file_name;
        post.file_size_bytes = file_size_bytes;
        post.updated_at = Utc::now();

        let updated = sqlx::query(
            "UPDATE posts SET file_id = $2, file_url = $3, thumbnail_url = $4, \
             original_file_name = $5, file_size_bytes = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(&post.id)
        .bind(&post.file_id)
        .bind(&post.file_url)
        .bind(&post.thumbnail_url)
        .bind(&post.original_file_name)
        .bind(post.file_size_bytes)
        .bind(post.updated_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = updated {
            tracing::error!("replace_media error: {:?}", e);
            return MutationOutcome::NotFound;
        }
        if let Err(e) = tx.commit().await {
            tracing::error!("replace_media commit error: {:?}", e);
            return MutationOutcome::NotFound;
        }
        MutationOutcome::Ok(post)
    }

    async fn delete_post(&self, post_id: &str, actor: &Actor) -> MutationOutcome<()> {
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::error!("delete_post begin error: {:?}", e);
                return MutationOutcome::NotFound;
            }
        };

        let owner_id: Option<String> =
            sqlx::query_scalar("SELECT owner_id FROM posts WHERE id = $1 FOR UPDATE")
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("delete_post select error: {:?}", e);
                    None
                });

        let Some(owner_id) = owner_id else {
            return MutationOutcome::NotFound;
        };
        if owner_id != actor.user_id {
            return MutationOutcome::Forbidden;
        }

        // Cascade first, then the post itself.
        let result = async {
            sqlx::query("DELETE FROM comments WHERE post_id = $1")
                .bind(post_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM posts WHERE id = $1")
                .bind(post_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await
        }
        .await;

        match result {
            Ok(_) => MutationOutcome::Ok(()),
            Err(e) => {
                tracing::error!("delete_post error: {:?}", e);
                MutationOutcome::NotFound
            }
        }
    }

    async fn list_comments(
        &self,
        post_id: &str,
        page: i64,
        per_page: i64,
    ) -> Option<PagedResult<Comment>> {
        if !self.post_exists(post_id).await {
            return None;
        }

        let page = clamp_page(page);
        let per_page = clamp_per_page(per_page);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_comments count error: {:?}", e);
                0
            });

        let items = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {} FROM comments WHERE post_id = $1 \
             ORDER BY created_at ASC LIMIT $2 OFFSET $3",
            COMMENT_COLUMNS
        ))
        .bind(post_id)
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_comments error: {:?}", e);
            vec![]
        });

        Some(PagedResult {
            items,
            page,
            per_page,
            total,
        })
    }

    async fn add_comment(&self, post_id: &str, actor: &Actor, text: String) -> Option<Comment> {
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::error!("add_comment begin error: {:?}", e);
                return None;
            }
        };

        // Lock the parent row so the count refresh and a concurrent post
        // delete serialize against each other.
        let exists: Option<String> =
            sqlx::query_scalar("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("add_comment select error: {:?}", e);
                    None
                });
        exists.as_ref()?;

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

        let result = async {
            sqlx::query(
                "INSERT INTO comments (id, post_id, author_id, author_display_name, text, \
                 created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(&comment.id)
            .bind(&comment.post_id)
            .bind(&comment.author_id)
            .bind(&comment.author_display_name)
            .bind(&comment.text)
            .bind(comment.created_at)
            .bind(comment.updated_at)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE posts SET comment_count = \
                 (SELECT COUNT(*) FROM comments WHERE post_id = $1), updated_at = $2 \
                 WHERE id = $1",
            )
            .bind(post_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            tx.commit().await
        }
        .await;

        match result {
            Ok(_) => Some(comment),
            Err(e) => {
                tracing::error!("add_comment error: {:?}", e);
                None
            }
        }
    }

    async fn delete_comment(
        &self,
        post_id: &str,
        comment_id: &str,
        actor: &Actor,
    ) -> DeleteCommentOutcome {
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::error!("delete_comment begin error: {:?}", e);
                return DeleteCommentOutcome::PostNotFound;
            }
        };

        let owner_id: Option<String> =
            sqlx::query_scalar("SELECT owner_id FROM posts WHERE id = $1 FOR UPDATE")
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("delete_comment post select error: {:?}", e);
                    None
                });
        let Some(owner_id) = owner_id else {
            return DeleteCommentOutcome::PostNotFound;
        };

        let author_id: Option<String> =
            sqlx::query_scalar("SELECT author_id FROM comments WHERE id = $1 AND post_id = $2")
                .bind(comment_id)
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("delete_comment comment select error: {:?}", e);
                    None
                });
        let Some(author_id) = author_id else {
            return DeleteCommentOutcome::CommentNotFound;
        };

        if author_id != actor.user_id && owner_id != actor.user_id {
            return DeleteCommentOutcome::Forbidden;
        }

        let now = Utc::now();
        let result = async {
            sqlx::query("DELETE FROM comments WHERE id = $1 AND post_id = $2")
                .bind(comment_id)
                .bind(post_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                "UPDATE posts SET comment_count = \
                 (SELECT COUNT(*) FROM comments WHERE post_id = $1), updated_at = $2 \
                 WHERE id = $1",
            )
            .bind(post_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            tx.commit().await
        }
        .await;

        match result {
            Ok(_) => DeleteCommentOutcome::Success,
            Err(e) => {
                tracing::error!("delete_comment error: {:?}", e);
                DeleteCommentOutcome::CommentNotFound
            }
        }
    }
}
