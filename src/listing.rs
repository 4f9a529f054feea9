use crate::models::{PagedResult, Post, Visibility};

/// PostFilter
///
/// The fully resolved filter set handed to the listing engine. The boundary
/// layer is responsible for deriving `include_private`/`include_unlisted`
/// from the actor and for dropping a private `visibility` filter the caller
/// is not entitled to (see the list handler).
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub page: i64,
    pub per_page: i64,
    /// Exact owner_id match.
    pub owner: Option<String>,
    pub include_private: bool,
    pub include_unlisted: bool,
    /// Case-insensitive substring over title, description and tags.
    pub query: Option<String>,
    /// Exact visibility match, applied after the visibility gate.
    pub visibility: Option<Visibility>,
}

impl PostFilter {
    /// Whether a post passes every filter predicate. Predicates are ANDed in
    /// precedence order: owner, visibility gate, visibility filter, query.
    pub fn matches(&self, post: &Post) -> bool {
        if let Some(owner) = &self.owner {
            if &post.owner_id != owner {
                return false;
            }
        }
        if !self.include_private && post.visibility == Visibility::Private {
            return false;
        }
        if !self.include_unlisted && post.visibility == Visibility::Unlisted {
            return false;
        }
        if let Some(visibility) = self.visibility {
            if post.visibility != visibility {
                return false;
            }
        }
        if let Some(query) = &self.query {
            if !matches_query(post, query) {
                return false;
            }
        }
        true
    }
}

fn matches_query(post: &Post, query: &str) -> bool {
    let q = query.to_lowercase();
    post.title.to_lowercase().contains(&q)
        || post
            .description
            .as_deref()
            .is_some_and(|description| description.to_lowercase().contains(&q))
        // Tags are stored lowercase already.
        || post.tags.iter().any(|tag| tag.contains(&q))
}

/// Clamps a requested page number to the minimum of 1.
pub fn clamp_page(page: i64) -> i64 {
    page.max(1)
}

/// Clamps a requested page size to the closed range [1, 100].
pub fn clamp_per_page(per_page: i64) -> i64 {
    per_page.clamp(1, 100)
}

/// Cuts one deterministic page out of an already filtered, already ordered
/// collection. The slice `[(page-1)*per_page, page*per_page)` is clamped to
/// `[0, total]`, so an out-of-range page yields an empty item list with the
/// correct total.
pub fn paginate<T: Clone>(all: &[T], page: i64, per_page: i64) -> PagedResult<T> {
    let page = clamp_page(page);
    let per_page = clamp_per_page(per_page);
    let total = all.len();

    let from = (((page - 1) * per_page) as usize).min(total);
    let to = (from + per_page as usize).min(total);

    PagedResult {
        items: all[from..to].to_vec(),
        page,
        per_page,
        total: total as i64,
    }
}
