//! Book (catalog) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Shortest query accepted by the search endpoint
pub const SEARCH_MIN_LENGTH: usize = 2;
/// Maximum number of rows returned by the search endpoint
pub const SEARCH_MAX_RESULTS: i64 = 8;

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub category: Option<String>,
    pub isbn: Option<String>,
    pub publication_year: i32,
    pub total_copies: i32,
    /// Copies on the shelf; always between 0 and `total_copies`
    pub available_copies: i32,
    pub shelf_number: Option<String>,
    /// Cover image reference (URL or asset path)
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Book {
    /// Copies currently out with members
    pub fn lent_copies(&self) -> i32 {
        self.total_copies - self.available_copies
    }
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    pub category: Option<String>,
    pub isbn: Option<String>,
    pub publication_year: i32,
    #[validate(range(min = 0, message = "Total copies cannot be negative"))]
    pub total_copies: i32,
    pub shelf_number: Option<String>,
    pub image: Option<String>,
}

/// Update book request; absent fields are left unchanged
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Author cannot be empty"))]
    pub author: Option<String>,
    pub category: Option<String>,
    pub isbn: Option<String>,
    pub publication_year: Option<i32>,
    #[validate(range(min = 0, message = "Total copies cannot be negative"))]
    pub total_copies: Option<i32>,
    pub shelf_number: Option<String>,
    pub image: Option<String>,
}

impl CreateBook {
    /// Trim title and author so blank values fail validation
    pub fn normalize(&mut self) {
        self.title = self.title.trim().to_string();
        self.author = self.author.trim().to_string();
    }
}

impl UpdateBook {
    pub fn normalize(&mut self) {
        for field in [&mut self.title, &mut self.author].into_iter().flatten() {
            *field = field.trim().to_string();
        }
    }
}

/// Book search query parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct BookSearchQuery {
    /// Substring matched against title, author and ISBN
    pub q: Option<String>,
}

/// Available copies after changing the total, keeping the lent-out count fixed.
///
/// Returns `None` when the new total is smaller than the number of copies
/// currently out with members.
pub fn recompute_available(old_total: i32, old_available: i32, new_total: i32) -> Option<i32> {
    let lent = old_total - old_available;
    let available = new_total - lent;
    (available >= 0).then_some(available)
}

/// Normalize a search query into a `LIKE` pattern, or `None` if it is too short.
pub fn search_pattern(query: &str) -> Option<String> {
    let query = query.trim();
    if query.chars().count() < SEARCH_MIN_LENGTH {
        return None;
    }

    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    Some(pattern)
}
