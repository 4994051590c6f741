//! Shared domain types used across the store, services, and HTTP layers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Active,
    Archived,
    Deleted,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Active => "active",
            BookStatus::Archived => "archived",
            BookStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(BookStatus::Active),
            "archived" => Some(BookStatus::Archived),
            "deleted" => Some(BookStatus::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub normalized_name: String,
    pub biography: Option<String>,
    pub birth_date: Option<String>,
    pub death_date: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Book {
    pub id: i64,
    pub name: String,
    pub author_id: i64,
    pub file_path: String,
    pub file_format: String,
    pub file_size: i64,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub page_count: Option<i64>,
    pub publisher: Option<String>,
    pub publication_date: Option<String>,
    pub cover_image_path: Option<String>,
    pub status: String,
    pub archived_at: Option<String>,
    pub archive_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub requires_permission: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagPreferenceState {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub resource_type: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadingProgress {
    pub user_id: i64,
    pub book_id: i64,
    pub current_page: i64,
    pub total_pages: Option<i64>,
    pub percentage_complete: f64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub last_read_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Invitation {
    pub id: i64,
    pub email: String,
    pub expires_at: String,
    pub consumed_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFlow {
    Signup,
    Invitation,
}

impl AuthFlow {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFlow::Signup => "signup",
            AuthFlow::Invitation => "invitation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "signup" => Some(AuthFlow::Signup),
            "invitation" => Some(AuthFlow::Invitation),
            _ => None,
        }
    }
}

/// Filter applied by a user-facing book listing; composed with role/tag
/// visibility rules by `services::visibility`. Genres and tags are distinct
/// filter axes: a genre filter matches only tags in the `genre` category,
/// a tag filter matches any tag regardless of category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookFilter {
    pub include_genres: Vec<String>,
    pub exclude_genres: Vec<String>,
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub search: Option<String>,
}

/// Aggregate reading statistics for `GET /reading/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingStats {
    pub current_streak_days: u32,
    pub currently_reading_count: i64,
    pub completed_count: i64,
}

/// Authenticated request context attached as an axum extension after JWT
/// validation.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub roles: Vec<String>,
}
