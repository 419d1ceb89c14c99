// src/models/topic.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug regex"));

pub const TOPIC_CATEGORIES: &[&str] = &["data-structures", "algorithms", "concepts"];
pub const DIFFICULTIES: &[&str] = &["beginner", "intermediate", "advanced"];

/// Represents the 'topics' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,

    /// URL key, lowercase words joined by '-'.
    pub slug: String,

    pub title: String,

    pub description: String,

    /// 'data-structures', 'algorithms' or 'concepts'.
    pub category: String,

    /// 'beginner', 'intermediate' or 'advanced'.
    pub difficulty: String,

    /// Sanitized HTML lesson body.
    pub content: String,

    /// Estimated reading time in minutes.
    pub estimated_minutes: i32,

    /// Position within the curriculum.
    pub sort_order: i32,

    pub is_published: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new topic.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTopicRequest {
    #[validate(length(min = 1, max = 100), regex(path = *SLUG_RE))]
    pub slug: String,
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(custom(function = validate_topic_category))]
    pub category: String,
    #[validate(custom(function = validate_difficulty))]
    pub difficulty: String,
    #[validate(length(max = 50000))]
    pub content: String,
    #[validate(range(min = 0, max = 600))]
    #[serde(default)]
    pub estimated_minutes: i32,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub is_published: bool,
}

fn validate_topic_category(category: &str) -> Result<(), validator::ValidationError> {
    if !TOPIC_CATEGORIES.contains(&category) {
        return Err(validator::ValidationError::new("invalid_category"));
    }
    Ok(())
}

/// Shared by topics and quizzes.
pub fn validate_difficulty(difficulty: &str) -> Result<(), validator::ValidationError> {
    if !DIFFICULTIES.contains(&difficulty) {
        return Err(validator::ValidationError::new("invalid_difficulty"));
    }
    Ok(())
}

/// Query parameters for listing catalog items.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CatalogParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    /// Case-insensitive match on title or description.
    pub search: Option<String>,
}

/// Filter handed to the catalog store.
#[derive(Debug, Default, Clone)]
pub struct CatalogFilter {
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub search: Option<String>,
    pub include_unpublished: bool,
}

impl CatalogFilter {
    /// Applies the filter to in-memory rows.
    pub fn matches(
        &self,
        category: &str,
        difficulty: &str,
        title: &str,
        description: &str,
        is_published: bool,
    ) -> bool {
        if !self.include_unpublished && !is_published {
            return false;
        }
        if self.category.as_deref().is_some_and(|c| c != category) {
            return false;
        }
        if self.difficulty.as_deref().is_some_and(|d| d != difficulty) {
            return false;
        }
        match &self.search {
            Some(needle) => {
                let needle = needle.to_lowercase();
                title.to_lowercase().contains(&needle)
                    || description.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }
}

impl From<&CatalogParams> for CatalogFilter {
    fn from(params: &CatalogParams) -> Self {
        Self {
            category: params.category.clone(),
            difficulty: params.difficulty.clone(),
            search: params.search.clone().filter(|s| !s.trim().is_empty()),
            include_unpublished: false,
        }
    }
}
