// src/models/assignment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::progress::SubmissionResult;

pub const ASSIGNMENT_CATEGORIES: &[&str] = &[
    "arrays",
    "strings",
    "linked-lists",
    "trees",
    "graphs",
    "dynamic-programming",
    "greedy",
    "other",
];
pub const ASSIGNMENT_DIFFICULTIES: &[&str] = &["easy", "medium", "hard"];

/// Represents the 'assignments' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub problem_statement: String,
    /// 'easy', 'medium' or 'hard'.
    pub difficulty: String,
    pub category: String,
    /// Score awarded when every test passes.
    pub points: i64,
    pub is_published: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Assignment {
    /// Scores a run of the test suite: `points` scaled by the pass ratio,
    /// rounded down so only a full pass earns full points.
    pub fn score_submission(&self, passed_count: i32, total_count: i32) -> SubmissionResult {
        let score_earned = if total_count > 0 {
            self.points * passed_count.max(0) as i64 / total_count as i64
        } else {
            0
        };

        SubmissionResult {
            passed_count,
            total_count,
            score_earned,
            max_score: self.points,
        }
    }
}

/// DTO for creating an assignment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAssignmentRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1, max = 1000))]
    pub description: String,
    #[validate(length(min = 1, max = 20000))]
    pub problem_statement: String,
    #[validate(custom(function = validate_assignment_difficulty))]
    pub difficulty: String,
    #[validate(custom(function = validate_assignment_category))]
    pub category: String,
    #[validate(range(min = 1, max = 1000))]
    #[serde(default = "default_points")]
    pub points: i64,
    #[serde(default)]
    pub is_published: bool,
}

fn default_points() -> i64 {
    10
}

fn validate_assignment_difficulty(difficulty: &str) -> Result<(), validator::ValidationError> {
    if !ASSIGNMENT_DIFFICULTIES.contains(&difficulty) {
        return Err(validator::ValidationError::new("invalid_difficulty"));
    }
    Ok(())
}

fn validate_assignment_category(category: &str) -> Result<(), validator::ValidationError> {
    if !ASSIGNMENT_CATEGORIES.contains(&category) {
        return Err(validator::ValidationError::new("invalid_category"));
    }
    Ok(())
}

/// DTO for an assignment submission: the test run outcome.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAssignmentRequest {
    #[validate(range(min = 0))]
    pub passed_count: i32,
    #[validate(range(min = 1))]
    pub total_count: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(points: i64) -> Assignment {
        Assignment {
            id: 1,
            title: "Two Sum".to_string(),
            description: "Find a pair".to_string(),
            problem_statement: "...".to_string(),
            difficulty: "easy".to_string(),
            category: "arrays".to_string(),
            points,
            is_published: true,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_full_pass_earns_full_points() {
        let result = assignment(10).score_submission(4, 4);
        assert_eq!(result.score_earned, 10);
        assert!(result.is_complete());
    }

    #[test]
    fn test_partial_pass_rounds_down() {
        let result = assignment(10).score_submission(2, 3);
        assert_eq!(result.score_earned, 6);
        assert_eq!(result.max_score, 10);
        assert!(!result.is_complete());
    }
}
