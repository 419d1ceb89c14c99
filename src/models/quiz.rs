// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::{
    models::topic::validate_difficulty,
    progress::grader::{Question, QuizDefinition, SubmittedAnswer},
};

pub const QUIZ_CATEGORIES: &[&str] = &["data-structures", "algorithms", "concepts", "mixed"];

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: String,

    /// Question bank including answer keys.
    /// Stored as a JSONB array in the database.
    pub questions: Json<Vec<Question>>,

    /// Percentage needed to pass.
    pub passing_score: i32,

    /// 0 means unlimited attempts.
    pub max_attempts: i32,

    /// Minutes, 0 means no limit.
    pub time_limit: i32,

    pub is_published: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Quiz {
    /// The grader's view of this quiz.
    pub fn definition(&self) -> QuizDefinition {
        QuizDefinition {
            id: self.id,
            questions: self.questions.0.clone(),
            passing_score: self.passing_score,
            max_attempts: self.max_attempts,
        }
    }

    pub fn total_points(&self) -> i64 {
        self.questions.iter().map(|q| q.points).sum()
    }
}

/// DTO for sending a question to clients (answer key and explanation removed).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub index: usize,
    #[serde(rename = "type")]
    pub question_type: &'static str,
    pub prompt: String,
    pub options: Vec<String>,
    pub points: i64,
}

/// DTO for a quiz without answers.
#[derive(Debug, Serialize)]
pub struct PublicQuiz {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: String,
    pub passing_score: i32,
    pub max_attempts: i32,
    pub time_limit: i32,
    pub total_points: i64,
    pub questions_count: usize,
    /// Omitted in list responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<PublicQuestion>>,
}

impl PublicQuiz {
    /// List view: counts only, no questions.
    pub fn summary(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            category: quiz.category.clone(),
            difficulty: quiz.difficulty.clone(),
            passing_score: quiz.passing_score,
            max_attempts: quiz.max_attempts,
            time_limit: quiz.time_limit,
            total_points: quiz.total_points(),
            questions_count: quiz.questions.len(),
            questions: None,
        }
    }

    /// Detail view: questions without their answer keys.
    pub fn detail(quiz: &Quiz) -> Self {
        let questions = quiz
            .questions
            .iter()
            .enumerate()
            .map(|(index, q)| PublicQuestion {
                index,
                question_type: q.answer.question_type(),
                prompt: q.prompt.clone(),
                options: q.options.clone(),
                points: q.points,
            })
            .collect();

        Self {
            questions: Some(questions),
            ..Self::summary(quiz)
        }
    }
}

/// DTO for creating a quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(custom(function = validate_quiz_category))]
    pub category: String,
    #[validate(custom(function = validate_difficulty))]
    pub difficulty: String,
    #[validate(length(min = 1, max = 200), custom(function = validate_questions))]
    pub questions: Vec<Question>,
    #[validate(range(min = 0, max = 100))]
    #[serde(default = "default_passing_score")]
    pub passing_score: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub max_attempts: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub time_limit: i32,
    #[serde(default)]
    pub is_published: bool,
}

fn default_passing_score() -> i32 {
    70
}

fn validate_quiz_category(category: &str) -> Result<(), validator::ValidationError> {
    if !QUIZ_CATEGORIES.contains(&category) {
        return Err(validator::ValidationError::new("invalid_category"));
    }
    Ok(())
}

/// Every question needs a prompt and at least one point.
fn validate_questions(questions: &[Question]) -> Result<(), validator::ValidationError> {
    for q in questions {
        if q.prompt.trim().is_empty() {
            return Err(validator::ValidationError::new("question_prompt_required"));
        }
        if q.points < 1 {
            return Err(validator::ValidationError::new("question_points_must_be_positive"));
        }
    }
    Ok(())
}

/// DTO for a quiz attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitQuizRequest {
    #[validate(length(min = 1, max = 500, message = "Answers are required"))]
    pub answers: Vec<SubmittedAnswer>,
}
