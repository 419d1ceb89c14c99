// src/progress/grader.rs

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::percentage_of;

/// Correct option(s) of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Choice {
    Single(String),
    Multiple(Vec<String>),
}

/// Answer key, one variant per question type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum AnswerKey {
    MultipleChoice(Choice),
    TrueFalse(bool),
    FillInBlank(String),
    CodeCompletion(String),
}

impl AnswerKey {
    pub fn question_type(&self) -> &'static str {
        match self {
            AnswerKey::MultipleChoice(_) => "multiple-choice",
            AnswerKey::TrueFalse(_) => "true-false",
            AnswerKey::FillInBlank(_) => "fill-in-blank",
            AnswerKey::CodeCompletion(_) => "code-completion",
        }
    }

    /// Type-specific equality between the key and a submitted answer.
    pub fn accepts(&self, answer: &UserAnswer) -> bool {
        match (self, answer) {
            (AnswerKey::MultipleChoice(Choice::Single(key)), UserAnswer::Text(given)) => {
                key == given
            }
            (AnswerKey::MultipleChoice(Choice::Multiple(keys)), UserAnswer::List(given)) => {
                let keys: BTreeSet<&String> = keys.iter().collect();
                let given: BTreeSet<&String> = given.iter().collect();
                keys == given
            }
            (AnswerKey::TrueFalse(key), UserAnswer::Bool(given)) => key == given,
            (AnswerKey::TrueFalse(key), UserAnswer::Text(given)) => match given.as_str() {
                "true" => *key,
                "false" => !*key,
                _ => false,
            },
            (AnswerKey::FillInBlank(key), UserAnswer::Text(given))
            | (AnswerKey::CodeCompletion(key), UserAnswer::Text(given)) => {
                normalize(key) == normalize(given)
            }
            _ => false,
        }
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub explanation: String,
    pub points: i64,
    pub answer: AnswerKey,
}

/// The graded view of a quiz: its question bank and pass rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizDefinition {
    pub id: i64,
    pub questions: Vec<Question>,
    /// Percentage needed to pass, 0..=100.
    pub passing_score: i32,
    /// 0 means unlimited.
    pub max_attempts: i32,
}

impl QuizDefinition {
    pub fn total_points(&self) -> i64 {
        self.questions.iter().map(|q| q.points).sum()
    }
}

/// A submitted answer: true/false, free text / single option, or a set of options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserAnswer {
    Bool(bool),
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_index: usize,
    pub user_answer: UserAnswer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradedAnswer {
    pub question_index: usize,
    pub is_correct: bool,
    pub points_earned: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradedResult {
    pub quiz_id: i64,
    pub score: i64,
    pub max_score: i64,
    pub percentage: i32,
    pub passed: bool,
    pub answers: Vec<GradedAnswer>,
    pub graded_at: DateTime<Utc>,
}

/// Scores a submission against the quiz's answer keys.
///
/// Answers pointing past the question bank earn nothing, and only the first
/// answer to a question counts. `max_score` covers every question in the
/// quiz, answered or not.
pub fn grade(
    quiz: &QuizDefinition,
    submission: &[SubmittedAnswer],
    graded_at: DateTime<Utc>,
) -> GradedResult {
    let mut answered = BTreeSet::new();
    let answers: Vec<GradedAnswer> = submission
        .iter()
        .map(|submitted| {
            let first_answer = answered.insert(submitted.question_index);
            let question = quiz
                .questions
                .get(submitted.question_index)
                .filter(|_| first_answer);
            let is_correct = question.is_some_and(|q| q.answer.accepts(&submitted.user_answer));
            let points_earned = match question {
                Some(q) if is_correct => q.points,
                _ => 0,
            };
            GradedAnswer {
                question_index: submitted.question_index,
                is_correct,
                points_earned,
            }
        })
        .collect();

    let score = answers.iter().map(|a| a.points_earned).sum();
    let max_score = quiz.total_points();
    let percentage = percentage_of(score, max_score);

    GradedResult {
        quiz_id: quiz.id,
        score,
        max_score,
        percentage,
        passed: percentage >= quiz.passing_score,
        answers,
        graded_at,
    }
}
