// src/progress/record.rs

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{error::ProgressError, grader::GradedResult};

/// Status of a topic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopicStatus {
    NotStarted,
    InProgress,
    Completed,
}

/// Status of an assignment entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentStatus {
    NotStarted,
    InProgress,
    Submitted,
    Completed,
}

/// Status of a quiz entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuizStatus {
    NotStarted,
    InProgress,
    Completed,
}

/// Text form of the status enums, shared with the database columns.
macro_rules! status_text {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ProgressError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(ProgressError::Validation(format!(
                        "Invalid {} '{}'",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

status_text!(TopicStatus {
    NotStarted => "not-started",
    InProgress => "in-progress",
    Completed => "completed",
});

status_text!(AssignmentStatus {
    NotStarted => "not-started",
    InProgress => "in-progress",
    Submitted => "submitted",
    Completed => "completed",
});

status_text!(QuizStatus {
    NotStarted => "not-started",
    InProgress => "in-progress",
    Completed => "completed",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicProgress {
    pub status: TopicStatus,
    pub time_spent_seconds: i64,
    pub last_accessed_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentProgress {
    pub status: AssignmentStatus,
    pub best_score: i64,
    pub max_score: i64,
    pub attempts: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizProgress {
    pub status: QuizStatus,
    pub best_score: i64,
    pub max_score: i64,
    /// Percentage of the best score, 0..=100.
    pub percentage: i32,
    pub attempts: i32,
    /// 0 means unlimited.
    pub max_attempts: i32,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A topic view/progress event.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicEvent {
    pub topic_id: i64,
    pub status: TopicStatus,
    /// Seconds to add to the running total.
    #[serde(default)]
    pub time_spent: i64,
}

impl TopicEvent {
    pub fn validate(&self) -> Result<(), ProgressError> {
        if self.time_spent < 0 {
            return Err(ProgressError::Validation(
                "Time spent must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of one assignment submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub passed_count: i32,
    pub total_count: i32,
    pub score_earned: i64,
    pub max_score: i64,
}

impl SubmissionResult {
    pub fn validate(&self) -> Result<(), ProgressError> {
        if self.passed_count < 0 || self.total_count < 0 {
            return Err(ProgressError::Validation(
                "Test counts must be non-negative".to_string(),
            ));
        }
        if self.passed_count > self.total_count {
            return Err(ProgressError::Validation(
                "Passed count cannot exceed total count".to_string(),
            ));
        }
        if self.max_score <= 0 {
            return Err(ProgressError::Validation(
                "Max score must be positive".to_string(),
            ));
        }
        if self.score_earned < 0 || self.score_earned > self.max_score {
            return Err(ProgressError::Validation(format!(
                "Score must be between 0 and {}",
                self.max_score
            )));
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.score_earned >= self.max_score
    }
}

/// Per-user aggregate of topic, assignment and quiz activity.
///
/// Counters and the overall score are computed from the entry maps on
/// every read; the maps are the only stored state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: i64,
    pub topics: BTreeMap<i64, TopicProgress>,
    pub assignments: BTreeMap<i64, AssignmentProgress>,
    pub quizzes: BTreeMap<i64, QuizProgress>,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Derived counters attached to every progress response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub completed_topics: usize,
    pub total_topics: usize,
    pub completed_assignments: usize,
    pub total_assignments: usize,
    pub completed_quizzes: usize,
    pub total_quizzes: usize,
    pub overall_score: i64,
    pub completion_percentage: u32,
    pub average_score: i64,
}

impl ProgressRecord {
    pub fn new(user_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            topics: BTreeMap::new(),
            assignments: BTreeMap::new(),
            quizzes: BTreeMap::new(),
            last_activity_at: now,
            created_at: now,
        }
    }

    /// Merges a topic event. Status changes are last-write-wins; the first
    /// completion timestamp is kept.
    pub fn apply_topic_event(
        &mut self,
        event: &TopicEvent,
        now: DateTime<Utc>,
    ) -> Result<&TopicProgress, ProgressError> {
        event.validate()?;

        let entry = self
            .topics
            .entry(event.topic_id)
            .and_modify(|tp| {
                tp.status = event.status;
                tp.time_spent_seconds += event.time_spent;
                tp.last_accessed_at = now;
            })
            .or_insert_with(|| TopicProgress {
                status: event.status,
                time_spent_seconds: event.time_spent,
                last_accessed_at: now,
                completed_at: None,
            });

        if entry.status == TopicStatus::Completed && entry.completed_at.is_none() {
            entry.completed_at = Some(now);
        }

        self.last_activity_at = now;
        Ok(entry)
    }

    /// Merges an assignment submission. Status follows this attempt: a full
    /// score completes the entry, anything less leaves it submitted. The best
    /// score and the first completion timestamp are kept either way.
    pub fn apply_assignment_event(
        &mut self,
        assignment_id: i64,
        result: &SubmissionResult,
        now: DateTime<Utc>,
    ) -> Result<&AssignmentProgress, ProgressError> {
        result.validate()?;

        let entry = self
            .assignments
            .entry(assignment_id)
            .or_insert_with(|| AssignmentProgress {
                status: AssignmentStatus::NotStarted,
                best_score: 0,
                max_score: result.max_score,
                attempts: 0,
                last_attempt_at: None,
                completed_at: None,
            });

        entry.attempts += 1;
        entry.best_score = entry.best_score.max(result.score_earned);
        entry.max_score = result.max_score;
        entry.last_attempt_at = Some(now);

        if result.is_complete() {
            entry.status = AssignmentStatus::Completed;
            entry.completed_at.get_or_insert(now);
        } else {
            entry.status = AssignmentStatus::Submitted;
        }

        self.last_activity_at = now;
        Ok(entry)
    }

    /// Merges a graded quiz attempt. Fails without touching the record when
    /// the attempt limit is already used up.
    pub fn apply_quiz_event(
        &mut self,
        quiz_id: i64,
        graded: &GradedResult,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> Result<&QuizProgress, ProgressError> {
        if graded.score < 0 || graded.max_score < 0 {
            return Err(ProgressError::Validation(
                "Scores must be non-negative".to_string(),
            ));
        }

        if let Some(existing) = self.quizzes.get(&quiz_id) {
            if max_attempts > 0 && existing.attempts >= max_attempts {
                return Err(ProgressError::AttemptsExceeded {
                    quiz_id,
                    max_attempts,
                });
            }
        }

        let entry = self.quizzes.entry(quiz_id).or_insert_with(|| QuizProgress {
            status: QuizStatus::NotStarted,
            best_score: 0,
            max_score: graded.max_score,
            percentage: 0,
            attempts: 0,
            max_attempts,
            completed_at: None,
        });

        entry.attempts += 1;
        entry.max_attempts = max_attempts;
        entry.max_score = graded.max_score;
        entry.best_score = entry.best_score.max(graded.score);
        entry.percentage = percentage_of(entry.best_score, entry.max_score).min(100);

        if graded.passed {
            entry.status = QuizStatus::Completed;
            entry.completed_at.get_or_insert(now);
        } else if entry.status != QuizStatus::Completed {
            entry.status = QuizStatus::InProgress;
        }

        self.last_activity_at = now;
        Ok(entry)
    }

    pub fn completed_topics(&self) -> usize {
        self.topics
            .values()
            .filter(|tp| tp.status == TopicStatus::Completed)
            .count()
    }

    pub fn total_topics(&self) -> usize {
        self.topics.len()
    }

    pub fn completed_assignments(&self) -> usize {
        self.assignments
            .values()
            .filter(|ap| ap.status == AssignmentStatus::Completed)
            .count()
    }

    pub fn total_assignments(&self) -> usize {
        self.assignments.len()
    }

    pub fn completed_quizzes(&self) -> usize {
        self.quizzes
            .values()
            .filter(|qp| qp.status == QuizStatus::Completed)
            .count()
    }

    pub fn total_quizzes(&self) -> usize {
        self.quizzes.len()
    }

    /// Sum of best scores across completed quizzes and assignments.
    pub fn overall_score(&self) -> i64 {
        let quizzes: i64 = self
            .quizzes
            .values()
            .filter(|qp| qp.status == QuizStatus::Completed)
            .map(|qp| qp.best_score)
            .sum();
        let assignments: i64 = self
            .assignments
            .values()
            .filter(|ap| ap.status == AssignmentStatus::Completed)
            .map(|ap| ap.best_score)
            .sum();
        quizzes + assignments
    }

    fn completed_items(&self) -> usize {
        self.completed_topics() + self.completed_assignments() + self.completed_quizzes()
    }

    fn total_items(&self) -> usize {
        self.total_topics() + self.total_assignments() + self.total_quizzes()
    }

    pub fn completion_percentage(&self) -> u32 {
        let total = self.total_items();
        if total == 0 {
            return 0;
        }
        (100.0 * self.completed_items() as f64 / total as f64).round() as u32
    }

    pub fn average_score(&self) -> i64 {
        let completed = self.completed_items();
        if completed == 0 {
            return 0;
        }
        (self.overall_score() as f64 / completed as f64).round() as i64
    }

    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            completed_topics: self.completed_topics(),
            total_topics: self.total_topics(),
            completed_assignments: self.completed_assignments(),
            total_assignments: self.total_assignments(),
            completed_quizzes: self.completed_quizzes(),
            total_quizzes: self.total_quizzes(),
            overall_score: self.overall_score(),
            completion_percentage: self.completion_percentage(),
            average_score: self.average_score(),
        }
    }
}

/// round(100 * score / max), 0 when max is 0.
pub(crate) fn percentage_of(score: i64, max: i64) -> i32 {
    if max <= 0 {
        return 0;
    }
    (100.0 * score as f64 / max as f64).round() as i32
}
