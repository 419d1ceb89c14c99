// src/progress/stats.rs

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::{
    ranker::rank,
    record::{ProgressRecord, ProgressSummary},
};

/// Learners with activity inside this window count as active.
pub const ACTIVE_WINDOW_DAYS: i64 = 30;

/// One learner's totals and leaderboard standing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LearnerStats {
    #[serde(flatten)]
    pub summary: ProgressSummary,
    pub total_time_spent_seconds: i64,
    pub quiz_attempts: i64,
    pub assignment_attempts: i64,
    /// Mean of the best percentage over attempted quizzes, rounded.
    pub average_quiz_percentage: u32,
    /// 1-based leaderboard position, `None` when the record is not ranked.
    pub rank: Option<u64>,
    pub ranked_learners: u64,
}

impl LearnerStats {
    /// `all` is every learner's record; `record` is ranked against it.
    pub fn compute(record: &ProgressRecord, all: &[ProgressRecord]) -> Self {
        let ranked = rank(all);
        let position = ranked
            .iter()
            .position(|entry| entry.user_id == record.user_id)
            .map(|index| index as u64 + 1);

        let average_quiz_percentage = if record.quizzes.is_empty() {
            0
        } else {
            let sum: i64 = record.quizzes.values().map(|qp| qp.percentage as i64).sum();
            (sum as f64 / record.quizzes.len() as f64).round() as u32
        };

        Self {
            summary: record.summary(),
            total_time_spent_seconds: time_spent(record),
            quiz_attempts: quiz_attempts(record),
            assignment_attempts: assignment_attempts(record),
            average_quiz_percentage,
            rank: position,
            ranked_learners: ranked.len() as u64,
        }
    }
}

/// Platform-wide activity across every progress record.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct EngagementStats {
    pub learners: u64,
    /// Learners active within the last `ACTIVE_WINDOW_DAYS` days.
    pub active_learners: u64,
    pub completed_topics: u64,
    pub completed_assignments: u64,
    pub completed_quizzes: u64,
    pub quiz_attempts: i64,
    pub assignment_attempts: i64,
    pub total_time_spent_seconds: i64,
}

impl EngagementStats {
    pub fn compute(records: &[ProgressRecord], now: DateTime<Utc>) -> Self {
        let since = now - Duration::days(ACTIVE_WINDOW_DAYS);

        records.iter().fold(Self::default(), |mut acc, record| {
            acc.learners += 1;
            if record.last_activity_at >= since {
                acc.active_learners += 1;
            }
            acc.completed_topics += record.completed_topics() as u64;
            acc.completed_assignments += record.completed_assignments() as u64;
            acc.completed_quizzes += record.completed_quizzes() as u64;
            acc.quiz_attempts += quiz_attempts(record);
            acc.assignment_attempts += assignment_attempts(record);
            acc.total_time_spent_seconds += time_spent(record);
            acc
        })
    }
}

fn time_spent(record: &ProgressRecord) -> i64 {
    record.topics.values().map(|tp| tp.time_spent_seconds).sum()
}

fn quiz_attempts(record: &ProgressRecord) -> i64 {
    record.quizzes.values().map(|qp| qp.attempts as i64).sum()
}

fn assignment_attempts(record: &ProgressRecord) -> i64 {
    record.assignments.values().map(|ap| ap.attempts as i64).sum()
}
