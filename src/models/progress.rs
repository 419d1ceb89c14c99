// src/models/progress.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::progress::{ProgressRecord, ProgressSummary, TopicEvent, TopicStatus};

/// Progress record plus its derived counters.
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    #[serde(flatten)]
    pub record: ProgressRecord,
    #[serde(flatten)]
    pub summary: ProgressSummary,
}

impl From<ProgressRecord> for ProgressResponse {
    fn from(record: ProgressRecord) -> Self {
        let summary = record.summary();
        Self { record, summary }
    }
}

/// DTO for `POST /progress/topic`.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTopicProgressRequest {
    #[validate(range(min = 1))]
    pub topic_id: i64,
    pub status: TopicStatus,
    #[validate(range(min = 0, message = "Time spent must be non-negative"))]
    #[serde(default)]
    pub time_spent: i64,
}

impl From<UpdateTopicProgressRequest> for TopicEvent {
    fn from(req: UpdateTopicProgressRequest) -> Self {
        TopicEvent {
            topic_id: req.topic_id,
            status: req.status,
            time_spent: req.time_spent,
        }
    }
}

/// A ranked leaderboard row as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardRow {
    /// 1-based position across all pages.
    pub rank: u64,
    pub user_id: i64,
    pub username: String,
    pub overall_score: i64,
    pub completion_percentage: u32,
}
