// src/models/stats.rs

use serde::Serialize;

use crate::progress::EngagementStats;

/// Published and draft counts for one catalog kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContentCounts {
    pub published: u64,
    pub draft: u64,
    pub total: u64,
}

impl ContentCounts {
    pub fn new(published: u64, draft: u64) -> Self {
        Self {
            published,
            draft,
            total: published + draft,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContentStats {
    pub topics: ContentCounts,
    pub quizzes: ContentCounts,
    pub assignments: ContentCounts,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserCounts {
    pub total: u64,
    pub active: u64,
    pub admins: u64,
}

/// `GET /admin/dashboard` body.
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub users: UserCounts,
    pub content: ContentStats,
    pub engagement: EngagementStats,
}
