// src/progress/ranker.rs

use std::cmp::Reverse;

use serde::Serialize;

use super::record::ProgressRecord;

/// One leaderboard row, derived fresh from a progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub overall_score: i64,
    pub completion_percentage: u32,
}

impl From<&ProgressRecord> for LeaderboardEntry {
    fn from(record: &ProgressRecord) -> Self {
        Self {
            user_id: record.user_id,
            overall_score: record.overall_score(),
            completion_percentage: record.completion_percentage(),
        }
    }
}

/// Ranks users by overall score, then completion percentage (both
/// descending), then user id ascending.
///
/// The whole input is scanned on every call; callers paginate the result.
pub fn rank<'a, I>(records: I) -> Vec<LeaderboardEntry>
where
    I: IntoIterator<Item = &'a ProgressRecord>,
{
    let mut entries: Vec<LeaderboardEntry> =
        records.into_iter().map(LeaderboardEntry::from).collect();
    entries.sort_by_key(|e| {
        (
            Reverse(e.overall_score),
            Reverse(e.completion_percentage),
            e.user_id,
        )
    });
    entries
}
