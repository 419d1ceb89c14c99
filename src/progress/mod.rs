// src/progress/mod.rs

//! Progress tracking core: per-user aggregation, quiz grading, the
//! leaderboard and derived statistics. Nothing in here touches storage or
//! HTTP.

pub mod error;
pub mod grader;
pub mod ranker;
pub mod record;
pub mod stats;

pub use error::ProgressError;
pub use grader::{GradedResult, QuizDefinition, grade};
pub use ranker::{LeaderboardEntry, rank};
pub use record::{
    AssignmentProgress, AssignmentStatus, ProgressRecord, ProgressSummary, QuizProgress,
    QuizStatus, SubmissionResult, TopicEvent, TopicProgress, TopicStatus,
};
pub use stats::{EngagementStats, LearnerStats};
