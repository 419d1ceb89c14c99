// src/store/mod.rs

//! Storage collaborators behind the HTTP layer.
//!
//! `PgStore` backs production deployments; `MemoryStore` serves local runs
//! without `DATABASE_URL` and the integration tests. Progress merges are
//! atomic per call in both: Postgres through single-statement upserts, the
//! memory store through its write lock.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        assignment::{Assignment, CreateAssignmentRequest},
        pagination::PageRequest,
        quiz::{CreateQuizRequest, Quiz},
        stats::{ContentStats, UserCounts},
        topic::{CatalogFilter, CreateTopicRequest, Topic},
        user::{User, UserChanges},
    },
    progress::{GradedResult, ProgressRecord, SubmissionResult, TopicEvent},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Users and their credentials.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fails with `Conflict` when the username is taken.
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError>;

    /// One page of users, newest first, plus the total count.
    async fn list_users(&self, page: PageRequest) -> Result<(Vec<User>, u64), AppError>;

    async fn user_counts(&self) -> Result<UserCounts, AppError>;

    /// Returns `None` when the user does not exist.
    async fn update_user(&self, id: i64, changes: &UserChanges) -> Result<Option<User>, AppError>;

    /// Removes the user and their progress record.
    async fn delete_user(&self, id: i64) -> Result<bool, AppError>;
}

/// The three catalog tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Topic,
    Quiz,
    Assignment,
}

impl CatalogKind {
    pub fn table(&self) -> &'static str {
        match self {
            CatalogKind::Topic => "topics",
            CatalogKind::Quiz => "quizzes",
            CatalogKind::Assignment => "assignments",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CatalogKind::Topic => "Topic",
            CatalogKind::Quiz => "Quiz",
            CatalogKind::Assignment => "Assignment",
        }
    }
}

/// Topics, quizzes and assignments.
///
/// Updates replace every editable field and return `None` for unknown ids.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// `content` must already be sanitized. Fails with `Conflict` on a duplicate slug.
    async fn create_topic(&self, topic: &CreateTopicRequest) -> Result<Topic, AppError>;

    async fn list_topics(
        &self,
        filter: &CatalogFilter,
        page: PageRequest,
    ) -> Result<(Vec<Topic>, u64), AppError>;

    async fn find_topic_by_slug(&self, slug: &str) -> Result<Option<Topic>, AppError>;

    /// `content` must already be sanitized. Fails with `Conflict` when the
    /// new slug belongs to another topic.
    async fn update_topic(
        &self,
        id: i64,
        topic: &CreateTopicRequest,
    ) -> Result<Option<Topic>, AppError>;

    async fn delete_topic(&self, id: i64) -> Result<bool, AppError>;

    async fn create_quiz(&self, quiz: &CreateQuizRequest) -> Result<Quiz, AppError>;

    async fn list_quizzes(
        &self,
        filter: &CatalogFilter,
        page: PageRequest,
    ) -> Result<(Vec<Quiz>, u64), AppError>;

    async fn find_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError>;

    async fn update_quiz(&self, id: i64, quiz: &CreateQuizRequest)
    -> Result<Option<Quiz>, AppError>;

    async fn delete_quiz(&self, id: i64) -> Result<bool, AppError>;

    async fn create_assignment(
        &self,
        assignment: &CreateAssignmentRequest,
    ) -> Result<Assignment, AppError>;

    async fn list_assignments(
        &self,
        filter: &CatalogFilter,
        page: PageRequest,
    ) -> Result<(Vec<Assignment>, u64), AppError>;

    async fn find_assignment(&self, id: i64) -> Result<Option<Assignment>, AppError>;

    async fn update_assignment(
        &self,
        id: i64,
        assignment: &CreateAssignmentRequest,
    ) -> Result<Option<Assignment>, AppError>;

    async fn delete_assignment(&self, id: i64) -> Result<bool, AppError>;

    /// Flips `is_published` and returns the new value.
    async fn toggle_published(&self, kind: CatalogKind, id: i64)
    -> Result<Option<bool>, AppError>;

    /// Published and draft counts per kind.
    async fn content_stats(&self) -> Result<ContentStats, AppError>;
}

/// Per-user progress records.
///
/// Every merge is applied as one atomic step keyed by `(user_id, item_id)`
/// and returns the record as it stands after the write.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Fetches the user's record, creating an empty one on first access.
    async fn load_progress(&self, user_id: i64, now: DateTime<Utc>)
    -> Result<ProgressRecord, AppError>;

    async fn merge_topic_event(
        &self,
        user_id: i64,
        event: &TopicEvent,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, AppError>;

    async fn merge_assignment_event(
        &self,
        user_id: i64,
        assignment_id: i64,
        result: &SubmissionResult,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, AppError>;

    /// Fails with `TooManyAttempts` (and changes nothing) once `max_attempts`
    /// attempts are on record.
    async fn merge_quiz_event(
        &self,
        user_id: i64,
        graded: &GradedResult,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, AppError>;

    async fn list_progress_records(&self) -> Result<Vec<ProgressRecord>, AppError>;
}

/// Everything the handlers need from storage.
pub trait Store: IdentityStore + CatalogStore + ProgressStore {}

impl<T> Store for T where T: IdentityStore + CatalogStore + ProgressStore {}

pub type DynStore = Arc<dyn Store>;
