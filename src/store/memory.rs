// src/store/memory.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tokio::sync::RwLock;

use super::{CatalogKind, CatalogStore, IdentityStore, ProgressStore};
use crate::{
    error::AppError,
    models::{
        assignment::{Assignment, CreateAssignmentRequest},
        pagination::PageRequest,
        quiz::{CreateQuizRequest, Quiz},
        stats::{ContentCounts, ContentStats, UserCounts},
        topic::{CatalogFilter, CreateTopicRequest, Topic},
        user::{User, UserChanges},
    },
    progress::{GradedResult, ProgressError, ProgressRecord, SubmissionResult, TopicEvent},
};

#[derive(Default)]
struct MemoryState {
    users: BTreeMap<i64, User>,
    topics: BTreeMap<i64, Topic>,
    quizzes: BTreeMap<i64, Quiz>,
    assignments: BTreeMap<i64, Assignment>,
    progress: BTreeMap<i64, ProgressRecord>,
    next_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// The user's record, created on first access.
    fn record_mut(
        &mut self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<&mut ProgressRecord, ProgressError> {
        if !self.users.contains_key(&user_id) {
            return Err(ProgressError::NotFound("User".to_string()));
        }
        Ok(self
            .progress
            .entry(user_id)
            .or_insert_with(|| ProgressRecord::new(user_id, now)))
    }
}

/// Process-local store used without `DATABASE_URL` and by the tests.
///
/// A single write lock serializes every mutation, so each merge is atomic
/// with respect to concurrent requests.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One page of an already filtered, ordered sequence, plus its total length.
fn page_of<T: Clone>(
    items: impl Iterator<Item = T>,
    page: PageRequest,
) -> (Vec<T>, u64) {
    let matching: Vec<T> = items.collect();
    let total = matching.len() as u64;
    (page.slice(&matching), total)
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AppError> {
        let mut state = self.state.write().await;

        if state.users.values().any(|u| u.username == username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                username
            )));
        }

        let id = state.next_id();
        let user = User {
            id,
            username: username.to_string(),
            password: password_hash.to_string(),
            role: role.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn list_users(&self, page: PageRequest) -> Result<(Vec<User>, u64), AppError> {
        let state = self.state.read().await;
        Ok(page_of(state.users.values().rev().cloned(), page))
    }

    async fn user_counts(&self) -> Result<UserCounts, AppError> {
        let state = self.state.read().await;
        Ok(UserCounts {
            total: state.users.len() as u64,
            active: state.users.values().filter(|u| u.is_active).count() as u64,
            admins: state.users.values().filter(|u| u.is_admin()).count() as u64,
        })
    }

    async fn update_user(&self, id: i64, changes: &UserChanges) -> Result<Option<User>, AppError> {
        let mut state = self.state.write().await;
        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(role) = &changes.role {
            user.role = role.clone();
        }
        if let Some(is_active) = changes.is_active {
            user.is_active = is_active;
        }
        if let Some(hash) = &changes.password_hash {
            user.password = hash.clone();
        }
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i64) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        state.progress.remove(&id);
        Ok(state.users.remove(&id).is_some())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn create_topic(&self, req: &CreateTopicRequest) -> Result<Topic, AppError> {
        let mut state = self.state.write().await;

        if state.topics.values().any(|t| t.slug == req.slug) {
            return Err(AppError::Conflict(format!(
                "Topic with slug '{}' already exists",
                req.slug
            )));
        }

        let id = state.next_id();
        let topic = Topic {
            id,
            slug: req.slug.clone(),
            title: req.title.clone(),
            description: req.description.clone(),
            category: req.category.clone(),
            difficulty: req.difficulty.clone(),
            content: req.content.clone(),
            estimated_minutes: req.estimated_minutes,
            sort_order: req.sort_order,
            is_published: req.is_published,
            created_at: Utc::now(),
        };
        state.topics.insert(id, topic.clone());
        Ok(topic)
    }

    async fn list_topics(
        &self,
        filter: &CatalogFilter,
        page: PageRequest,
    ) -> Result<(Vec<Topic>, u64), AppError> {
        let state = self.state.read().await;
        let mut topics: Vec<&Topic> = state
            .topics
            .values()
            .filter(|t| {
                filter.matches(&t.category, &t.difficulty, &t.title, &t.description, t.is_published)
            })
            .collect();
        topics.sort_by_key(|t| (t.sort_order, t.id));
        Ok(page_of(topics.into_iter().cloned(), page))
    }

    async fn find_topic_by_slug(&self, slug: &str) -> Result<Option<Topic>, AppError> {
        let state = self.state.read().await;
        Ok(state.topics.values().find(|t| t.slug == slug).cloned())
    }

    async fn update_topic(
        &self,
        id: i64,
        req: &CreateTopicRequest,
    ) -> Result<Option<Topic>, AppError> {
        let mut state = self.state.write().await;

        if state.topics.values().any(|t| t.slug == req.slug && t.id != id) {
            return Err(AppError::Conflict(format!(
                "Topic with slug '{}' already exists",
                req.slug
            )));
        }

        let Some(topic) = state.topics.get_mut(&id) else {
            return Ok(None);
        };
        topic.slug = req.slug.clone();
        topic.title = req.title.clone();
        topic.description = req.description.clone();
        topic.category = req.category.clone();
        topic.difficulty = req.difficulty.clone();
        topic.content = req.content.clone();
        topic.estimated_minutes = req.estimated_minutes;
        topic.sort_order = req.sort_order;
        topic.is_published = req.is_published;
        Ok(Some(topic.clone()))
    }

    async fn delete_topic(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.state.write().await.topics.remove(&id).is_some())
    }

    async fn create_quiz(&self, req: &CreateQuizRequest) -> Result<Quiz, AppError> {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let quiz = Quiz {
            id,
            title: req.title.clone(),
            description: req.description.clone(),
            category: req.category.clone(),
            difficulty: req.difficulty.clone(),
            questions: Json(req.questions.clone()),
            passing_score: req.passing_score,
            max_attempts: req.max_attempts,
            time_limit: req.time_limit,
            is_published: req.is_published,
            created_at: Utc::now(),
        };
        state.quizzes.insert(id, quiz.clone());
        Ok(quiz)
    }

    async fn list_quizzes(
        &self,
        filter: &CatalogFilter,
        page: PageRequest,
    ) -> Result<(Vec<Quiz>, u64), AppError> {
        let state = self.state.read().await;
        // ids grow with creation time, so reverse id order is newest first
        let quizzes = state.quizzes.values().rev().filter(|q| {
            filter.matches(&q.category, &q.difficulty, &q.title, &q.description, q.is_published)
        });
        Ok(page_of(quizzes.cloned(), page))
    }

    async fn find_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError> {
        Ok(self.state.read().await.quizzes.get(&id).cloned())
    }

    async fn update_quiz(
        &self,
        id: i64,
        req: &CreateQuizRequest,
    ) -> Result<Option<Quiz>, AppError> {
        let mut state = self.state.write().await;
        let Some(quiz) = state.quizzes.get_mut(&id) else {
            return Ok(None);
        };
        quiz.title = req.title.clone();
        quiz.description = req.description.clone();
        quiz.category = req.category.clone();
        quiz.difficulty = req.difficulty.clone();
        quiz.questions = Json(req.questions.clone());
        quiz.passing_score = req.passing_score;
        quiz.max_attempts = req.max_attempts;
        quiz.time_limit = req.time_limit;
        quiz.is_published = req.is_published;
        Ok(Some(quiz.clone()))
    }

    async fn delete_quiz(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.state.write().await.quizzes.remove(&id).is_some())
    }

    async fn create_assignment(
        &self,
        req: &CreateAssignmentRequest,
    ) -> Result<Assignment, AppError> {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let assignment = Assignment {
            id,
            title: req.title.clone(),
            description: req.description.clone(),
            problem_statement: req.problem_statement.clone(),
            difficulty: req.difficulty.clone(),
            category: req.category.clone(),
            points: req.points,
            is_published: req.is_published,
            created_at: Utc::now(),
        };
        state.assignments.insert(id, assignment.clone());
        Ok(assignment)
    }

    async fn list_assignments(
        &self,
        filter: &CatalogFilter,
        page: PageRequest,
    ) -> Result<(Vec<Assignment>, u64), AppError> {
        let state = self.state.read().await;
        let assignments = state.assignments.values().rev().filter(|a| {
            filter.matches(&a.category, &a.difficulty, &a.title, &a.description, a.is_published)
        });
        Ok(page_of(assignments.cloned(), page))
    }

    async fn find_assignment(&self, id: i64) -> Result<Option<Assignment>, AppError> {
        Ok(self.state.read().await.assignments.get(&id).cloned())
    }

    async fn update_assignment(
        &self,
        id: i64,
        req: &CreateAssignmentRequest,
    ) -> Result<Option<Assignment>, AppError> {
        let mut state = self.state.write().await;
        let Some(assignment) = state.assignments.get_mut(&id) else {
            return Ok(None);
        };
        assignment.title = req.title.clone();
        assignment.description = req.description.clone();
        assignment.problem_statement = req.problem_statement.clone();
        assignment.difficulty = req.difficulty.clone();
        assignment.category = req.category.clone();
        assignment.points = req.points;
        assignment.is_published = req.is_published;
        Ok(Some(assignment.clone()))
    }

    async fn delete_assignment(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.state.write().await.assignments.remove(&id).is_some())
    }

    async fn toggle_published(
        &self,
        kind: CatalogKind,
        id: i64,
    ) -> Result<Option<bool>, AppError> {
        let mut state = self.state.write().await;
        let flag = match kind {
            CatalogKind::Topic => state.topics.get_mut(&id).map(|t| &mut t.is_published),
            CatalogKind::Quiz => state.quizzes.get_mut(&id).map(|q| &mut q.is_published),
            CatalogKind::Assignment => {
                state.assignments.get_mut(&id).map(|a| &mut a.is_published)
            }
        };
        Ok(flag.map(|is_published| {
            *is_published = !*is_published;
            *is_published
        }))
    }

    async fn content_stats(&self) -> Result<ContentStats, AppError> {
        fn count<'a>(flags: impl Iterator<Item = &'a bool>) -> ContentCounts {
            let (published, draft) = flags.fold((0, 0), |(p, d), &is_published| {
                if is_published { (p + 1, d) } else { (p, d + 1) }
            });
            ContentCounts::new(published, draft)
        }

        let state = self.state.read().await;
        Ok(ContentStats {
            topics: count(state.topics.values().map(|t| &t.is_published)),
            quizzes: count(state.quizzes.values().map(|q| &q.is_published)),
            assignments: count(state.assignments.values().map(|a| &a.is_published)),
        })
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn load_progress(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, AppError> {
        let mut state = self.state.write().await;
        Ok(state.record_mut(user_id, now)?.clone())
    }

    async fn merge_topic_event(
        &self,
        user_id: i64,
        event: &TopicEvent,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, AppError> {
        let mut state = self.state.write().await;
        let record = state.record_mut(user_id, now)?;
        record.apply_topic_event(event, now)?;
        Ok(record.clone())
    }

    async fn merge_assignment_event(
        &self,
        user_id: i64,
        assignment_id: i64,
        result: &SubmissionResult,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, AppError> {
        let mut state = self.state.write().await;
        let record = state.record_mut(user_id, now)?;
        record.apply_assignment_event(assignment_id, result, now)?;
        Ok(record.clone())
    }

    async fn merge_quiz_event(
        &self,
        user_id: i64,
        graded: &GradedResult,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, AppError> {
        let mut state = self.state.write().await;
        let record = state.record_mut(user_id, now)?;
        record.apply_quiz_event(graded.quiz_id, graded, max_attempts, now)?;
        Ok(record.clone())
    }

    async fn list_progress_records(&self) -> Result<Vec<ProgressRecord>, AppError> {
        Ok(self.state.read().await.progress.values().cloned().collect())
    }
}
