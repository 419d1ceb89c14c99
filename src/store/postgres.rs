// src/store/postgres.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, postgres::PgRow, types::Json};

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
    progress::{
        AssignmentProgress, GradedResult, ProgressError, ProgressRecord, QuizProgress,
        SubmissionResult, TopicEvent, TopicProgress, TopicStatus,
    },
};

const USER_COLUMNS: &str = "id, username, password, role, is_active, created_at";
const TOPIC_COLUMNS: &str = "id, slug, title, description, category, difficulty, content, \
     estimated_minutes, sort_order, is_published, created_at";
const QUIZ_COLUMNS: &str = "id, title, description, category, difficulty, questions, \
     passing_score, max_attempts, time_limit, is_published, created_at";
const ASSIGNMENT_COLUMNS: &str = "id, title, description, problem_statement, difficulty, \
     category, points, is_published, created_at";

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the migrations under `./migrations`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn list_catalog<T>(
        &self,
        table: &str,
        columns: &str,
        order_by: &str,
        filter: &CatalogFilter,
        page: PageRequest,
    ) -> Result<(Vec<T>, u64), AppError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {columns} FROM {table}"));
        push_catalog_filter(&mut query, filter);
        query.push(format!(" ORDER BY {order_by} LIMIT "));
        query.push_bind(page.limit as i64);
        query.push(" OFFSET ");
        query.push_bind(page.offset() as i64);

        let items = query
            .build_query_as::<T>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list {}: {:?}", table, e);
                AppError::from(e)
            })?;

        let mut count = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {table}"));
        push_catalog_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok((items, total.max(0) as u64))
    }

    async fn delete_by_id(&self, table: &str, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete from {}: {:?}", table, e);
                AppError::from(e)
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Reads a user's record. The head row must exist.
    async fn fetch_record(&self, user_id: i64) -> Result<ProgressRecord, AppError> {
        let head = sqlx::query_as::<_, ProgressRow>(
            "SELECT user_id, last_activity_at, created_at FROM progress WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Progress record not found".to_string()))?;

        let mut record = head.into_record();

        let topics = sqlx::query_as::<_, TopicProgressRow>(
            "SELECT user_id, topic_id, status, time_spent_seconds, last_accessed_at, completed_at \
             FROM topic_progress WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        for row in topics {
            let (id, entry) = row.into_entry()?;
            record.topics.insert(id, entry);
        }

        let assignments = sqlx::query_as::<_, AssignmentProgressRow>(
            "SELECT user_id, assignment_id, status, best_score, max_score, attempts, \
             last_attempt_at, completed_at FROM assignment_progress WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        for row in assignments {
            let (id, entry) = row.into_entry()?;
            record.assignments.insert(id, entry);
        }

        let quizzes = sqlx::query_as::<_, QuizProgressRow>(
            "SELECT user_id, quiz_id, status, best_score, max_score, percentage, attempts, \
             max_attempts, completed_at FROM quiz_progress WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        for row in quizzes {
            let (id, entry) = row.into_entry()?;
            record.quizzes.insert(id, entry);
        }

        Ok(record)
    }
}

/// Appends `WHERE ...` for the shared catalog columns.
fn push_catalog_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &CatalogFilter) {
    query.push(" WHERE TRUE");

    if !filter.include_unpublished {
        query.push(" AND is_published");
    }

    if let Some(category) = &filter.category {
        query.push(" AND category = ");
        query.push_bind(category.clone());
    }

    if let Some(difficulty) = &filter.difficulty {
        query.push(" AND difficulty = ");
        query.push_bind(difficulty.clone());
    }

    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        query.push(" AND (title ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" ESCAPE '\\' OR description ILIKE ");
        query.push_bind(pattern);
        query.push(" ESCAPE '\\')");
    }
}

/// Escapes `LIKE` wildcards so a search term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation())
}

/// Creates the head row or bumps its activity timestamp.
async fn touch_progress(
    conn: &mut sqlx::PgConnection,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO progress (user_id, last_activity_at, created_at)
        VALUES ($1, $2, $2)
        ON CONFLICT (user_id) DO UPDATE SET last_activity_at = EXCLUDED.last_activity_at
        "#,
    )
    .bind(user_id)
    .bind(now)
    .execute(conn)
    .await
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            AppError::from(ProgressError::NotFound("User".to_string()))
        } else {
            AppError::from(e)
        }
    })?;
    Ok(())
}

#[derive(FromRow)]
struct ProgressRow {
    user_id: i64,
    last_activity_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl ProgressRow {
    fn into_record(self) -> ProgressRecord {
        let mut record = ProgressRecord::new(self.user_id, self.created_at);
        record.last_activity_at = self.last_activity_at;
        record
    }
}

#[derive(FromRow)]
struct TopicProgressRow {
    user_id: i64,
    topic_id: i64,
    status: String,
    time_spent_seconds: i64,
    last_accessed_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TopicProgressRow {
    fn into_entry(self) -> Result<(i64, TopicProgress), AppError> {
        let status = self
            .status
            .parse()
            .map_err(|e: ProgressError| AppError::InternalServerError(e.to_string()))?;
        Ok((
            self.topic_id,
            TopicProgress {
                status,
                time_spent_seconds: self.time_spent_seconds,
                last_accessed_at: self.last_accessed_at,
                completed_at: self.completed_at,
            },
        ))
    }
}

#[derive(FromRow)]
struct AssignmentProgressRow {
    user_id: i64,
    assignment_id: i64,
    status: String,
    best_score: i64,
    max_score: i64,
    attempts: i32,
    last_attempt_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl AssignmentProgressRow {
    fn into_entry(self) -> Result<(i64, AssignmentProgress), AppError> {
        let status = self
            .status
            .parse()
            .map_err(|e: ProgressError| AppError::InternalServerError(e.to_string()))?;
        Ok((
            self.assignment_id,
            AssignmentProgress {
                status,
                best_score: self.best_score,
                max_score: self.max_score,
                attempts: self.attempts,
                last_attempt_at: self.last_attempt_at,
                completed_at: self.completed_at,
            },
        ))
    }
}

#[derive(FromRow)]
struct QuizProgressRow {
    user_id: i64,
    quiz_id: i64,
    status: String,
    best_score: i64,
    max_score: i64,
    percentage: i32,
    attempts: i32,
    max_attempts: i32,
    completed_at: Option<DateTime<Utc>>,
}

impl QuizProgressRow {
    fn into_entry(self) -> Result<(i64, QuizProgress), AppError> {
        let status = self
            .status
            .parse()
            .map_err(|e: ProgressError| AppError::InternalServerError(e.to_string()))?;
        Ok((
            self.quiz_id,
            QuizProgress {
                status,
                best_score: self.best_score,
                max_score: self.max_score,
                percentage: self.percentage,
                attempts: self.attempts,
                max_attempts: self.max_attempts,
                completed_at: self.completed_at,
            },
        ))
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, password, role) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Username '{}' already exists", username))
            } else {
                tracing::error!("Failed to create user: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self, page: PageRequest) -> Result<(Vec<User>, u64), AppError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list users: {:?}", e);
            AppError::from(e)
        })?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok((users, total.max(0) as u64))
    }

    async fn user_counts(&self) -> Result<UserCounts, AppError> {
        let (total, active, admins): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE is_active),
                COUNT(*) FILTER (WHERE role = 'admin')
            FROM users
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(UserCounts {
            total: total.max(0) as u64,
            active: active.max(0) as u64,
            admins: admins.max(0) as u64,
        })
    }

    async fn update_user(&self, id: i64, changes: &UserChanges) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                role = COALESCE($2, role),
                is_active = COALESCE($3, is_active),
                password = COALESCE($4, password)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.role.as_deref())
        .bind(changes.is_active)
        .bind(changes.password_hash.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update user {}: {:?}", id, e);
            AppError::from(e)
        })?;
        Ok(user)
    }

    async fn delete_user(&self, id: i64) -> Result<bool, AppError> {
        // progress rows cascade
        self.delete_by_id("users", id).await
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn create_topic(&self, topic: &CreateTopicRequest) -> Result<Topic, AppError> {
        sqlx::query_as::<_, Topic>(&format!(
            r#"
            INSERT INTO topics
            (slug, title, description, category, difficulty, content, estimated_minutes, sort_order, is_published)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {TOPIC_COLUMNS}
            "#
        ))
        .bind(&topic.slug)
        .bind(&topic.title)
        .bind(&topic.description)
        .bind(&topic.category)
        .bind(&topic.difficulty)
        .bind(&topic.content)
        .bind(topic.estimated_minutes)
        .bind(topic.sort_order)
        .bind(topic.is_published)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Topic with slug '{}' already exists", topic.slug))
            } else {
                tracing::error!("Failed to create topic: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn list_topics(
        &self,
        filter: &CatalogFilter,
        page: PageRequest,
    ) -> Result<(Vec<Topic>, u64), AppError> {
        self.list_catalog("topics", TOPIC_COLUMNS, "sort_order ASC, id ASC", filter, page)
            .await
    }

    async fn find_topic_by_slug(&self, slug: &str) -> Result<Option<Topic>, AppError> {
        let topic = sqlx::query_as::<_, Topic>(&format!(
            "SELECT {TOPIC_COLUMNS} FROM topics WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(topic)
    }

    async fn update_topic(
        &self,
        id: i64,
        topic: &CreateTopicRequest,
    ) -> Result<Option<Topic>, AppError> {
        sqlx::query_as::<_, Topic>(&format!(
            r#"
            UPDATE topics SET
                slug = $2, title = $3, description = $4, category = $5, difficulty = $6,
                content = $7, estimated_minutes = $8, sort_order = $9, is_published = $10
            WHERE id = $1
            RETURNING {TOPIC_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&topic.slug)
        .bind(&topic.title)
        .bind(&topic.description)
        .bind(&topic.category)
        .bind(&topic.difficulty)
        .bind(&topic.content)
        .bind(topic.estimated_minutes)
        .bind(topic.sort_order)
        .bind(topic.is_published)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Topic with slug '{}' already exists", topic.slug))
            } else {
                tracing::error!("Failed to update topic {}: {:?}", id, e);
                AppError::from(e)
            }
        })
    }

    async fn delete_topic(&self, id: i64) -> Result<bool, AppError> {
        self.delete_by_id("topics", id).await
    }

    async fn create_quiz(&self, quiz: &CreateQuizRequest) -> Result<Quiz, AppError> {
        sqlx::query_as::<_, Quiz>(&format!(
            r#"
            INSERT INTO quizzes
            (title, description, category, difficulty, questions, passing_score, max_attempts, time_limit, is_published)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {QUIZ_COLUMNS}
            "#
        ))
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(&quiz.category)
        .bind(&quiz.difficulty)
        .bind(Json(&quiz.questions))
        .bind(quiz.passing_score)
        .bind(quiz.max_attempts)
        .bind(quiz.time_limit)
        .bind(quiz.is_published)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create quiz: {:?}", e);
            AppError::from(e)
        })
    }

    async fn list_quizzes(
        &self,
        filter: &CatalogFilter,
        page: PageRequest,
    ) -> Result<(Vec<Quiz>, u64), AppError> {
        self.list_catalog("quizzes", QUIZ_COLUMNS, "created_at DESC, id DESC", filter, page)
            .await
    }

    async fn find_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError> {
        let quiz = sqlx::query_as::<_, Quiz>(&format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(quiz)
    }

    async fn update_quiz(
        &self,
        id: i64,
        quiz: &CreateQuizRequest,
    ) -> Result<Option<Quiz>, AppError> {
        sqlx::query_as::<_, Quiz>(&format!(
            r#"
            UPDATE quizzes SET
                title = $2, description = $3, category = $4, difficulty = $5, questions = $6,
                passing_score = $7, max_attempts = $8, time_limit = $9, is_published = $10
            WHERE id = $1
            RETURNING {QUIZ_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(&quiz.category)
        .bind(&quiz.difficulty)
        .bind(Json(&quiz.questions))
        .bind(quiz.passing_score)
        .bind(quiz.max_attempts)
        .bind(quiz.time_limit)
        .bind(quiz.is_published)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update quiz {}: {:?}", id, e);
            AppError::from(e)
        })
    }

    async fn delete_quiz(&self, id: i64) -> Result<bool, AppError> {
        self.delete_by_id("quizzes", id).await
    }

    async fn create_assignment(
        &self,
        assignment: &CreateAssignmentRequest,
    ) -> Result<Assignment, AppError> {
        sqlx::query_as::<_, Assignment>(&format!(
            r#"
            INSERT INTO assignments
            (title, description, problem_statement, difficulty, category, points, is_published)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ASSIGNMENT_COLUMNS}
            "#
        ))
        .bind(&assignment.title)
        .bind(&assignment.description)
        .bind(&assignment.problem_statement)
        .bind(&assignment.difficulty)
        .bind(&assignment.category)
        .bind(assignment.points)
        .bind(assignment.is_published)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create assignment: {:?}", e);
            AppError::from(e)
        })
    }

    async fn list_assignments(
        &self,
        filter: &CatalogFilter,
        page: PageRequest,
    ) -> Result<(Vec<Assignment>, u64), AppError> {
        self.list_catalog(
            "assignments",
            ASSIGNMENT_COLUMNS,
            "created_at DESC, id DESC",
            filter,
            page,
        )
        .await
    }

    async fn find_assignment(&self, id: i64) -> Result<Option<Assignment>, AppError> {
        let assignment = sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(assignment)
    }

    async fn update_assignment(
        &self,
        id: i64,
        assignment: &CreateAssignmentRequest,
    ) -> Result<Option<Assignment>, AppError> {
        sqlx::query_as::<_, Assignment>(&format!(
            r#"
            UPDATE assignments SET
                title = $2, description = $3, problem_statement = $4, difficulty = $5,
                category = $6, points = $7, is_published = $8
            WHERE id = $1
            RETURNING {ASSIGNMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&assignment.title)
        .bind(&assignment.description)
        .bind(&assignment.problem_statement)
        .bind(&assignment.difficulty)
        .bind(&assignment.category)
        .bind(assignment.points)
        .bind(assignment.is_published)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update assignment {}: {:?}", id, e);
            AppError::from(e)
        })
    }

    async fn delete_assignment(&self, id: i64) -> Result<bool, AppError> {
        self.delete_by_id("assignments", id).await
    }

    async fn toggle_published(
        &self,
        kind: CatalogKind,
        id: i64,
    ) -> Result<Option<bool>, AppError> {
        let is_published = sqlx::query_scalar(&format!(
            "UPDATE {} SET is_published = NOT is_published WHERE id = $1 RETURNING is_published",
            kind.table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to toggle {} {}: {:?}", kind.table(), id, e);
            AppError::from(e)
        })?;
        Ok(is_published)
    }

    async fn content_stats(&self) -> Result<ContentStats, AppError> {
        let mut counts = [ContentCounts::default(); 3];
        let kinds = [CatalogKind::Topic, CatalogKind::Quiz, CatalogKind::Assignment];

        for (slot, kind) in counts.iter_mut().zip(kinds) {
            let (published, draft): (i64, i64) = sqlx::query_as(&format!(
                "SELECT COUNT(*) FILTER (WHERE is_published), \
                 COUNT(*) FILTER (WHERE NOT is_published) FROM {}",
                kind.table()
            ))
            .fetch_one(&self.pool)
            .await?;
            *slot = ContentCounts::new(published.max(0) as u64, draft.max(0) as u64);
        }

        let [topics, quizzes, assignments] = counts;
        Ok(ContentStats {
            topics,
            quizzes,
            assignments,
        })
    }
}

#[async_trait]
impl ProgressStore for PgStore {
    async fn load_progress(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, AppError> {
        sqlx::query(
            r#"
            INSERT INTO progress (user_id, last_activity_at, created_at)
            VALUES ($1, $2, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::from(ProgressError::NotFound("User".to_string()))
            } else {
                AppError::from(e)
            }
        })?;

        self.fetch_record(user_id).await
    }

    async fn merge_topic_event(
        &self,
        user_id: i64,
        event: &TopicEvent,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, AppError> {
        event.validate()?;
        let completed_at = (event.status == TopicStatus::Completed).then_some(now);

        let mut tx = self.pool.begin().await?;
        touch_progress(&mut *tx, user_id, now).await?;

        sqlx::query(
            r#"
            INSERT INTO topic_progress
            (user_id, topic_id, status, time_spent_seconds, last_accessed_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, topic_id) DO UPDATE SET
                status = EXCLUDED.status,
                time_spent_seconds = topic_progress.time_spent_seconds + EXCLUDED.time_spent_seconds,
                last_accessed_at = EXCLUDED.last_accessed_at,
                completed_at = COALESCE(topic_progress.completed_at, EXCLUDED.completed_at)
            "#,
        )
        .bind(user_id)
        .bind(event.topic_id)
        .bind(event.status.as_str())
        .bind(event.time_spent)
        .bind(now)
        .bind(completed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to merge topic progress: {:?}", e);
            AppError::from(e)
        })?;

        tx.commit().await?;
        self.fetch_record(user_id).await
    }

    async fn merge_assignment_event(
        &self,
        user_id: i64,
        assignment_id: i64,
        result: &SubmissionResult,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, AppError> {
        result.validate()?;
        let (status, completed_at) = if result.is_complete() {
            ("completed", Some(now))
        } else {
            ("submitted", None)
        };

        let mut tx = self.pool.begin().await?;
        touch_progress(&mut *tx, user_id, now).await?;

        sqlx::query(
            r#"
            INSERT INTO assignment_progress
            (user_id, assignment_id, status, best_score, max_score, attempts, last_attempt_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, 1, $6, $7)
            ON CONFLICT (user_id, assignment_id) DO UPDATE SET
                attempts = assignment_progress.attempts + 1,
                best_score = GREATEST(assignment_progress.best_score, EXCLUDED.best_score),
                max_score = EXCLUDED.max_score,
                last_attempt_at = EXCLUDED.last_attempt_at,
                status = EXCLUDED.status,
                completed_at = COALESCE(assignment_progress.completed_at, EXCLUDED.completed_at)
            "#,
        )
        .bind(user_id)
        .bind(assignment_id)
        .bind(status)
        .bind(result.score_earned)
        .bind(result.max_score)
        .bind(now)
        .bind(completed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to merge assignment progress: {:?}", e);
            AppError::from(e)
        })?;

        tx.commit().await?;
        self.fetch_record(user_id).await
    }

    async fn merge_quiz_event(
        &self,
        user_id: i64,
        graded: &GradedResult,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, AppError> {
        if graded.score < 0 || graded.max_score < 0 {
            return Err(ProgressError::Validation("Scores must be non-negative".to_string()).into());
        }
        let (status, completed_at) = if graded.passed {
            ("completed", Some(now))
        } else {
            ("in-progress", None)
        };

        let mut tx = self.pool.begin().await?;
        touch_progress(&mut *tx, user_id, now).await?;

        // The limit check and the increment are one statement: when the
        // WHERE clause fails nothing is updated and no row comes back.
        let attempts: Option<i32> = sqlx::query_scalar(
            r#"
            INSERT INTO quiz_progress
            (user_id, quiz_id, status, best_score, max_score, percentage, attempts, max_attempts, completed_at)
            VALUES ($1, $2, $3, $4, $5, LEAST(100, $6), 1, $7, $8)
            ON CONFLICT (user_id, quiz_id) DO UPDATE SET
                attempts = quiz_progress.attempts + 1,
                max_attempts = EXCLUDED.max_attempts,
                max_score = EXCLUDED.max_score,
                best_score = GREATEST(quiz_progress.best_score, EXCLUDED.best_score),
                percentage = CASE WHEN EXCLUDED.max_score > 0
                    THEN LEAST(100, ROUND(100.0 * GREATEST(quiz_progress.best_score, EXCLUDED.best_score) / EXCLUDED.max_score)::INT)
                    ELSE 0 END,
                status = CASE
                    WHEN EXCLUDED.status = 'completed' OR quiz_progress.status = 'completed'
                    THEN 'completed' ELSE 'in-progress' END,
                completed_at = COALESCE(quiz_progress.completed_at, EXCLUDED.completed_at)
            WHERE EXCLUDED.max_attempts = 0 OR quiz_progress.attempts < EXCLUDED.max_attempts
            RETURNING attempts
            "#,
        )
        .bind(user_id)
        .bind(graded.quiz_id)
        .bind(status)
        .bind(graded.score)
        .bind(graded.max_score)
        .bind(graded.percentage)
        .bind(max_attempts)
        .bind(completed_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to merge quiz progress: {:?}", e);
            AppError::from(e)
        })?;

        if attempts.is_none() {
            // dropping the transaction rolls back the activity bump
            return Err(ProgressError::AttemptsExceeded {
                quiz_id: graded.quiz_id,
                max_attempts,
            }
            .into());
        }

        tx.commit().await?;
        self.fetch_record(user_id).await
    }

    async fn list_progress_records(&self) -> Result<Vec<ProgressRecord>, AppError> {
        let heads = sqlx::query_as::<_, ProgressRow>(
            "SELECT user_id, last_activity_at, created_at FROM progress",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut records: BTreeMap<i64, ProgressRecord> = heads
            .into_iter()
            .map(|head| (head.user_id, head.into_record()))
            .collect();

        let topics = sqlx::query_as::<_, TopicProgressRow>(
            "SELECT user_id, topic_id, status, time_spent_seconds, last_accessed_at, completed_at \
             FROM topic_progress",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in topics {
            let user_id = row.user_id;
            let (id, entry) = row.into_entry()?;
            if let Some(record) = records.get_mut(&user_id) {
                record.topics.insert(id, entry);
            }
        }

        let assignments = sqlx::query_as::<_, AssignmentProgressRow>(
            "SELECT user_id, assignment_id, status, best_score, max_score, attempts, \
             last_attempt_at, completed_at FROM assignment_progress",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in assignments {
            let user_id = row.user_id;
            let (id, entry) = row.into_entry()?;
            if let Some(record) = records.get_mut(&user_id) {
                record.assignments.insert(id, entry);
            }
        }

        let quizzes = sqlx::query_as::<_, QuizProgressRow>(
            "SELECT user_id, quiz_id, status, best_score, max_score, percentage, attempts, \
             max_attempts, completed_at FROM quiz_progress",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in quizzes {
            let user_id = row.user_id;
            let (id, entry) = row.into_entry()?;
            if let Some(record) = records.get_mut(&user_id) {
                record.quizzes.insert(id, entry);
            }
        }

        Ok(records.into_values().collect())
    }
}
