// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        assignment::CreateAssignmentRequest,
        pagination::{PageParams, PageRequest, Paginated},
        quiz::CreateQuizRequest,
        stats::DashboardStats,
        topic::{CatalogFilter, CatalogParams, CreateTopicRequest},
        user::{UpdateUserRequest, UserChanges},
    },
    progress::EngagementStats,
    store::{CatalogKind, DynStore},
    utils::{hash::hash_password, html::clean_html, jwt::Claims},
};

/// Admin catalog lists see drafts too.
fn admin_scope(params: &CatalogParams) -> (CatalogFilter, PageRequest) {
    let filter = CatalogFilter {
        include_unpublished: true,
        ..CatalogFilter::from(params)
    };
    let page = PageParams {
        page: params.page,
        limit: params.limit,
    }
    .resolve();
    (filter, page)
}

/// Lists all users in the system, newest first.
/// Admin only.
pub async fn list_users(
    State(store): State<DynStore>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.resolve();

    let (users, total) = store.list_users(page).await.map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        e
    })?;

    Ok(Json(Paginated::new(users, page, total)))
}

/// Changes a user's role, active flag or password.
/// Admin only. Admins cannot demote or deactivate themselves.
pub async fn update_user(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if id == claims.user_id()? && (payload.role.is_some() || payload.is_active == Some(false)) {
        return Err(AppError::BadRequest(
            "Cannot change your own role or status".to_string(),
        ));
    }

    let password_hash = payload
        .password
        .as_deref()
        .map(hash_password)
        .transpose()?;

    let changes = UserChanges {
        role: payload.role,
        is_active: payload.is_active,
        password_hash,
    };

    let user = store
        .update_user(id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tracing::info!("Admin {} updated user {}", claims.sub, id);

    Ok(Json(user))
}

/// Deletes a user and their progress.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id()? {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    if !store.delete_user(id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!("Admin {} deleted user {}", claims.sub, id);

    Ok(StatusCode::NO_CONTENT)
}

/// Lists every topic, published or not.
/// Admin only.
pub async fn list_all_topics(
    State(store): State<DynStore>,
    Query(params): Query<CatalogParams>,
) -> Result<impl IntoResponse, AppError> {
    let (filter, page) = admin_scope(&params);
    let (topics, total) = store.list_topics(&filter, page).await?;
    Ok(Json(Paginated::new(topics, page, total)))
}

/// Lists every quiz with its answer keys.
/// Admin only.
pub async fn list_all_quizzes(
    State(store): State<DynStore>,
    Query(params): Query<CatalogParams>,
) -> Result<impl IntoResponse, AppError> {
    let (filter, page) = admin_scope(&params);
    let (quizzes, total) = store.list_quizzes(&filter, page).await?;
    Ok(Json(Paginated::new(quizzes, page, total)))
}

pub async fn list_all_assignments(
    State(store): State<DynStore>,
    Query(params): Query<CatalogParams>,
) -> Result<impl IntoResponse, AppError> {
    let (filter, page) = admin_scope(&params);
    let (assignments, total) = store.list_assignments(&filter, page).await?;
    Ok(Json(Paginated::new(assignments, page, total)))
}

/// Creates a topic. The lesson HTML is sanitized before it is stored.
/// Admin only.
pub async fn create_topic(
    State(store): State<DynStore>,
    Json(mut payload): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    payload.content = clean_html(&payload.content);

    let topic = store.create_topic(&payload).await?;
    tracing::info!("Created topic {} ({})", topic.slug, topic.id);

    Ok((StatusCode::CREATED, Json(topic)))
}

/// Replaces a topic's fields. The lesson HTML is sanitized again.
/// Admin only.
pub async fn update_topic(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
    Json(mut payload): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    payload.content = clean_html(&payload.content);

    let topic = store
        .update_topic(id, &payload)
        .await?
        .ok_or_else(|| AppError::NotFound("Topic not found".to_string()))?;
    tracing::info!("Updated topic {} ({})", topic.slug, topic.id);

    Ok(Json(topic))
}

pub async fn delete_topic(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete_topic(id).await? {
        return Err(AppError::NotFound("Topic not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Creates a quiz with its answer keys.
/// Admin only.
pub async fn create_quiz(
    State(store): State<DynStore>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let quiz = store.create_quiz(&payload).await?;
    tracing::info!("Created quiz {} ({} questions)", quiz.id, quiz.questions.len());

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Replaces a quiz, answer keys included. Progress already recorded keeps
/// its scores; later attempts use the new questions and limits.
/// Admin only.
pub async fn update_quiz(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let quiz = store
        .update_quiz(id, &payload)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;
    tracing::info!("Updated quiz {} ({} questions)", quiz.id, quiz.questions.len());

    Ok(Json(quiz))
}

pub async fn delete_quiz(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete_quiz(id).await? {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_assignment(
    State(store): State<DynStore>,
    Json(payload): Json<CreateAssignmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let assignment = store.create_assignment(&payload).await?;
    tracing::info!("Created assignment {}", assignment.id);

    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn update_assignment(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateAssignmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let assignment = store
        .update_assignment(id, &payload)
        .await?
        .ok_or_else(|| AppError::NotFound("Assignment not found".to_string()))?;
    tracing::info!("Updated assignment {}", assignment.id);

    Ok(Json(assignment))
}

pub async fn delete_assignment(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete_assignment(id).await? {
        return Err(AppError::NotFound("Assignment not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_published(
    store: &DynStore,
    kind: CatalogKind,
    id: i64,
) -> Result<Json<Value>, AppError> {
    let is_published = store
        .toggle_published(kind, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} not found", kind.label())))?;

    tracing::info!(
        "{} {} is now {}",
        kind.label(),
        id,
        if is_published { "published" } else { "a draft" }
    );

    Ok(Json(json!({ "id": id, "is_published": is_published })))
}

/// Flips a topic between draft and published.
/// Admin only.
pub async fn toggle_topic_published(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    toggle_published(&store, CatalogKind::Topic, id).await
}

pub async fn toggle_quiz_published(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    toggle_published(&store, CatalogKind::Quiz, id).await
}

pub async fn toggle_assignment_published(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    toggle_published(&store, CatalogKind::Assignment, id).await
}

/// Account, catalog and learner totals in one response.
/// Admin only.
pub async fn dashboard(State(store): State<DynStore>) -> Result<impl IntoResponse, AppError> {
    let users = store.user_counts().await?;
    let content = store.content_stats().await?;
    let records = store.list_progress_records().await.map_err(|e| {
        tracing::error!("Failed to load progress records: {:?}", e);
        e
    })?;

    Ok(Json(DashboardStats {
        users,
        content,
        engagement: EngagementStats::compute(&records, Utc::now()),
    }))
}

pub async fn content_stats(State(store): State<DynStore>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.content_stats().await?))
}

/// Learner activity across all progress records.
/// Admin only.
pub async fn engagement_stats(
    State(store): State<DynStore>,
) -> Result<impl IntoResponse, AppError> {
    let records = store.list_progress_records().await?;
    Ok(Json(EngagementStats::compute(&records, Utc::now())))
}
