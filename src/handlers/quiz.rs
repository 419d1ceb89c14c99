// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::current_user,
    models::{
        pagination::{PageParams, Paginated},
        quiz::{PublicQuiz, Quiz, SubmitQuizRequest},
        topic::{CatalogFilter, CatalogParams},
    },
    progress::grade,
    store::DynStore,
    utils::jwt::Claims,
};

async fn published_quiz(store: &DynStore, id: i64) -> Result<Quiz, AppError> {
    store
        .find_quiz(id)
        .await?
        .filter(|q| q.is_published)
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
}

/// Lists published quizzes, newest first, without their questions.
pub async fn list_quizzes(
    State(store): State<DynStore>,
    Query(params): Query<CatalogParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageParams {
        page: params.page,
        limit: params.limit,
    }
    .resolve();

    let (quizzes, total) = store
        .list_quizzes(&CatalogFilter::from(&params), page)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list quizzes: {:?}", e);
            e
        })?;

    let data = quizzes.iter().map(PublicQuiz::summary).collect();
    Ok(Json(Paginated::new(data, page, total)))
}

/// Returns a quiz with its questions, answer keys stripped.
pub async fn get_quiz(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = published_quiz(&store, id).await?;
    Ok(Json(PublicQuiz::detail(&quiz)))
}

/// Grades an attempt and records it against the caller's progress.
///
/// The graded result is only returned once the attempt is stored; a
/// submission past the attempt limit is rejected with 429 and not graded
/// into progress.
pub async fn submit_quiz(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = current_user(&store, &claims).await?;
    let quiz = published_quiz(&store, id).await?;

    let now = Utc::now();
    let result = grade(&quiz.definition(), &payload.answers, now);

    store
        .merge_quiz_event(user.id, &result, quiz.max_attempts, now)
        .await
        .map_err(|e| {
            if !matches!(e, AppError::TooManyAttempts(_)) {
                tracing::error!("Failed to record quiz attempt: {:?}", e);
            }
            e
        })?;

    tracing::info!(
        "User {} scored {}/{} on quiz {}",
        user.id,
        result.score,
        result.max_score,
        quiz.id
    );

    Ok(Json(result))
}
