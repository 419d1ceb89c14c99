// src/handlers/progress.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::current_user,
    models::progress::{ProgressResponse, UpdateTopicProgressRequest},
    progress::{LearnerStats, TopicEvent},
    store::DynStore,
    utils::jwt::Claims,
};

/// Returns the caller's progress record, creating it on first access.
pub async fn get_progress(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(&store, &claims).await?;
    let record = store.load_progress(user.id, Utc::now()).await?;

    Ok(Json(ProgressResponse::from(record)))
}

/// Returns the caller's totals and leaderboard position.
pub async fn get_progress_stats(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(&store, &claims).await?;
    let record = store.load_progress(user.id, Utc::now()).await?;
    let all = store.list_progress_records().await.map_err(|e| {
        tracing::error!("Failed to load progress records: {:?}", e);
        e
    })?;

    Ok(Json(LearnerStats::compute(&record, &all)))
}

/// Records a topic view or status change.
pub async fn update_topic_progress(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateTopicProgressRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = current_user(&store, &claims).await?;
    let event = TopicEvent::from(payload);

    let record = store
        .merge_topic_event(user.id, &event, Utc::now())
        .await
        .map_err(|e| {
            tracing::error!("Failed to update topic progress: {:?}", e);
            e
        })?;

    Ok(Json(ProgressResponse::from(record)))
}
