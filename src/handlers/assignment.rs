// src/handlers/assignment.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::current_user,
    models::{
        assignment::{Assignment, SubmitAssignmentRequest},
        pagination::{PageParams, Paginated},
        progress::ProgressResponse,
        topic::{CatalogFilter, CatalogParams},
    },
    store::DynStore,
    utils::jwt::Claims,
};

async fn published_assignment(store: &DynStore, id: i64) -> Result<Assignment, AppError> {
    store
        .find_assignment(id)
        .await?
        .filter(|a| a.is_published)
        .ok_or_else(|| AppError::NotFound("Assignment not found".to_string()))
}

pub async fn list_assignments(
    State(store): State<DynStore>,
    Query(params): Query<CatalogParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageParams {
        page: params.page,
        limit: params.limit,
    }
    .resolve();

    let (assignments, total) = store
        .list_assignments(&CatalogFilter::from(&params), page)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list assignments: {:?}", e);
            e
        })?;

    Ok(Json(Paginated::new(assignments, page, total)))
}

pub async fn get_assignment(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(published_assignment(&store, id).await?))
}

/// Records a test-suite run for an assignment.
///
/// The score is derived from the assignment's points; clients only report
/// how many tests passed.
pub async fn submit_assignment(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitAssignmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = current_user(&store, &claims).await?;
    let assignment = published_assignment(&store, id).await?;

    let result = assignment.score_submission(payload.passed_count, payload.total_count);

    let record = store
        .merge_assignment_event(user.id, assignment.id, &result, Utc::now())
        .await?;

    let entry = record.assignments.get(&assignment.id).cloned();

    Ok(Json(json!({
        "result": result,
        "assignment": entry,
        "progress": ProgressResponse::from(record),
    })))
}
