// src/handlers/topic.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{
        pagination::{PageParams, Paginated},
        topic::{CatalogFilter, CatalogParams},
    },
    store::DynStore,
};

/// Lists published topics in curriculum order.
pub async fn list_topics(
    State(store): State<DynStore>,
    Query(params): Query<CatalogParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageParams {
        page: params.page,
        limit: params.limit,
    }
    .resolve();

    let (topics, total) = store
        .list_topics(&CatalogFilter::from(&params), page)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list topics: {:?}", e);
            e
        })?;

    Ok(Json(Paginated::new(topics, page, total)))
}

/// Fetches a published topic by slug.
pub async fn get_topic(
    State(store): State<DynStore>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let topic = store
        .find_topic_by_slug(&slug)
        .await?
        .filter(|t| t.is_published)
        .ok_or_else(|| AppError::NotFound("Topic not found".to_string()))?;

    Ok(Json(topic))
}
