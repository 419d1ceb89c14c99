// src/handlers/leaderboard.rs

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{
        pagination::{PageParams, Paginated},
        progress::LeaderboardRow,
    },
    progress::rank,
    store::DynStore,
};

/// Ranks every progress record and returns one page of the result.
pub async fn get_leaderboard(
    State(store): State<DynStore>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.resolve();

    let records = store.list_progress_records().await.map_err(|e| {
        tracing::error!("Failed to fetch leaderboard: {:?}", e);
        e
    })?;
    let ranked = rank(&records);

    let mut data = Vec::new();
    for (position, entry) in ranked
        .iter()
        .enumerate()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
    {
        // records cascade with their user, so a miss is a concurrent delete
        let Some(user) = store.find_user(entry.user_id).await? else {
            continue;
        };
        data.push(LeaderboardRow {
            rank: position as u64 + 1,
            user_id: entry.user_id,
            username: user.username,
            overall_score: entry.overall_score,
            completion_percentage: entry.completion_percentage,
        });
    }

    Ok(Json(Paginated::new(data, page, ranked.len() as u64)))
}
