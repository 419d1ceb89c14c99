// src/handlers/mod.rs

use crate::{error::AppError, models::user::User, store::DynStore, utils::jwt::Claims};

pub mod admin;
pub mod assignment;
pub mod auth;
pub mod leaderboard;
pub mod progress;
pub mod quiz;
pub mod topic;

/// Resolves the token's subject to a live account.
///
/// A token can outlive its user (deleted) or its access (deactivated).
pub(crate) async fn current_user(store: &DynStore, claims: &Claims) -> Result<User, AppError> {
    let user = store
        .find_user(claims.user_id()?)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !user.is_active {
        return Err(AppError::Forbidden("Account is deactivated".to_string()));
    }

    Ok(user)
}
