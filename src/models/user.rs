// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// User role: 'user' or 'admin'.
    pub role: String,

    /// Deactivated accounts cannot log in.
    pub is_active: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password length must be between 6 and 128 characters."
    ))]
    pub password: String,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for `PUT /auth/change-password`.
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, max = 128))]
    pub current_password: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "New password must be between 6 and 128 characters."
    ))]
    pub new_password: String,
}

/// Fields an admin may change on an account. All optional.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(custom(function = validate_role))]
    pub role: Option<String>,
    pub is_active: Option<bool>,
    #[validate(length(min = 6, max = 128))]
    pub password: Option<String>,
}

/// Restricts roles to 'user' or 'admin'.
fn validate_role(role: &str) -> Result<(), validator::ValidationError> {
    if role != ROLE_USER && role != ROLE_ADMIN {
        return Err(validator::ValidationError::new("invalid_role"));
    }
    Ok(())
}

/// Storage-level update: the password is already hashed.
#[derive(Debug, Default, Clone)]
pub struct UserChanges {
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub password_hash: Option<String>,
}
