// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, patch, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, assignment, auth, leaderboard, progress, quiz, topic},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Public catalog and leaderboard routes.
/// * Learner routes behind `auth_middleware`.
/// * Admin routes behind `auth_middleware` then `admin_middleware`.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .route("/change-password", put(auth::change_password))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let topic_routes = Router::new()
        .route("/", get(topic::list_topics))
        .route("/{slug}", get(topic::get_topic));

    let quiz_routes = Router::new()
        .route("/", get(quiz::list_quizzes))
        .route("/{id}", get(quiz::get_quiz))
        .merge(
            Router::new()
                .route("/{id}/submit", post(quiz::submit_quiz))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let assignment_routes = Router::new()
        .route("/", get(assignment::list_assignments))
        .route("/{id}", get(assignment::get_assignment))
        .merge(
            Router::new()
                .route("/{id}/submit", post(assignment::submit_assignment))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let progress_routes = Router::new()
        .route("/", get(progress::get_progress))
        .route("/stats", get(progress::get_progress_stats))
        .route("/topic", post(progress::update_topic_progress))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/content-stats", get(admin::content_stats))
        .route("/engagement-stats", get(admin::engagement_stats))
        .route("/users", get(admin::list_users))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route(
            "/topics",
            get(admin::list_all_topics).post(admin::create_topic),
        )
        .route(
            "/topics/{id}",
            put(admin::update_topic).delete(admin::delete_topic),
        )
        .route("/topics/{id}/publish", patch(admin::toggle_topic_published))
        .route(
            "/quizzes",
            get(admin::list_all_quizzes).post(admin::create_quiz),
        )
        .route(
            "/quizzes/{id}",
            put(admin::update_quiz).delete(admin::delete_quiz),
        )
        .route("/quizzes/{id}/publish", patch(admin::toggle_quiz_published))
        .route(
            "/assignments",
            get(admin::list_all_assignments).post(admin::create_assignment),
        )
        .route(
            "/assignments/{id}",
            put(admin::update_assignment).delete(admin::delete_assignment),
        )
        .route(
            "/assignments/{id}/publish",
            patch(admin::toggle_assignment_published),
        )
        // Auth first, then the admin check against the stored account
        .layer(middleware::from_fn_with_state(state.clone(), admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/topics", topic_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/assignments", assignment_routes)
        .nest("/api/progress", progress_routes)
        .route("/api/leaderboard", get(leaderboard::get_leaderboard))
        .nest("/api/admin", admin_routes)
        // Global Middleware (outermost first)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::Config,
        store::{IdentityStore, MemoryStore},
        utils::jwt::sign_jwt,
    };

    const SECRET: &str = "router-test";

    fn app() -> Router {
        app_with(Arc::new(MemoryStore::new()))
    }

    fn app_with(store: Arc<MemoryStore>) -> Router {
        let config = Config {
            database_url: None,
            jwt_secret: SECRET.to_string(),
            jwt_expiration: 60,
            rust_log: "error".to_string(),
            admin_username: None,
            admin_password: None,
            port: 0,
        };
        create_router(AppState { store, config })
    }

    async fn status_of(method: &str, uri: &str) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        app().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_public_routes_open() {
        assert_eq!(status_of("GET", "/api/leaderboard").await, StatusCode::OK);
        assert_eq!(status_of("GET", "/api/topics").await, StatusCode::OK);
        assert_eq!(status_of("GET", "/api/quizzes/1").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_protected_routes_need_token() {
        assert_eq!(status_of("GET", "/api/progress").await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_of("POST", "/api/quizzes/1/submit").await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_of("GET", "/api/admin/users").await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_routes_check_stored_role() {
        let store = Arc::new(MemoryStore::new());
        let learner = store.create_user("learner", "hash", "user").await.unwrap();

        // a token minted with the admin role for a plain account
        let forged = sign_jwt(learner.id, "admin", SECRET, 60).unwrap();
        let request = Request::builder()
            .uri("/api/admin/users")
            .header(header::AUTHORIZATION, format!("Bearer {}", forged))
            .body(Body::empty())
            .unwrap();
        let response = app_with(store.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // an admin token whose account is gone
        let orphan = sign_jwt(learner.id + 100, "admin", SECRET, 60).unwrap();
        let request = Request::builder()
            .uri("/api/admin/users")
            .header(header::AUTHORIZATION, format!("Bearer {}", orphan))
            .body(Body::empty())
            .unwrap();
        let response = app_with(store).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
