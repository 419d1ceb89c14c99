// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use dsa_backend::{
    config::Config,
    routes,
    state::AppState,
    store::{DynStore, IdentityStore, MemoryStore, PgStore},
    utils::hash::hash_password,
};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;

pub const ADMIN_USERNAME: &str = "root_admin";
pub const ADMIN_PASSWORD: &str = "admin_password";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub store: DynStore,
}

/// Spawns the app on a random port backed by a fresh in-memory store
/// with one admin account.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(Arc::new(MemoryStore::new())).await
}

/// Spawns the app against `DATABASE_URL`, or returns `None` when it is unset.
///
/// The database is shared between runs, so callers must not assume it
/// starts empty.
pub async fn spawn_pg_app() -> Option<TestApp> {
    let database_url = std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty())?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing");

    let store = PgStore::new(pool);
    store.migrate().await.expect("Failed to migrate database");

    Some(spawn_app_with(Arc::new(store)).await)
}

async fn spawn_app_with(store: DynStore) -> TestApp {
    if store
        .find_user_by_username(ADMIN_USERNAME)
        .await
        .expect("look up admin")
        .is_none()
    {
        let hashed = hash_password(ADMIN_PASSWORD).expect("hash admin password");
        store
            .create_user(ADMIN_USERNAME, &hashed, "admin")
            .await
            .expect("seed admin");
    }

    let config = Config {
        database_url: None,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
        port: 0,
    };

    let app = routes::create_router(AppState {
        store: store.clone(),
        config,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        store,
    }
}

/// A username unique across test runs.
pub fn unique_username() -> String {
    format!("user_{}", &uuid::Uuid::new_v4().simple().to_string()[..12])
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.address, path)
    }

    pub async fn register(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/register"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Registers a fresh user and returns `(user_id, token)`.
    pub async fn signup(&self) -> (i64, String) {
        let username = unique_username();
        let registered: Value = self.register(&username, "password123").await.json().await.unwrap();
        let login: Value = self.login(&username, "password123").await.json().await.unwrap();
        (
            registered["id"].as_i64().unwrap(),
            login["token"].as_str().unwrap().to_string(),
        )
    }

    pub async fn admin_token(&self) -> String {
        let login: Value = self
            .login(ADMIN_USERNAME, ADMIN_PASSWORD)
            .await
            .json()
            .await
            .unwrap();
        login["token"].as_str().unwrap().to_string()
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> reqwest::Response {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn patch(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .patch(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Creates a published topic as admin, returning its id.
    pub async fn create_topic(&self, admin: &str, slug: &str, sort_order: i32) -> i64 {
        let response = self
            .post(
                "/admin/topics",
                Some(admin),
                json!({
                    "slug": slug,
                    "title": format!("Topic {}", slug),
                    "description": "Core data structure",
                    "category": "data-structures",
                    "difficulty": "beginner",
                    "content": "<h2>Intro</h2><script>alert(1)</script>",
                    "sort_order": sort_order,
                    "is_published": true
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    /// Creates a published three-question quiz worth 6 points.
    pub async fn create_quiz(&self, admin: &str, max_attempts: i32) -> i64 {
        let response = self
            .post(
                "/admin/quizzes",
                Some(admin),
                json!({
                    "title": "Stacks and queues",
                    "description": "LIFO vs FIFO",
                    "category": "data-structures",
                    "difficulty": "beginner",
                    "passing_score": 60,
                    "max_attempts": max_attempts,
                    "is_published": true,
                    "questions": [
                        {
                            "prompt": "Which structure is LIFO?",
                            "options": ["Queue", "Stack"],
                            "points": 2,
                            "answer": { "type": "multiple-choice", "value": "Stack" }
                        },
                        {
                            "prompt": "A queue is FIFO.",
                            "points": 2,
                            "answer": { "type": "true-false", "value": true }
                        },
                        {
                            "prompt": "Removing from a stack is called ___.",
                            "points": 2,
                            "answer": { "type": "fill-in-blank", "value": "pop" }
                        }
                    ]
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    pub async fn create_assignment(&self, admin: &str, points: i64) -> i64 {
        let response = self
            .post(
                "/admin/assignments",
                Some(admin),
                json!({
                    "title": "Reverse a linked list",
                    "description": "In place",
                    "problem_statement": "Reverse the list and return the new head.",
                    "difficulty": "easy",
                    "category": "linked-lists",
                    "points": points,
                    "is_published": true
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }
}
