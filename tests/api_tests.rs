// tests/api_tests.rs

mod common;

use common::{spawn_app, unique_username};
use serde_json::{Value, json};

#[tokio::test]
async fn unknown_path_is_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works_and_hides_password() {
    let app = spawn_app().await;
    let username = unique_username();

    let response = app.register(&username, "password123").await;
    assert_eq!(response.status().as_u16(), 201);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["username"], username.as_str());
    assert_eq!(body["role"], "user");
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn register_duplicate_is_conflict() {
    let app = spawn_app().await;
    let username = unique_username();

    app.register(&username, "password123").await;
    let response = app.register(&username, "password123").await;

    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn register_short_password_is_bad_request() {
    let app = spawn_app().await;

    let response = app.register(&unique_username(), "123").await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn login_returns_bearer_token() {
    let app = spawn_app().await;
    let username = unique_username();
    app.register(&username, "password123").await;

    let response = app.login(&username, "password123").await;
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["type"], "Bearer");
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn login_wrong_password_is_unauthorized() {
    let app = spawn_app().await;
    let username = unique_username();
    app.register(&username, "password123").await;

    let wrong = app.login(&username, "password124").await;
    let unknown = app.login(&unique_username(), "password123").await;

    assert_eq!(wrong.status().as_u16(), 401);
    assert_eq!(unknown.status().as_u16(), 401);
}

#[tokio::test]
async fn me_requires_token() {
    let app = spawn_app().await;

    let missing = app.get("/auth/me", None).await;
    let garbage = app.get("/auth/me", Some("not-a-jwt")).await;

    assert_eq!(missing.status().as_u16(), 401);
    assert_eq!(garbage.status().as_u16(), 401);
}

#[tokio::test]
async fn me_returns_current_user() {
    let app = spawn_app().await;
    let (user_id, token) = app.signup().await;

    let response = app.get("/auth/me", Some(&token)).await;
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"].as_i64(), Some(user_id));
}

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let app = spawn_app().await;
    let (_, token) = app.signup().await;

    let response = app.get("/admin/users", Some(&token)).await;

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn deactivated_user_cannot_log_in() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let username = unique_username();
    let registered: Value = app
        .register(&username, "password123")
        .await
        .json()
        .await
        .unwrap();
    let user_id = registered["id"].as_i64().unwrap();

    let response = app
        .put(
            &format!("/admin/users/{}", user_id),
            &admin,
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let login = app.login(&username, "password123").await;
    assert_eq!(login.status().as_u16(), 403);
}

#[tokio::test]
async fn admin_cannot_delete_self() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let me: Value = app
        .get("/auth/me", Some(&admin))
        .await
        .json()
        .await
        .unwrap();

    let response = app
        .delete(&format!("/admin/users/{}", me["id"]), &admin)
        .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn admin_deletes_user() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (user_id, token) = app.signup().await;

    let response = app.delete(&format!("/admin/users/{}", user_id), &admin).await;
    assert_eq!(response.status().as_u16(), 204);

    let again = app.delete(&format!("/admin/users/{}", user_id), &admin).await;
    assert_eq!(again.status().as_u16(), 404);

    // the old token no longer resolves to an account
    let me = app.get("/auth/me", Some(&token)).await;
    assert_eq!(me.status().as_u16(), 404);
}

#[tokio::test]
async fn topics_are_sanitized_ordered_and_paginated() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    app.create_topic(&admin, "hash-tables", 3).await;
    app.create_topic(&admin, "arrays", 1).await;
    app.create_topic(&admin, "linked-lists", 2).await;

    let response = app.get("/topics?page=1&limit=2", None).await;
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    let slugs: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["slug"].as_str().unwrap())
        .collect();
    assert_eq!(slugs, vec!["arrays", "linked-lists"]);
    assert_eq!(body["pagination"]["total_items"], 3);
    assert_eq!(body["pagination"]["total_pages"], 2);

    let topic: Value = app.get("/topics/arrays", None).await.json().await.unwrap();
    let content = topic["content"].as_str().unwrap();
    assert!(content.contains("<h2>Intro</h2>"));
    assert!(!content.contains("script"));
}

#[tokio::test]
async fn duplicate_topic_slug_is_conflict() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    app.create_topic(&admin, "graphs", 1).await;

    let response = app
        .post(
            "/admin/topics",
            Some(&admin),
            json!({
                "slug": "graphs",
                "title": "Graphs again",
                "description": "Duplicate",
                "category": "data-structures",
                "difficulty": "advanced",
                "content": ""
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn invalid_slug_is_bad_request() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let response = app
        .post(
            "/admin/topics",
            Some(&admin),
            json!({
                "slug": "Not A Slug",
                "title": "Bad",
                "description": "Bad slug",
                "category": "algorithms",
                "difficulty": "beginner",
                "content": ""
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn unpublished_topic_is_hidden() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let response = app
        .post(
            "/admin/topics",
            Some(&admin),
            json!({
                "slug": "draft-topic",
                "title": "Draft",
                "description": "Not ready",
                "category": "concepts",
                "difficulty": "intermediate",
                "content": "<p>soon</p>"
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);

    assert_eq!(app.get("/topics/draft-topic", None).await.status().as_u16(), 404);

    let all: Value = app
        .get("/admin/topics", Some(&admin))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(all["pagination"]["total_items"], 1);
}

/// Registers a user, promotes them to admin and logs them in.
/// Returns `(user_id, token)`.
async fn promoted_admin(app: &common::TestApp, root: &str) -> (i64, String) {
    let username = unique_username();
    let registered: Value = app
        .register(&username, "password123")
        .await
        .json()
        .await
        .unwrap();
    let user_id = registered["id"].as_i64().unwrap();

    let response = app
        .put(&format!("/admin/users/{}", user_id), root, json!({ "role": "admin" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let login: Value = app.login(&username, "password123").await.json().await.unwrap();
    assert_eq!(login["user"]["role"], "admin");
    (user_id, login["token"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn deactivated_admin_loses_admin_access() {
    let app = spawn_app().await;
    let root = app.admin_token().await;
    let (admin_id, admin) = promoted_admin(&app, &root).await;
    let (victim_id, _) = app.signup().await;
    assert_eq!(app.get("/admin/users", Some(&admin)).await.status().as_u16(), 200);

    let response = app
        .put(
            &format!("/admin/users/{}", admin_id),
            &root,
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    // the token still carries role=admin
    assert_eq!(app.get("/admin/users", Some(&admin)).await.status().as_u16(), 403);
    let delete = app.delete(&format!("/admin/users/{}", victim_id), &admin).await;
    assert_eq!(delete.status().as_u16(), 403);

    let users: Value = app
        .get("/admin/users?limit=50", Some(&root))
        .await
        .json()
        .await
        .unwrap();
    assert!(
        users["data"]
            .as_array()
            .unwrap()
            .iter()
            .any(|u| u["id"].as_i64() == Some(victim_id))
    );
}

#[tokio::test]
async fn demoted_admin_loses_admin_access() {
    let app = spawn_app().await;
    let root = app.admin_token().await;
    let (admin_id, admin) = promoted_admin(&app, &root).await;

    let response = app
        .put(
            &format!("/admin/users/{}", admin_id),
            &root,
            json!({ "role": "user" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    assert_eq!(app.get("/admin/users", Some(&admin)).await.status().as_u16(), 403);
    let create = app
        .post(
            "/admin/topics",
            Some(&admin),
            json!({
                "slug": "sneaky",
                "title": "Sneaky",
                "description": "Should not exist",
                "category": "concepts",
                "difficulty": "beginner",
                "content": ""
            }),
        )
        .await;
    assert_eq!(create.status().as_u16(), 403);

    // learner routes keep working
    assert_eq!(app.get("/progress", Some(&admin)).await.status().as_u16(), 200);
}

#[tokio::test]
async fn admin_lists_are_paged_newest_first() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (first, _) = app.signup().await;
    let (second, _) = app.signup().await;

    let body: Value = app
        .get("/admin/users?page=1&limit=1", Some(&admin))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["id"].as_i64(), Some(second));
    assert_eq!(body["pagination"]["total_items"], 3);

    let page_two: Value = app
        .get("/admin/users?page=2&limit=1", Some(&admin))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(page_two["data"][0]["id"].as_i64(), Some(first));
}

#[tokio::test]
async fn change_password_checks_current_password() {
    let app = spawn_app().await;
    let username = unique_username();
    app.register(&username, "password123").await;
    let login: Value = app.login(&username, "password123").await.json().await.unwrap();
    let token = login["token"].as_str().unwrap();

    let wrong = app
        .put(
            "/auth/change-password",
            token,
            json!({ "current_password": "nope-nope", "new_password": "fresh-secret" }),
        )
        .await;
    assert_eq!(wrong.status().as_u16(), 400);

    let short = app
        .put(
            "/auth/change-password",
            token,
            json!({ "current_password": "password123", "new_password": "123" }),
        )
        .await;
    assert_eq!(short.status().as_u16(), 400);

    let ok = app
        .put(
            "/auth/change-password",
            token,
            json!({ "current_password": "password123", "new_password": "fresh-secret" }),
        )
        .await;
    assert_eq!(ok.status().as_u16(), 200);

    assert_eq!(app.login(&username, "password123").await.status().as_u16(), 401);
    assert_eq!(app.login(&username, "fresh-secret").await.status().as_u16(), 200);
}

fn quiz_body(title: &str, is_published: bool) -> Value {
    json!({
        "title": title,
        "description": "Binary search basics",
        "category": "algorithms",
        "difficulty": "intermediate",
        "is_published": is_published,
        "questions": [{
            "prompt": "Binary search needs sorted input.",
            "points": 1,
            "answer": { "type": "true-false", "value": true }
        }]
    })
}

#[tokio::test]
async fn draft_quiz_can_be_edited_and_published() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let created = app
        .post("/admin/quizzes", Some(&admin), quiz_body("Draft search", false))
        .await;
    assert_eq!(created.status().as_u16(), 201);
    let quiz_id = created.json::<Value>().await.unwrap()["id"].as_i64().unwrap();
    let public_path = format!("/quizzes/{}", quiz_id);

    assert_eq!(app.get(&public_path, None).await.status().as_u16(), 404);

    let drafts: Value = app
        .get("/admin/quizzes", Some(&admin))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(drafts["data"][0]["id"].as_i64(), Some(quiz_id));
    // admins see the answer keys
    assert_eq!(drafts["data"][0]["questions"][0]["answer"]["value"], true);

    let edited = app
        .put(
            &format!("/admin/quizzes/{}", quiz_id),
            &admin,
            quiz_body("Binary search", false),
        )
        .await;
    assert_eq!(edited.status().as_u16(), 200);
    assert_eq!(edited.json::<Value>().await.unwrap()["title"], "Binary search");

    let toggled = app
        .patch(&format!("/admin/quizzes/{}/publish", quiz_id), &admin)
        .await;
    assert_eq!(toggled.status().as_u16(), 200);
    assert_eq!(toggled.json::<Value>().await.unwrap()["is_published"], true);

    let public: Value = app.get(&public_path, None).await.json().await.unwrap();
    assert_eq!(public["title"], "Binary search");

    let toggled: Value = app
        .patch(&format!("/admin/quizzes/{}/publish", quiz_id), &admin)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(toggled["is_published"], false);
    assert_eq!(app.get(&public_path, None).await.status().as_u16(), 404);
}

#[tokio::test]
async fn catalog_updates_validate_and_report_missing_items() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let topic_id = app.create_topic(&admin, "stacks", 1).await;
    app.create_topic(&admin, "queues", 2).await;
    let assignment_id = app.create_assignment(&admin, 10).await;

    let topic = |slug: &str| {
        json!({
            "slug": slug,
            "title": "Stacks",
            "description": "LIFO",
            "category": "data-structures",
            "difficulty": "beginner",
            "content": "<p onclick=\"x()\">push</p>",
            "is_published": true
        })
    };

    let taken = app
        .put(&format!("/admin/topics/{}", topic_id), &admin, topic("queues"))
        .await;
    assert_eq!(taken.status().as_u16(), 409);

    let updated: Value = app
        .put(&format!("/admin/topics/{}", topic_id), &admin, topic("stacks"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(updated["content"], "<p>push</p>");

    let missing = app.put("/admin/topics/99999", &admin, topic("other")).await;
    assert_eq!(missing.status().as_u16(), 404);
    let missing = app.patch("/admin/assignments/99999/publish", &admin).await;
    assert_eq!(missing.status().as_u16(), 404);

    let assignment: Value = app
        .put(
            &format!("/admin/assignments/{}", assignment_id),
            &admin,
            json!({
                "title": "Reverse a linked list",
                "description": "Recursively",
                "problem_statement": "Reverse the list without a loop.",
                "difficulty": "medium",
                "category": "linked-lists",
                "points": 20,
                "is_published": true
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(assignment["points"], 20);

    let drafts: Value = app
        .patch(&format!("/admin/assignments/{}/publish", assignment_id), &admin)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(drafts["is_published"], false);
    let listed: Value = app
        .get("/admin/assignments", Some(&admin))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(listed["pagination"]["total_items"], 1);
    assert_eq!(listed["data"][0]["is_published"], false);
}

#[tokio::test]
async fn admin_stats_count_users_and_content() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    app.signup().await;
    app.create_topic(&admin, "tries", 1).await;
    app.post("/admin/quizzes", Some(&admin), quiz_body("Draft", false)).await;

    let dashboard: Value = app
        .get("/admin/dashboard", Some(&admin))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(dashboard["users"]["total"], 2);
    assert_eq!(dashboard["users"]["admins"], 1);
    assert_eq!(dashboard["content"]["topics"]["published"], 1);

    let content: Value = app
        .get("/admin/content-stats", Some(&admin))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(content["quizzes"]["draft"], 1);
    assert_eq!(content["quizzes"]["total"], 1);
    assert_eq!(content["assignments"]["total"], 0);

    let engagement = app.get("/admin/engagement-stats", Some(&admin)).await;
    assert_eq!(engagement.status().as_u16(), 200);
    let engagement: Value = engagement.json().await.unwrap();
    assert_eq!(engagement["learners"], 0);
}
