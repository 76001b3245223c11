mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use common::{
    PASSWORD, TestApp, account_from, spawn_app, spawn_app_with, token_from_mail, uuid_of,
};
use inkwell_api::{AppConfig, MockStorageService};
use serde_json::json;

// --- Sign Up / Sign In ---

#[tokio::test]
async fn signup_creates_a_reader_and_sends_welcome_mail() {
    let app = spawn_app();

    let response = app
        .post(
            "/auth/signup",
            None,
            json!({ "name": "Ada", "email": "  Ada@Example.com ", "password": PASSWORD }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["success"], true);
    let user = &response.data()["user"];
    assert_eq!(user["email"], "ada@example.com");
    assert_eq!(user["role"], "user");
    assert!(user["author_status"].is_null());
    assert_eq!(response.data()["tokens"]["token_type"], "Bearer");
    assert!(user.get("password_hash").is_none());

    assert_eq!(app.mailer.sent_to("ada@example.com").len(), 1);
}

#[tokio::test]
async fn signup_rejects_duplicate_email_regardless_of_case() {
    let app = spawn_app();
    app.signup("Ada", "ada@example.com").await;

    let response = app
        .post(
            "/auth/signup",
            None,
            json!({ "name": "Imposter", "email": "ADA@example.com", "password": PASSWORD }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["success"], false);
}

#[tokio::test]
async fn signup_validates_input() {
    let app = spawn_app();

    let weak = app
        .post(
            "/auth/signup",
            None,
            json!({ "name": "Ada", "email": "ada@example.com", "password": "short" }),
        )
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);

    let bad_email = app
        .post(
            "/auth/signup",
            None,
            json!({ "name": "Ada", "email": "not-an-email", "password": PASSWORD }),
        )
        .await;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signin_errors_do_not_reveal_which_part_was_wrong() {
    let app = spawn_app();
    app.signup("Ada", "ada@example.com").await;

    let wrong_password = app.signin("ada@example.com", "wrongpass99").await;
    let unknown_email = app.signin("nobody@example.com", PASSWORD).await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body["message"], unknown_email.body["message"]);

    let ok = app.signin("ada@example.com", PASSWORD).await;
    assert_eq!(ok.status, StatusCode::OK);
}

// --- Refresh Rotation ---

#[tokio::test]
async fn refresh_rotates_the_token_pair() {
    let app = spawn_app();
    let account = app.signup("Ada", "ada@example.com").await;

    let response = app
        .post("/auth/refresh", None, json!({ "refresh_token": account.refresh }))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let rotated = account_from(response.data(), &account.email);
    assert_ne!(rotated.refresh, account.refresh);

    let me = app.get("/me", Some(&rotated.access)).await;
    assert_eq!(me.status, StatusCode::OK);
}

#[tokio::test]
async fn replaying_a_rotated_refresh_token_revokes_the_session() {
    let app = spawn_app();
    let account = app.signup("Ada", "ada@example.com").await;

    let first = app
        .post("/auth/refresh", None, json!({ "refresh_token": account.refresh }))
        .await;
    let rotated = account_from(first.data(), &account.email);

    let replay = app
        .post("/auth/refresh", None, json!({ "refresh_token": account.refresh }))
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);

    // The legitimate holder is locked out too; the session is gone.
    let after = app
        .post("/auth/refresh", None, json!({ "refresh_token": rotated.refresh }))
        .await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        app.get("/me", Some(&rotated.access)).await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn access_token_is_not_accepted_as_refresh_token() {
    let app = spawn_app();
    let account = app.signup("Ada", "ada@example.com").await;

    let response = app
        .post("/auth/refresh", None, json!({ "refresh_token": account.access }))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

// --- Session Management ---

#[tokio::test]
async fn session_cap_evicts_the_oldest_session() {
    let config = AppConfig {
        max_sessions_per_user: 2,
        ..AppConfig::default()
    };
    let app = spawn_app_with(config, MockStorageService::new());
    let first = app.signup("Ada", "ada@example.com").await;

    let second = account_from(app.signin("ada@example.com", PASSWORD).await.data(), "ada@example.com");
    let third = account_from(app.signin("ada@example.com", PASSWORD).await.data(), "ada@example.com");

    assert_eq!(app.get("/me", Some(&first.access)).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/me", Some(&second.access)).await.status, StatusCode::OK);

    let sessions = app.get("/auth/sessions", Some(&third.access)).await;
    let list = sessions.data().as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list.iter().filter(|s| s["current"] == true).count(), 1);
}

#[tokio::test]
async fn signout_revokes_only_the_current_session() {
    let app = spawn_app();
    let laptop = app.signup("Ada", "ada@example.com").await;
    let phone = account_from(app.signin("ada@example.com", PASSWORD).await.data(), "ada@example.com");

    let response = app.post("/auth/signout", Some(&laptop.access), json!({})).await;
    assert_eq!(response.status, StatusCode::OK);

    assert_eq!(app.get("/me", Some(&laptop.access)).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/me", Some(&phone.access)).await.status, StatusCode::OK);
}

#[tokio::test]
async fn signout_all_revokes_every_session() {
    let app = spawn_app();
    let laptop = app.signup("Ada", "ada@example.com").await;
    let phone = account_from(app.signin("ada@example.com", PASSWORD).await.data(), "ada@example.com");

    let response = app.post("/auth/signout-all", Some(&phone.access), json!({})).await;
    assert_eq!(response.status, StatusCode::OK);

    assert_eq!(app.get("/me", Some(&laptop.access)).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/me", Some(&phone.access)).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn a_session_can_be_revoked_from_another_device() {
    let app = spawn_app();
    let laptop = app.signup("Ada", "ada@example.com").await;
    let phone = account_from(app.signin("ada@example.com", PASSWORD).await.data(), "ada@example.com");

    let sessions = app.get("/auth/sessions", Some(&phone.access)).await;
    let laptop_session = sessions
        .data()
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["current"] == false)
        .map(|s| uuid_of(&s["id"]))
        .unwrap();

    let response = app
        .delete(&format!("/auth/sessions/{laptop_session}"), Some(&phone.access))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(app.get("/me", Some(&laptop.access)).await.status, StatusCode::UNAUTHORIZED);

    // Someone else's session id looks like a missing one.
    let other = app.signup("Grace", "grace@example.com").await;
    let foreign = app
        .delete(&format!("/auth/sessions/{laptop_session}"), Some(&other.access))
        .await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);
}

// --- Passwords ---

#[tokio::test]
async fn change_password_signs_out_everywhere_and_returns_a_new_session() {
    let app = spawn_app();
    let account = app.signup("Ada", "ada@example.com").await;

    let wrong = app
        .put(
            "/me/password",
            Some(&account.access),
            json!({ "current_password": "wrongpass99", "new_password": "newpassword42" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let response = app
        .put(
            "/me/password",
            Some(&account.access),
            json!({ "current_password": PASSWORD, "new_password": "newpassword42" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let fresh = account_from(response.data(), &account.email);

    assert_eq!(app.get("/me", Some(&account.access)).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/me", Some(&fresh.access)).await.status, StatusCode::OK);
    assert_eq!(app.signin(&account.email, PASSWORD).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.signin(&account.email, "newpassword42").await.status, StatusCode::OK);
}

#[tokio::test]
async fn forgot_password_answers_the_same_for_unknown_emails() {
    let app = spawn_app();

    let response = app
        .post("/auth/password/forgot", None, json!({ "email": "ghost@example.com" }))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(app.mailer.sent_to("ghost@example.com").is_empty());
}

#[tokio::test]
async fn password_reset_flow_is_single_use() {
    let app = spawn_app();
    let account = app.signup("Ada", "ada@example.com").await;

    let response = app
        .post("/auth/password/forgot", None, json!({ "email": "ada@example.com" }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let token = token_from_mail(&app.mailer, "ada@example.com");

    let reset = app
        .post(
            "/auth/password/reset",
            None,
            json!({ "token": token, "new_password": "resetpass77" }),
        )
        .await;
    assert_eq!(reset.status, StatusCode::OK);

    // Existing sessions are gone, the new password works.
    assert_eq!(app.get("/me", Some(&account.access)).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.signin("ada@example.com", "resetpass77").await.status, StatusCode::OK);

    let reused = app
        .post(
            "/auth/password/reset",
            None,
            json!({ "token": token, "new_password": "another123" }),
        )
        .await;
    assert_eq!(reused.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn a_new_reset_link_invalidates_the_previous_one() {
    let app = spawn_app();
    app.signup("Ada", "ada@example.com").await;

    app.post("/auth/password/forgot", None, json!({ "email": "ada@example.com" }))
        .await;
    let first = token_from_mail(&app.mailer, "ada@example.com");
    app.post("/auth/password/forgot", None, json!({ "email": "ada@example.com" }))
        .await;
    let second = token_from_mail(&app.mailer, "ada@example.com");
    assert_ne!(first, second);

    let stale = app
        .post(
            "/auth/password/reset",
            None,
            json!({ "token": first, "new_password": "resetpass77" }),
        )
        .await;
    assert_eq!(stale.status, StatusCode::BAD_REQUEST);

    let fresh = app
        .post(
            "/auth/password/reset",
            None,
            json!({ "token": second, "new_password": "resetpass77" }),
        )
        .await;
    assert_eq!(fresh.status, StatusCode::OK);
}

// --- Account Deletion ---

#[tokio::test]
async fn deleted_accounts_cannot_sign_in() {
    let app = spawn_app();
    let account = app.signup("Ada", "ada@example.com").await;

    let response = app.delete("/me", Some(&account.access)).await;
    assert_eq!(response.status, StatusCode::OK);

    assert_eq!(app.get("/me", Some(&account.access)).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.signin("ada@example.com", PASSWORD).await.status, StatusCode::UNAUTHORIZED);
}

// --- Rate Limiting ---

#[tokio::test]
async fn credential_endpoints_are_rate_limited_per_client() {
    let config = AppConfig {
        rate_limit_max_requests: 2,
        ..AppConfig::default()
    };
    let app = spawn_app_with(config, MockStorageService::new());

    let first = app.signin("ada@example.com", PASSWORD).await;
    assert_eq!(first.status, StatusCode::UNAUTHORIZED);
    assert_eq!(first.headers["x-ratelimit-limit"], "2");
    assert_eq!(first.headers["x-ratelimit-remaining"], "1");

    app.signin("ada@example.com", PASSWORD).await;
    let limited = app.signin("ada@example.com", PASSWORD).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers.contains_key("retry-after"));

    // Other endpoints are unaffected.
    assert_eq!(app.get("/health", None).await.status, StatusCode::OK);
}

async fn signin_forwarded_for(app: &TestApp, forwarded_for: &str) -> StatusCode {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/signin")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", forwarded_for)
        .body(Body::from(
            json!({ "email": "ada@example.com", "password": PASSWORD }).to_string(),
        ))
        .expect("valid request");
    app.send(request).await.status
}

#[tokio::test]
async fn rotating_forwarded_for_does_not_reset_the_limit() {
    let config = AppConfig {
        rate_limit_max_requests: 2,
        ..AppConfig::default()
    };
    let app = spawn_app_with(config, MockStorageService::new());

    let mut statuses = Vec::new();
    for i in 0..6 {
        statuses.push(signin_forwarded_for(&app, &format!("203.0.113.{i}")).await);
    }

    assert_eq!(statuses[..2], [StatusCode::UNAUTHORIZED; 2]);
    assert!(
        statuses[2..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS),
        "{statuses:?}"
    );
}

#[tokio::test]
async fn trusted_proxy_limits_each_forwarded_client_separately() {
    let config = AppConfig {
        rate_limit_max_requests: 2,
        trust_proxy_headers: true,
        ..AppConfig::default()
    };
    let app = spawn_app_with(config, MockStorageService::new());

    for i in 0..4 {
        let status = signin_forwarded_for(&app, &format!("203.0.113.{i}")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    signin_forwarded_for(&app, "198.51.100.7").await;
    signin_forwarded_for(&app, "198.51.100.7").await;
    assert_eq!(
        signin_forwarded_for(&app, "198.51.100.7").await,
        StatusCode::TOO_MANY_REQUESTS
    );
}
