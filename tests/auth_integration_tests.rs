use axum::{
    extract::FromRequestParts,
    http::{Request, StatusCode, request::Parts},
};
use inkwell_api::{
    AppConfig, AppState, MemoryRepository, MockStorageService, OutboxMailer,
    auth::{AdminUser, AuthUser, ClientInfo, DEV_USER_HEADER, MaybeAuthUser},
    config::Env,
    mail::MailerState,
    models::{NewSession, NewUser, Role, User},
    repository::{Repository, RepositoryState},
    sessions,
    storage::StorageState,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

// --- Test Setup ---

fn state_with(config: AppConfig) -> AppState {
    AppState::new(
        Arc::new(MemoryRepository::new()) as RepositoryState,
        Arc::new(MockStorageService::new()) as StorageState,
        Arc::new(OutboxMailer::new()) as MailerState,
        config,
    )
}

async fn seed_user(state: &AppState, email: &str, role: Role) -> User {
    state
        .repo
        .create_user(NewUser {
            name: "Test User".to_string(),
            email: email.to_string(),
            // Never verified in these tests.
            password_hash: "$argon2id$placeholder".to_string(),
            role,
        })
        .await
        .unwrap()
}

/// Returns a fresh access token for `user`.
async fn sign_in(state: &AppState, user: &User) -> String {
    sessions::start_session(&state.repo, &state.tokens, 5, user, &ClientInfo::default())
        .await
        .unwrap()
        .access_token
}

fn parts_with(headers: &[(&str, String)]) -> Parts {
    let mut builder = Request::builder().uri("/me");
    for (name, value) in headers {
        builder = builder.header(*name, value);
    }
    builder.body(()).unwrap().into_parts().0
}

fn bearer(token: &str) -> (&'static str, String) {
    ("authorization", format!("Bearer {token}"))
}

// --- AuthUser ---

#[tokio::test]
async fn valid_access_token_resolves_the_user_and_session() {
    let state = state_with(AppConfig::default());
    let user = seed_user(&state, "reader@example.com", Role::User).await;
    let token = sign_in(&state, &user).await;

    let mut parts = parts_with(&[bearer(&token)]);
    let auth = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();

    assert_eq!(auth.id, user.id);
    assert_eq!(auth.role, Role::User);
    assert!(auth.session_id.is_some());
    // Cached for later extractors in the same request.
    assert!(parts.extensions.get::<AuthUser>().is_some());
}

#[tokio::test]
async fn missing_token_is_rejected() {
    let state = state_with(AppConfig::default());
    let mut parts = parts_with(&[]);

    let err = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_token_is_rejected() {
    let state = state_with(AppConfig::default());
    let mut parts = parts_with(&[bearer("not.a.jwt")]);

    let err = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn revoked_session_locks_out_its_access_token() {
    let state = state_with(AppConfig::default());
    let user = seed_user(&state, "reader@example.com", Role::User).await;
    let token = sign_in(&state, &user).await;

    state.repo.revoke_user_sessions(user.id).await.unwrap();

    let mut parts = parts_with(&[bearer(&token)]);
    let err = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_session_locks_out_its_access_token() {
    let state = state_with(AppConfig::default());
    let user = seed_user(&state, "stale@example.com", Role::User).await;

    let session_id = Uuid::new_v4();
    state
        .repo
        .create_session(
            NewSession {
                id: session_id,
                user_id: user.id,
                refresh_token_hash: "expired-hash".to_string(),
                user_agent: None,
                ip_address: None,
                expires_at: Utc::now() - Duration::minutes(1),
            },
            5,
        )
        .await
        .unwrap();
    // The JWT itself is still within its lifetime.
    let token = state
        .tokens
        .issue_access(user.id, session_id, user.role)
        .unwrap();

    let mut parts = parts_with(&[bearer(&token)]);
    let err = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deleted_account_is_rejected() {
    let state = state_with(AppConfig::default());
    let user = seed_user(&state, "gone@example.com", Role::User).await;
    let token = sign_in(&state, &user).await;

    state.repo.soft_delete_user(user.id).await.unwrap();

    let mut parts = parts_with(&[bearer(&token)]);
    assert!(AuthUser::from_request_parts(&mut parts, &state).await.is_err());
}

#[tokio::test]
async fn role_comes_from_the_database_not_the_token() {
    let state = state_with(AppConfig::default());
    let user = seed_user(&state, "promoted@example.com", Role::User).await;
    let token = sign_in(&state, &user).await;

    state.repo.set_user_role(user.id, Role::Admin).await.unwrap();

    let mut parts = parts_with(&[bearer(&token)]);
    let auth = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert!(auth.is_admin());
}

// --- Local Bypass ---

#[tokio::test]
async fn dev_header_authenticates_in_local_mode() {
    let state = state_with(AppConfig::default());
    let user = seed_user(&state, "dev@example.com", Role::User).await;

    let mut parts = parts_with(&[(DEV_USER_HEADER, user.id.to_string())]);
    let auth = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();

    assert_eq!(auth.id, user.id);
    assert!(auth.session_id.is_none());
}

#[tokio::test]
async fn dev_header_is_ignored_in_production() {
    let state = state_with(AppConfig {
        env: Env::Production,
        ..AppConfig::default()
    });
    let user = seed_user(&state, "dev@example.com", Role::Admin).await;

    let mut parts = parts_with(&[(DEV_USER_HEADER, user.id.to_string())]);
    let err = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn dev_header_for_unknown_user_falls_through_to_token_check() {
    let state = state_with(AppConfig::default());
    let mut parts = parts_with(&[(DEV_USER_HEADER, Uuid::new_v4().to_string())]);

    assert!(AuthUser::from_request_parts(&mut parts, &state).await.is_err());
}

// --- MaybeAuthUser & AdminUser ---

#[tokio::test]
async fn invalid_credentials_on_public_routes_mean_anonymous() {
    let state = state_with(AppConfig::default());
    let mut parts = parts_with(&[bearer("garbage")]);

    let MaybeAuthUser(user) = MaybeAuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap();
    assert!(user.is_none());
}

#[tokio::test]
async fn optional_identity_is_resolved_when_valid() {
    let state = state_with(AppConfig::default());
    let user = seed_user(&state, "reader@example.com", Role::User).await;
    let token = sign_in(&state, &user).await;

    let mut parts = parts_with(&[bearer(&token)]);
    let maybe = MaybeAuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap();
    assert_eq!(maybe.id(), Some(user.id));
    assert!(!maybe.is_admin());
}

#[tokio::test]
async fn admin_extractor_forbids_regular_users() {
    let state = state_with(AppConfig::default());
    let user = seed_user(&state, "reader@example.com", Role::User).await;
    let token = sign_in(&state, &user).await;

    let mut parts = parts_with(&[bearer(&token)]);
    let err = AdminUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_extractor_accepts_admins() {
    let state = state_with(AppConfig::default());
    let admin = seed_user(&state, "admin@example.com", Role::Admin).await;
    let token = sign_in(&state, &admin).await;

    let mut parts = parts_with(&[bearer(&token)]);
    let AdminUser(auth) = AdminUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap();
    assert_eq!(auth.id, admin.id);
}
