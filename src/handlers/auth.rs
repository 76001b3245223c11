use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AuthUser, ClientInfo},
    error::AppError,
    mail,
    models::{
        AuthResponse, ForgotPasswordRequest, NewUser, RefreshRequest, ResetPasswordRequest, Role,
        SessionView, SignInRequest, SignUpRequest, User, UserProfile,
    },
    password::{hash_password, verify_password},
    response::{ApiResponse, ApiResult},
    sessions,
    tokens::{hash_token, random_token},
    validation,
};

use super::author_status;

/// Starts a session for `user` and bundles it with the profile view.
pub(crate) async fn open_session(
    state: &AppState,
    user: &User,
    client: &ClientInfo,
) -> Result<AuthResponse, AppError> {
    let tokens = sessions::start_session(
        &state.repo,
        &state.tokens,
        state.config.max_sessions_per_user,
        user,
        client,
    )
    .await?;
    Ok(AuthResponse {
        user: UserProfile::new(user, author_status(state, user.id).await?),
        tokens,
    })
}

/// signup
///
/// [Public Route] Registers a reader account (`user` role), sends the welcome
/// email and signs the new user in.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(payload): Json<SignUpRequest>,
) -> ApiResult<AuthResponse> {
    let name = validation::name(&payload.name)?;
    let email = validation::email(&payload.email)?;
    validation::password(&payload.password)?;

    let user = state
        .repo
        .create_user(NewUser {
            name,
            email,
            password_hash: hash_password(&payload.password)?,
            role: Role::User,
        })
        .await?;
    tracing::info!(user_id = %user.id, "account created");

    mail::deliver(&state.mailer, mail::welcome(&user.email, &user.name)).await;

    let response = open_session(&state, &user, &client).await?;
    Ok(ApiResponse::created("account created", response))
}

/// signin
///
/// [Public Route] Exchanges email and password for a new session. Unknown
/// emails, wrong passwords and deleted accounts share one error message.
#[utoipa::path(
    post,
    path = "/auth/signin",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn signin(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(payload): Json<SignInRequest>,
) -> ApiResult<AuthResponse> {
    let invalid = || AppError::unauthorized("invalid email or password");
    let email = validation::email(&payload.email).map_err(|_| invalid())?;

    let user = state
        .repo
        .get_user_by_email(&email)
        .await?
        .filter(|u| !u.is_deleted)
        .ok_or_else(invalid)?;
    if !verify_password(&payload.password, &user.password_hash) {
        tracing::warn!(user_id = %user.id, "failed sign-in attempt");
        return Err(invalid());
    }

    let response = open_session(&state, &user, &client).await?;
    Ok(ApiResponse::ok("signed in", response))
}

/// refresh
///
/// [Public Route] Rotates a refresh token. Replaying an already rotated token
/// revokes the session.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token pair rotated", body = AuthResponse),
        (status = 401, description = "Invalid, expired or reused refresh token")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<AuthResponse> {
    let (user, tokens) =
        sessions::refresh_session(&state.repo, &state.tokens, payload.refresh_token.trim()).await?;
    let response = AuthResponse {
        user: UserProfile::new(&user, author_status(&state, user.id).await?),
        tokens,
    };
    Ok(ApiResponse::ok("token refreshed", response))
}

/// signout
///
/// [Authenticated Route] Revokes the session the request was made with.
#[utoipa::path(
    post,
    path = "/auth/signout",
    responses((status = 200, description = "Signed out"), (status = 401, description = "Unauthorized"))
)]
pub async fn signout(user: AuthUser, State(state): State<AppState>) -> ApiResult<()> {
    if let Some(session_id) = user.session_id {
        state.repo.revoke_session(session_id, user.id).await?;
        tracing::info!(user_id = %user.id, %session_id, "signed out");
    }
    Ok(ApiResponse::message("signed out"))
}

/// signout_all
///
/// [Authenticated Route] Revokes every session of the caller, including the current one.
#[utoipa::path(
    post,
    path = "/auth/signout-all",
    responses((status = 200, description = "All sessions revoked"))
)]
pub async fn signout_all(user: AuthUser, State(state): State<AppState>) -> ApiResult<()> {
    let revoked = state.repo.revoke_user_sessions(user.id).await?;
    tracing::info!(user_id = %user.id, revoked, "signed out everywhere");
    Ok(ApiResponse::message(format!("{revoked} session(s) revoked")))
}

#[utoipa::path(
    get,
    path = "/auth/sessions",
    responses((status = 200, description = "Active sessions", body = [SessionView]))
)]
pub async fn list_sessions(user: AuthUser, State(state): State<AppState>) -> ApiResult<Vec<SessionView>> {
    let sessions = state
        .repo
        .list_active_sessions(user.id)
        .await?
        .into_iter()
        .map(|s| SessionView::new(s, user.session_id))
        .collect();
    Ok(ApiResponse::ok("active sessions", sessions))
}

/// revoke_session
///
/// [Authenticated Route] Revokes one of the caller's own sessions. Sessions of
/// other users are reported as missing.
#[utoipa::path(
    delete,
    path = "/auth/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "Session revoked"), (status = 404, description = "Not Found"))
)]
pub async fn revoke_session(
    user: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<()> {
    if !state.repo.revoke_session(session_id, user.id).await? {
        return Err(AppError::NotFound("session"));
    }
    Ok(ApiResponse::message("session revoked"))
}

/// forgot_password
///
/// [Public Route] Emails a single-use reset link. Always answers 200 so the
/// endpoint cannot be used to probe which emails are registered.
#[utoipa::path(
    post,
    path = "/auth/password/forgot",
    request_body = ForgotPasswordRequest,
    responses((status = 200, description = "Reset email sent if the account exists"))
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> ApiResult<()> {
    let accepted = ApiResponse::message("if the account exists, a reset link has been sent");
    let Ok(email) = validation::email(&payload.email) else {
        return Ok(accepted);
    };
    let Some(user) = state
        .repo
        .get_user_by_email(&email)
        .await?
        .filter(|u| !u.is_deleted)
    else {
        return Ok(accepted);
    };

    let token = random_token();
    let ttl = state.config.password_reset_ttl_secs;
    state
        .repo
        .create_password_reset(user.id, hash_token(&token), Utc::now() + Duration::seconds(ttl))
        .await?;

    let link = format!("{}/reset-password?token={token}", state.config.frontend_url);
    mail::deliver(
        &state.mailer,
        mail::password_reset(&user.email, &user.name, &link, ttl / 60),
    )
    .await;
    Ok(accepted)
}

/// reset_password
///
/// [Public Route] Consumes a reset token, sets the new password and revokes
/// every session of the account.
#[utoipa::path(
    post,
    path = "/auth/password/reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "Invalid or expired token")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<()> {
    validation::password(&payload.new_password)?;
    let user_id = state
        .repo
        .consume_password_reset(&hash_token(payload.token.trim()))
        .await?
        .ok_or_else(|| AppError::validation("reset link is invalid or has expired"))?;

    let password_hash = hash_password(&payload.new_password)?;
    if !state.repo.set_password_hash(user_id, password_hash).await? {
        return Err(AppError::validation("reset link is invalid or has expired"));
    }
    let revoked = state.repo.revoke_user_sessions(user_id).await?;
    tracing::info!(%user_id, revoked, "password reset");
    Ok(ApiResponse::message("password updated, please sign in again"))
}
