use axum::{
    Json,
    extract::{Multipart, State},
};

use crate::{
    AppState,
    auth::{AuthUser, ClientInfo},
    error::AppError,
    models::{
        AuthResponse, AuthorAction, AuthorApplicationRequest, AuthorProfile, ChangePasswordRequest,
        ImageUploadForm, UpdateProfileRequest, UserProfile,
    },
    password::{hash_password, verify_password},
    response::{ApiResponse, ApiResult},
    validation,
};

use super::{auth::open_session, author_status, live_user, read_image_upload};

/// get_me
///
/// [Authenticated Route] The caller's profile, including their author status.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Current user", body = UserProfile))
)]
pub async fn get_me(user: AuthUser, State(state): State<AppState>) -> ApiResult<UserProfile> {
    let account = live_user(&state, user.id).await?;
    let status = author_status(&state, user.id).await?;
    Ok(ApiResponse::ok("profile", UserProfile::new(&account, status)))
}

#[utoipa::path(
    put,
    path = "/me",
    request_body = UpdateProfileRequest,
    responses((status = 200, description = "Profile updated", body = UserProfile))
)]
pub async fn update_me(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<UserProfile> {
    let changes = UpdateProfileRequest {
        name: payload.name.as_deref().map(validation::name).transpose()?,
        bio: payload.bio.as_deref().map(validation::bio).transpose()?,
    };
    let account = state
        .repo
        .update_user_profile(user.id, changes)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let status = author_status(&state, user.id).await?;
    Ok(ApiResponse::ok("profile updated", UserProfile::new(&account, status)))
}

/// delete_me
///
/// [Authenticated Route] Soft-deletes the caller's account and revokes all of
/// its sessions. Posts and comments stay in place.
#[utoipa::path(
    delete,
    path = "/me",
    responses((status = 200, description = "Account deleted"))
)]
pub async fn delete_me(user: AuthUser, State(state): State<AppState>) -> ApiResult<()> {
    if !state.repo.soft_delete_user(user.id).await? {
        return Err(AppError::NotFound("user"));
    }
    state.repo.revoke_user_sessions(user.id).await?;
    tracing::info!(user_id = %user.id, "account deleted");
    Ok(ApiResponse::message("account deleted"))
}

/// change_password
///
/// [Authenticated Route] Verifies the current password, stores the new one and
/// signs out every device. A fresh session is returned for the caller.
#[utoipa::path(
    put,
    path = "/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = AuthResponse),
        (status = 401, description = "Current password is wrong")
    )
)]
pub async fn change_password(
    user: AuthUser,
    State(state): State<AppState>,
    client: ClientInfo,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<AuthResponse> {
    let account = live_user(&state, user.id).await?;
    if !verify_password(&payload.current_password, &account.password_hash) {
        return Err(AppError::unauthorized("current password is incorrect"));
    }
    validation::password(&payload.new_password)?;

    state
        .repo
        .set_password_hash(user.id, hash_password(&payload.new_password)?)
        .await?;
    state.repo.revoke_user_sessions(user.id).await?;

    let response = open_session(&state, &account, &client).await?;
    Ok(ApiResponse::ok("password changed", response))
}

/// upload_avatar
///
/// [Authenticated Route] Uploads a profile picture (multipart field `file`) and
/// stores its CDN URL on the account.
#[utoipa::path(
    post,
    path = "/me/avatar",
    request_body(content = ImageUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Avatar updated", body = UserProfile),
        (status = 400, description = "Unsupported file"),
        (status = 413, description = "File too large"),
        (status = 502, description = "Upstream storage failed")
    )
)]
pub async fn upload_avatar(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<UserProfile> {
    let upload = read_image_upload(multipart).await?;
    let asset = state
        .storage
        .upload_image(&upload.filename, &upload.content_type, upload.bytes)
        .await?;

    let account = state
        .repo
        .set_user_avatar(user.id, asset.url)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let status = author_status(&state, user.id).await?;
    Ok(ApiResponse::ok("avatar updated", UserProfile::new(&account, status)))
}

/// apply_for_author
///
/// [Authenticated Route] Submits (or, after a rejection, resubmits) an author
/// application. Any other existing status is a conflict.
#[utoipa::path(
    post,
    path = "/me/author-application",
    request_body = AuthorApplicationRequest,
    responses(
        (status = 201, description = "Application submitted", body = AuthorProfile),
        (status = 409, description = "Application already on file")
    )
)]
pub async fn apply_for_author(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<AuthorApplicationRequest>,
) -> ApiResult<AuthorProfile> {
    let application = AuthorApplicationRequest {
        motivation: validation::motivation(&payload.motivation)?,
        portfolio_url: payload
            .portfolio_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| validation::url("portfolio_url", url))
            .transpose()?,
    };

    AuthorAction::Apply.next_status(author_status(&state, user.id).await?)?;
    let profile = state
        .repo
        .submit_author_application(user.id, application)
        .await?;
    tracing::info!(user_id = %user.id, "author application submitted");
    Ok(ApiResponse::created("application submitted", profile))
}

#[utoipa::path(
    get,
    path = "/me/author-application",
    responses(
        (status = 200, description = "Current application", body = AuthorProfile),
        (status = 404, description = "Never applied")
    )
)]
pub async fn get_author_application(
    user: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<AuthorProfile> {
    let profile = state
        .repo
        .get_author_profile(user.id)
        .await?
        .ok_or(AppError::NotFound("author application"))?;
    Ok(ApiResponse::ok("author application", profile))
}
