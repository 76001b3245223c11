//! HTTP handlers, grouped by resource. Shared lookups used by several groups
//! live here.

use axum::{
    body::Bytes,
    extract::{Multipart, multipart::MultipartError},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::AppError,
    models::{AuthorStatus, Blog, User},
    storage::validate_image,
};

pub mod account;
pub mod admin;
pub mod auth;
pub mod blogs;
pub mod comments;
pub mod engagement;

/// Resolves a live (not soft-deleted) account or fails with 404.
pub(crate) async fn live_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    state
        .repo
        .get_user(id)
        .await?
        .filter(|u| !u.is_deleted)
        .ok_or(AppError::NotFound("user"))
}

pub(crate) async fn author_status(
    state: &AppState,
    user_id: Uuid,
) -> Result<Option<AuthorStatus>, AppError> {
    Ok(state
        .repo
        .get_author_profile(user_id)
        .await?
        .map(|profile| profile.status))
}

/// Publishing rights come from an approved author profile, never from the role.
pub(crate) async fn require_approved_author(state: &AppState, user_id: Uuid) -> Result<(), AppError> {
    match author_status(state, user_id).await? {
        Some(AuthorStatus::Approved) => Ok(()),
        Some(AuthorStatus::Suspended) => Err(AppError::forbidden("your author account is suspended")),
        _ => Err(AppError::forbidden("only approved authors can publish")),
    }
}

/// A post that readers may interact with: approved and not deleted.
pub(crate) async fn published_blog(state: &AppState, id: Uuid) -> Result<Blog, AppError> {
    state
        .repo
        .get_blog(id)
        .await?
        .filter(Blog::is_published)
        .ok_or(AppError::NotFound("blog"))
}

/// An image file received as multipart form data.
pub(crate) struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("upload exceeds the size limit".to_string())
    } else {
        AppError::validation(format!("malformed multipart body: {}", err.body_text()))
    }
}

/// read_image_upload
///
/// Pulls the `file` field out of a multipart body and validates its type and size.
pub(crate) async fn read_image_upload(mut multipart: Multipart) -> Result<ImageUpload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(multipart_error)?;

        validate_image(&content_type, bytes.len())?;
        return Ok(ImageUpload {
            filename,
            content_type,
            bytes,
        });
    }
    Err(AppError::validation("multipart field `file` is required"))
}
