use axum::extract::{Path, State};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AuthUser, MaybeAuthUser},
    error::AppError,
    models::{LikeStatus, ViewStats},
    response::{ApiResponse, ApiResult},
};

use super::published_blog;

/// toggle_like
///
/// [Authenticated Route] Likes the post, or removes the caller's like if present.
/// The `(blog_id, user_id)` key allows at most one like per reader.
#[utoipa::path(
    post,
    path = "/blogs/{id}/like",
    params(("id" = Uuid, Path, description = "Post id")),
    responses(
        (status = 200, description = "Like toggled", body = LikeStatus),
        (status = 404, description = "Not Found")
    )
)]
pub async fn toggle_like(
    user: AuthUser,
    State(state): State<AppState>,
    Path(blog_id): Path<Uuid>,
) -> ApiResult<LikeStatus> {
    published_blog(&state, blog_id).await?;
    let liked = state.repo.toggle_like(blog_id, user.id).await?;
    let like_count = state.repo.count_likes(blog_id).await?;

    let message = if liked { "blog liked" } else { "like removed" };
    Ok(ApiResponse::ok(
        message,
        LikeStatus {
            blog_id,
            liked,
            like_count,
        },
    ))
}

#[utoipa::path(
    get,
    path = "/blogs/{id}/likes",
    params(("id" = Uuid, Path, description = "Post id")),
    responses(
        (status = 200, description = "Like count and the caller's state", body = LikeStatus),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_likes(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(blog_id): Path<Uuid>,
) -> ApiResult<LikeStatus> {
    let blog = published_blog(&state, blog_id).await?;
    let liked = match viewer.id() {
        Some(user_id) => state.repo.has_liked(blog_id, user_id).await?,
        None => false,
    };
    Ok(ApiResponse::ok(
        "likes",
        LikeStatus {
            blog_id,
            liked,
            like_count: blog.like_count,
        },
    ))
}

/// record_view
///
/// [Public Route] Generic view counter. Every call counts.
#[utoipa::path(
    post,
    path = "/blogs/{id}/views",
    params(("id" = Uuid, Path, description = "Post id")),
    responses(
        (status = 200, description = "View counted", body = ViewStats),
        (status = 404, description = "Not Found")
    )
)]
pub async fn record_view(
    State(state): State<AppState>,
    Path(blog_id): Path<Uuid>,
) -> ApiResult<ViewStats> {
    let blog = published_blog(&state, blog_id).await?;
    let view_count = state
        .repo
        .increment_views(blog_id)
        .await?
        .ok_or(AppError::NotFound("blog"))?;
    Ok(ApiResponse::ok(
        "view recorded",
        ViewStats {
            blog_id,
            view_count,
            verified_view_count: blog.verified_view_count,
            counted: true,
        },
    ))
}

/// record_verified_view
///
/// [Authenticated Route] Counts the caller as a reader of the post once.
/// Repeated calls succeed with `counted = false`.
#[utoipa::path(
    post,
    path = "/blogs/{id}/views/verified",
    params(("id" = Uuid, Path, description = "Post id")),
    responses(
        (status = 200, description = "Verified view state", body = ViewStats),
        (status = 404, description = "Not Found")
    )
)]
pub async fn record_verified_view(
    user: AuthUser,
    State(state): State<AppState>,
    Path(blog_id): Path<Uuid>,
) -> ApiResult<ViewStats> {
    let blog = published_blog(&state, blog_id).await?;
    let counted = state.repo.record_verified_view(blog_id, user.id).await?;

    let message = if counted {
        "verified view recorded"
    } else {
        "view already recorded"
    };
    Ok(ApiResponse::ok(
        message,
        ViewStats {
            blog_id,
            view_count: blog.view_count,
            verified_view_count: blog.verified_view_count + i64::from(counted),
            counted,
        },
    ))
}
