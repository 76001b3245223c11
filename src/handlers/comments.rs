use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    models::{Comment, CommentThread, CreateCommentRequest, NewComment, UpdateCommentRequest},
    response::{ApiResponse, ApiResult, Page, PageParams, Pagination},
    threading::{assemble_threads, place_reply},
    validation,
};

use super::published_blog;

/// list_comments
///
/// [Public Route] Root comments of a published post, newest first, each with
/// its replies oldest first. Pagination applies to roots.
#[utoipa::path(
    get,
    path = "/blogs/{id}/comments",
    params(("id" = Uuid, Path, description = "Post id"), PageParams),
    responses(
        (status = 200, description = "Comment threads", body = [CommentThread]),
        (status = 404, description = "Not Found")
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(blog_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> ApiResult<Page<CommentThread>> {
    published_blog(&state, blog_id).await?;
    let pagination = Pagination::from(params);

    let (roots, total) = state.repo.list_root_comments(blog_id, pagination).await?;
    let root_ids: Vec<Uuid> = roots.iter().map(|c| c.id).collect();
    let replies = state.repo.list_replies(&root_ids).await?;

    let threads = assemble_threads(roots, replies);
    Ok(ApiResponse::ok("comments", Page::new(threads, pagination, total)))
}

/// create_comment
///
/// [Authenticated Route] Comments on a published post. A reply to a reply is
/// stored under the thread's root and mentions the replied-to author.
#[utoipa::path(
    post,
    path = "/blogs/{id}/comments",
    params(("id" = Uuid, Path, description = "Post id")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 400, description = "Invalid content or parent on another post"),
        (status = 404, description = "Post or parent comment not found")
    )
)]
pub async fn create_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(blog_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> ApiResult<Comment> {
    let content = validation::comment(&payload.content)?;
    published_blog(&state, blog_id).await?;

    let target = match payload.parent_id {
        Some(parent_id) => Some(
            state
                .repo
                .get_comment(parent_id)
                .await?
                .ok_or(AppError::NotFound("parent comment"))?,
        ),
        None => None,
    };
    let placement = place_reply(user.id, blog_id, target.as_ref())?;

    let comment = state
        .repo
        .create_comment(NewComment {
            blog_id,
            user_id: user.id,
            parent_id: placement.parent_id,
            mentioned_user_id: placement.mentioned_user_id,
            content,
        })
        .await?;
    tracing::info!(comment_id = %comment.id, %blog_id, "comment added");
    Ok(ApiResponse::created("comment added", comment))
}

/// update_comment
///
/// [Authenticated Route] Owner-only edit of a live comment.
#[utoipa::path(
    put,
    path = "/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment id")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = Comment),
        (status = 404, description = "Not Found or not the owner")
    )
)]
pub async fn update_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCommentRequest>,
) -> ApiResult<Comment> {
    let content = validation::comment(&payload.content)?;
    let comment = state
        .repo
        .update_comment(id, user.id, content)
        .await?
        .ok_or(AppError::NotFound("comment"))?;
    Ok(ApiResponse::ok("comment updated", comment))
}

/// delete_comment
///
/// [Authenticated Route] Soft delete by the comment's author or by an admin.
#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not Found or not the owner")
    )
)]
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    let owner_filter = (!user.is_admin()).then_some(user.id);
    if !state.repo.soft_delete_comment(id, owner_filter).await? {
        return Err(AppError::NotFound("comment"));
    }
    tracing::info!(comment_id = %id, user_id = %user.id, "comment deleted");
    Ok(ApiResponse::message("comment deleted"))
}
