use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AuthUser, MaybeAuthUser},
    error::AppError,
    models::{
        Blog, BlogDetail, BlogFilter, BlogSummary, BlogVisibility, CreateBlogRequest,
        ImageUploadForm, NewBlog, UpdateBlogRequest, UploadedAsset,
    },
    response::{ApiResponse, ApiResult, Page, PageParams, Pagination},
    slug::unique_slug,
    validation,
};

use super::{read_image_upload, require_approved_author};

/// Attempts at drawing a fresh slug suffix before giving up.
const SLUG_ATTEMPTS: usize = 3;

// --- Filter Structs ---

/// BlogQuery
///
/// Query parameters of the public listing (GET /blogs).
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BlogQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Case-insensitive match over title, excerpt and content.
    pub search: Option<String>,
    pub tag: Option<String>,
    /// Restrict to one author's posts.
    pub author: Option<Uuid>,
}

fn validate_cover(url: Option<&str>) -> Result<Option<String>, AppError> {
    url.map(str::trim)
        .filter(|u| !u.is_empty())
        .map(|u| validation::url("cover_image_url", u))
        .transpose()
}

/// Looks a post up by UUID or, failing that, by slug.
async fn find_blog(state: &AppState, id_or_slug: &str) -> Result<Option<Blog>, AppError> {
    match Uuid::parse_str(id_or_slug) {
        Ok(id) => state.repo.get_blog(id).await,
        Err(_) => state.repo.get_blog_by_slug(id_or_slug).await,
    }
}

/// list_blogs
///
/// [Public Route] Published posts, newest first, with search and tag filters.
#[utoipa::path(
    get,
    path = "/blogs",
    params(BlogQuery),
    responses((status = 200, description = "Published posts", body = [BlogSummary]))
)]
pub async fn list_blogs(
    State(state): State<AppState>,
    Query(query): Query<BlogQuery>,
) -> ApiResult<Page<BlogSummary>> {
    let pagination = Pagination::new(query.page, query.limit);
    let filter = BlogFilter {
        search: query.search,
        tag: query.tag,
        author_id: query.author,
        visibility: BlogVisibility::Approved,
    };
    let (blogs, total) = state.repo.list_blogs(filter, pagination).await?;
    let page = Page::new(blogs, pagination, total).map(BlogSummary::from);
    Ok(ApiResponse::ok("blogs", page))
}

/// get_blog
///
/// [Public Route] A single post by id or slug. Unpublished posts are visible to
/// their author and to admins only; deleted posts are gone for everyone.
#[utoipa::path(
    get,
    path = "/blogs/{id}",
    params(("id" = String, Path, description = "Post id or slug")),
    responses(
        (status = 200, description = "Post", body = BlogDetail),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_blog(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(id_or_slug): Path<String>,
) -> ApiResult<BlogDetail> {
    let blog = find_blog(&state, &id_or_slug)
        .await?
        .filter(|b| !b.is_deleted)
        .ok_or(AppError::NotFound("blog"))?;

    let may_preview = viewer.is_admin() || viewer.id() == Some(blog.author_id);
    if !blog.is_approved && !may_preview {
        return Err(AppError::NotFound("blog"));
    }

    let liked_by_me = match viewer.id() {
        Some(user_id) => state.repo.has_liked(blog.id, user_id).await?,
        None => false,
    };
    Ok(ApiResponse::ok("blog", BlogDetail { blog, liked_by_me }))
}

/// create_blog
///
/// [Authenticated Route] Approved authors submit a post. It starts pending and
/// becomes public once an admin approves it.
#[utoipa::path(
    post,
    path = "/blogs",
    request_body = CreateBlogRequest,
    responses(
        (status = 201, description = "Post submitted for review", body = Blog),
        (status = 403, description = "Not an approved author")
    )
)]
pub async fn create_blog(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateBlogRequest>,
) -> ApiResult<Blog> {
    require_approved_author(&state, user.id).await?;

    let title = validation::blog_title(&payload.title)?;
    let content = validation::blog_content(&payload.content)?;
    let excerpt = match payload.excerpt.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(excerpt) => validation::excerpt(excerpt)?,
        None => validation::derive_excerpt(&content),
    };
    let tags = validation::tags(&payload.tags)?;
    let cover_image_url = validate_cover(payload.cover_image_url.as_deref())?;

    let mut attempt = 0;
    let blog = loop {
        attempt += 1;
        let result = state
            .repo
            .create_blog(NewBlog {
                author_id: user.id,
                title: title.clone(),
                slug: unique_slug(&title),
                excerpt: excerpt.clone(),
                content: content.clone(),
                tags: tags.clone(),
                cover_image_url: cover_image_url.clone(),
            })
            .await;
        match result {
            Err(AppError::Conflict(_)) if attempt < SLUG_ATTEMPTS => continue,
            other => break other?,
        }
    };

    tracing::info!(blog_id = %blog.id, author_id = %user.id, "blog submitted");
    Ok(ApiResponse::created("blog submitted for review", blog))
}

/// update_blog
///
/// [Authenticated Route] Owner-only partial update. Actually changing an
/// approved post sends it back to moderation; the slug never changes.
#[utoipa::path(
    put,
    path = "/blogs/{id}",
    params(("id" = Uuid, Path, description = "Post id")),
    request_body = UpdateBlogRequest,
    responses(
        (status = 200, description = "Post updated", body = Blog),
        (status = 403, description = "Not the owner or not an approved author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_blog(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBlogRequest>,
) -> ApiResult<Blog> {
    require_approved_author(&state, user.id).await?;
    if payload.is_empty() {
        return Err(AppError::validation("no changes supplied"));
    }

    let changes = UpdateBlogRequest {
        title: payload.title.as_deref().map(validation::blog_title).transpose()?,
        content: payload.content.as_deref().map(validation::blog_content).transpose()?,
        excerpt: payload.excerpt.as_deref().map(validation::excerpt).transpose()?,
        tags: payload.tags.as_deref().map(validation::tags).transpose()?,
        cover_image_url: validate_cover(payload.cover_image_url.as_deref())?,
    };

    let existing = state
        .repo
        .get_blog(id)
        .await?
        .filter(|b| !b.is_deleted)
        .ok_or(AppError::NotFound("blog"))?;
    if existing.author_id != user.id {
        return Err(AppError::forbidden("only the author can edit this post"));
    }

    let resubmitted = existing.is_approved && changes.alters(&existing);
    let blog = state
        .repo
        .update_blog(id, user.id, changes, resubmitted)
        .await?
        .ok_or(AppError::NotFound("blog"))?;

    let message = if resubmitted {
        "blog updated and resubmitted for review"
    } else {
        "blog updated"
    };
    Ok(ApiResponse::ok(message, blog))
}

/// delete_blog
///
/// [Authenticated Route] Owner-only soft delete.
#[utoipa::path(
    delete,
    path = "/blogs/{id}",
    params(("id" = Uuid, Path, description = "Post id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not Found or not the owner")
    )
)]
pub async fn delete_blog(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    if !state.repo.soft_delete_blog(id, Some(user.id)).await? {
        return Err(AppError::NotFound("blog"));
    }
    tracing::info!(blog_id = %id, user_id = %user.id, "blog deleted");
    Ok(ApiResponse::message("blog deleted"))
}

/// my_blogs
///
/// [Authenticated Route] The caller's own posts in every approval state.
#[utoipa::path(
    get,
    path = "/me/blogs",
    params(PageParams),
    responses((status = 200, description = "My posts", body = [BlogSummary]))
)]
pub async fn my_blogs(
    user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Page<BlogSummary>> {
    let pagination = Pagination::from(params);
    let filter = BlogFilter {
        author_id: Some(user.id),
        visibility: BlogVisibility::All,
        ..BlogFilter::default()
    };
    let (blogs, total) = state.repo.list_blogs(filter, pagination).await?;
    Ok(ApiResponse::ok(
        "my blogs",
        Page::new(blogs, pagination, total).map(BlogSummary::from),
    ))
}

/// upload_image
///
/// [Authenticated Route] Approved authors upload cover or inline images. The
/// returned URL can be used as `cover_image_url`.
#[utoipa::path(
    post,
    path = "/uploads/images",
    request_body(content = ImageUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image stored", body = UploadedAsset),
        (status = 400, description = "Unsupported file"),
        (status = 403, description = "Not an approved author"),
        (status = 413, description = "File too large"),
        (status = 502, description = "Upstream storage failed")
    )
)]
pub async fn upload_image(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<UploadedAsset> {
    require_approved_author(&state, user.id).await?;
    let upload = read_image_upload(multipart).await?;
    let asset = state
        .storage
        .upload_image(&upload.filename, &upload.content_type, upload.bytes)
        .await?;
    tracing::info!(user_id = %user.id, asset_id = %asset.asset_id, "image uploaded");
    Ok(ApiResponse::created("image uploaded", asset))
}
