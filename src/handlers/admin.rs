use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AdminUser, AuthUser},
    error::AppError,
    mail,
    models::{
        AcceptInviteRequest, AdminDashboardStats, AdminInvite, AuthorAction, AuthorProfile,
        AuthorStatus, Blog, BlogFilter, BlogSummary, BlogVisibility, InviteAdminRequest,
        ModerationRequest, NewAdminInvite, Role, UserProfile,
    },
    response::{ApiResponse, ApiResult, Page, Pagination},
    tokens::{hash_token, random_token},
    validation,
};

use super::{author_status, live_user};

// --- Filter Structs ---

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Substring match on name or email.
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuthorQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Only profiles in this status. All statuses when omitted.
    pub status: Option<AuthorStatus>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminBlogQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// `pending` (default), `approved` or `all`.
    pub status: Option<BlogVisibility>,
    pub search: Option<String>,
}

/// The admin decisions on an author profile, as they appear in the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthorDecision {
    Approve,
    Reject,
    Suspend,
    Reinstate,
}

impl From<AuthorDecision> for AuthorAction {
    fn from(decision: AuthorDecision) -> Self {
        match decision {
            AuthorDecision::Approve => AuthorAction::Approve,
            AuthorDecision::Reject => AuthorAction::Reject,
            AuthorDecision::Suspend => AuthorAction::Suspend,
            AuthorDecision::Reinstate => AuthorAction::Reinstate,
        }
    }
}

// --- Dashboard & Users ---

/// get_admin_stats
///
/// [Admin Route] Platform-wide counters for the dashboard.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses(
        (status = 200, description = "Stats", body = AdminDashboardStats),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn get_admin_stats(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<AdminDashboardStats> {
    let stats = state.repo.get_stats().await?;
    Ok(ApiResponse::ok("stats", stats))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    params(UserQuery),
    responses((status = 200, description = "Accounts", body = [UserProfile]))
)]
pub async fn list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Page<UserProfile>> {
    let pagination = Pagination::new(query.page, query.limit);
    let (users, total) = state.repo.list_users(query.search, pagination).await?;

    let mut profiles = Vec::with_capacity(users.len());
    for user in &users {
        profiles.push(UserProfile::new(user, author_status(&state, user.id).await?));
    }
    Ok(ApiResponse::ok("users", Page::new(profiles, pagination, total)))
}

// --- Author Moderation ---

#[utoipa::path(
    get,
    path = "/admin/authors",
    params(AuthorQuery),
    responses((status = 200, description = "Author profiles", body = [AuthorProfile]))
)]
pub async fn list_authors(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<AuthorQuery>,
) -> ApiResult<Page<AuthorProfile>> {
    let pagination = Pagination::new(query.page, query.limit);
    let (profiles, total) = state
        .repo
        .list_author_profiles(query.status, pagination)
        .await?;
    Ok(ApiResponse::ok("author profiles", Page::new(profiles, pagination, total)))
}

/// moderate_author
///
/// [Admin Route] Applies a decision to an author profile. The update is a
/// compare-and-swap on the status read here, so two admins acting at once
/// cannot both succeed. The applicant is emailed.
#[utoipa::path(
    put,
    path = "/admin/authors/{id}/{decision}",
    params(
        ("id" = Uuid, Path, description = "Applicant user id"),
        ("decision" = AuthorDecision, Path, description = "approve, reject, suspend or reinstate")
    ),
    request_body = ModerationRequest,
    responses(
        (status = 200, description = "Decision stored", body = AuthorProfile),
        (status = 404, description = "No application"),
        (status = 409, description = "Transition not allowed from the current status")
    )
)]
pub async fn moderate_author(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path((user_id, decision)): Path<(Uuid, AuthorDecision)>,
    payload: Option<Json<ModerationRequest>>,
) -> ApiResult<AuthorProfile> {
    let note = match payload {
        Some(Json(body)) => validation::reason(body.reason.as_deref())?,
        None => None,
    };
    let action = AuthorAction::from(decision);

    let current = state
        .repo
        .get_author_profile(user_id)
        .await?
        .ok_or(AppError::NotFound("author application"))?;
    let next = action.next_status(Some(current.status))?;

    let profile = state
        .repo
        .transition_author_status(user_id, current.status, next, note.clone(), admin.id)
        .await?
        .ok_or_else(|| AppError::conflict("the application was modified concurrently"))?;

    tracing::info!(
        %user_id,
        admin_id = %admin.id,
        from = %current.status,
        to = %profile.status,
        "author status changed"
    );
    mail::deliver(
        &state.mailer,
        mail::author_decision(&profile.email, &profile.name, action, note.as_deref()),
    )
    .await;

    Ok(ApiResponse::ok(
        format!("author {}", action.verb()),
        profile,
    ))
}

// --- Blog Moderation ---

#[utoipa::path(
    get,
    path = "/admin/blogs",
    params(AdminBlogQuery),
    responses((status = 200, description = "Posts for review", body = [BlogSummary]))
)]
pub async fn list_admin_blogs(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<AdminBlogQuery>,
) -> ApiResult<Page<BlogSummary>> {
    let pagination = Pagination::new(query.page, query.limit);
    let filter = BlogFilter {
        search: query.search,
        visibility: query.status.unwrap_or(BlogVisibility::Pending),
        ..BlogFilter::default()
    };
    let (blogs, total) = state.repo.list_blogs(filter, pagination).await?;
    Ok(ApiResponse::ok(
        "blogs",
        Page::new(blogs, pagination, total).map(BlogSummary::from),
    ))
}

async fn set_approval(
    state: &AppState,
    admin: &AuthUser,
    blog_id: Uuid,
    approved: bool,
) -> Result<Blog, AppError> {
    let blog = state
        .repo
        .set_blog_approval(blog_id, approved, admin.id)
        .await?
        .ok_or(AppError::NotFound("blog"))?;
    tracing::info!(%blog_id, admin_id = %admin.id, approved, "blog moderation");

    if let Ok(author) = live_user(state, blog.author_id).await {
        mail::deliver(
            &state.mailer,
            mail::blog_decision(&author.email, &author.name, &blog.title, approved),
        )
        .await;
    }
    Ok(blog)
}

/// approve_blog
///
/// [Admin Route] Publishes a post.
#[utoipa::path(
    put,
    path = "/admin/blogs/{id}/approve",
    params(("id" = Uuid, Path, description = "Post id")),
    responses((status = 200, description = "Published", body = Blog), (status = 404, description = "Not Found"))
)]
pub async fn approve_blog(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Blog> {
    let blog = set_approval(&state, &admin, id, true).await?;
    Ok(ApiResponse::ok("blog approved", blog))
}

/// unapprove_blog
///
/// [Admin Route] Takes a post back into moderation.
#[utoipa::path(
    put,
    path = "/admin/blogs/{id}/unapprove",
    params(("id" = Uuid, Path, description = "Post id")),
    responses((status = 200, description = "Unpublished", body = Blog), (status = 404, description = "Not Found"))
)]
pub async fn unapprove_blog(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Blog> {
    let blog = set_approval(&state, &admin, id, false).await?;
    Ok(ApiResponse::ok("blog unapproved", blog))
}

/// admin_delete_blog
///
/// [Admin Route] Soft-deletes any post.
#[utoipa::path(
    delete,
    path = "/admin/blogs/{id}",
    params(("id" = Uuid, Path, description = "Post id")),
    responses((status = 200, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn admin_delete_blog(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    if !state.repo.soft_delete_blog(id, None).await? {
        return Err(AppError::NotFound("blog"));
    }
    tracing::info!(blog_id = %id, admin_id = %admin.id, "blog removed by admin");
    Ok(ApiResponse::message("blog deleted"))
}

// --- Admin Invites ---

/// create_invite
///
/// [Admin Route] Emails a single-use invitation to become an admin. The link
/// only works for an account registered under the invited address.
#[utoipa::path(
    post,
    path = "/admin/invites",
    request_body = InviteAdminRequest,
    responses(
        (status = 201, description = "Invite sent", body = AdminInvite),
        (status = 409, description = "Already an admin or an invite is pending")
    )
)]
pub async fn create_invite(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<InviteAdminRequest>,
) -> ApiResult<AdminInvite> {
    let email = validation::email(&payload.email)?;

    if let Some(existing) = state.repo.get_user_by_email(&email).await? {
        if existing.role.is_admin() && !existing.is_deleted {
            return Err(AppError::conflict("this account is already an admin"));
        }
    }
    if state.repo.has_open_invite(&email).await? {
        return Err(AppError::conflict("an invite for this email is still pending"));
    }

    let token = random_token();
    let ttl = state.config.admin_invite_ttl_secs;
    let invite = state
        .repo
        .create_admin_invite(NewAdminInvite {
            email: email.clone(),
            token_hash: hash_token(&token),
            invited_by: admin.id,
            expires_at: Utc::now() + Duration::seconds(ttl),
        })
        .await?;

    let inviter = live_user(&state, admin.id).await?;
    let link = format!("{}/admin-invite?token={token}", state.config.frontend_url);
    mail::deliver(
        &state.mailer,
        mail::admin_invite(&email, &inviter.name, &link, ttl / 3600),
    )
    .await;

    tracing::info!(invite_id = %invite.id, admin_id = %admin.id, "admin invite created");
    Ok(ApiResponse::created("invite sent", invite))
}

#[utoipa::path(
    get,
    path = "/admin/invites",
    responses((status = 200, description = "All invites", body = [AdminInvite]))
)]
pub async fn list_invites(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Vec<AdminInvite>> {
    let invites = state.repo.list_admin_invites().await?;
    Ok(ApiResponse::ok("invites", invites))
}

#[utoipa::path(
    delete,
    path = "/admin/invites/{id}",
    params(("id" = Uuid, Path, description = "Invite id")),
    responses((status = 200, description = "Invite revoked"), (status = 404, description = "No open invite"))
)]
pub async fn revoke_invite(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    if !state.repo.revoke_admin_invite(id).await? {
        return Err(AppError::NotFound("invite"));
    }
    Ok(ApiResponse::message("invite revoked"))
}

/// accept_invite
///
/// [Authenticated Route] Redeems an invite addressed to the caller's email and
/// grants the admin role.
#[utoipa::path(
    post,
    path = "/admin-invites/accept",
    request_body = AcceptInviteRequest,
    responses(
        (status = 200, description = "Role granted", body = UserProfile),
        (status = 400, description = "Invite invalid or expired"),
        (status = 409, description = "Already an admin")
    )
)]
pub async fn accept_invite(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<AcceptInviteRequest>,
) -> ApiResult<UserProfile> {
    let mut account = live_user(&state, user.id).await?;
    if account.role.is_admin() {
        return Err(AppError::conflict("you are already an admin"));
    }

    state
        .repo
        .accept_admin_invite(&hash_token(payload.token.trim()), user.id)
        .await?
        .ok_or_else(|| AppError::validation("invite is invalid or has expired"))?;
    account.role = Role::Admin;

    tracing::info!(user_id = %user.id, "admin invite accepted");
    let status = author_status(&state, user.id).await?;
    Ok(ApiResponse::ok("you are now an admin", UserProfile::new(&account, status)))
}
