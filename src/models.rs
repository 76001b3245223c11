use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

// --- Roles & Author Workflow ---

/// Role
///
/// The RBAC field stored on every account. Publishing rights are not a role: they
/// come from an approved `AuthorProfile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::Internal(format!("unknown role `{other}`"))),
        }
    }
}

/// AuthorStatus
///
/// Position of a user in the author-application workflow. A user who never
/// applied has no status at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum AuthorStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl AuthorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorStatus::Pending => "pending",
            AuthorStatus::Approved => "approved",
            AuthorStatus::Rejected => "rejected",
            AuthorStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for AuthorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AuthorStatus::Pending),
            "approved" => Ok(AuthorStatus::Approved),
            "rejected" => Ok(AuthorStatus::Rejected),
            "suspended" => Ok(AuthorStatus::Suspended),
            other => Err(AppError::validation(format!("unknown author status `{other}`"))),
        }
    }
}

/// The moves an applicant or an admin can make on an author profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorAction {
    Apply,
    Approve,
    Reject,
    Suspend,
    Reinstate,
}

impl AuthorAction {
    /// Past-tense label used in messages and emails.
    pub fn verb(&self) -> &'static str {
        match self {
            AuthorAction::Apply => "submitted",
            AuthorAction::Approve => "approved",
            AuthorAction::Reject => "rejected",
            AuthorAction::Suspend => "suspended",
            AuthorAction::Reinstate => "reinstated",
        }
    }

    /// next_status
    ///
    /// The author-workflow state machine. Returns the status reached by applying
    /// `self` to `current`, or `Conflict` when the move is not allowed.
    pub fn next_status(&self, current: Option<AuthorStatus>) -> Result<AuthorStatus, AppError> {
        use AuthorStatus::*;
        match (self, current) {
            (AuthorAction::Apply, None | Some(Rejected)) => Ok(Pending),
            (AuthorAction::Approve, Some(Pending)) => Ok(Approved),
            (AuthorAction::Reject, Some(Pending)) => Ok(Rejected),
            (AuthorAction::Suspend, Some(Approved)) => Ok(Suspended),
            (AuthorAction::Reinstate, Some(Suspended)) => Ok(Approved),
            (AuthorAction::Apply, Some(status)) => Err(AppError::conflict(format!(
                "cannot apply while the application is {status}"
            ))),
            (action, None) => Err(AppError::conflict(format!(
                "cannot mark as {}: the user has not applied",
                action.verb()
            ))),
            (action, Some(status)) => Err(AppError::conflict(format!(
                "cannot mark a {status} author as {}",
                action.verb()
            ))),
        }
    }
}

// --- Core Records (Mapped to Database) ---

/// User
///
/// The canonical account record. Carries the password hash, so it is never
/// serialized; responses use `UserProfile`.
#[derive(Debug, Clone, Default)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// AuthorProfile
///
/// One row per applicant in `author_profiles`, joined with the applicant's
/// name and email for the admin review queue.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthorProfile {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub status: AuthorStatus,
    pub motivation: String,
    pub portfolio_url: Option<String>,
    pub review_note: Option<String>,
    pub reviewed_by: Option<Uuid>,
    #[ts(type = "string")]
    pub applied_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Session
///
/// A refresh-token lineage. Only the SHA-256 of the current refresh token is kept.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub refresh_token_hash: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A session is usable until it is revoked or its expiry passes.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub refresh_token_hash: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// AdminInvite
///
/// An emailed invitation to become an admin. The token itself is only stored hashed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct AdminInvite {
    pub id: Uuid,
    pub email: String,
    pub invited_by: Uuid,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[ts(type = "string | null")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl AdminInvite {
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.accepted_at.is_none() && self.revoked_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct NewAdminInvite {
    pub email: String,
    pub token_hash: String,
    pub invited_by: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Blog
///
/// A post with its author summary and engagement counters. `view_count` is the
/// generic (anonymous) counter; `verified_view_count` counts distinct readers.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, FromRow)]
#[ts(export)]
pub struct Blog {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub tags: Vec<String>,
    pub cover_image_url: Option<String>,
    pub is_approved: bool,
    #[ts(type = "string | null")]
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub is_deleted: bool,
    #[ts(type = "string | null")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub view_count: i64,
    pub verified_view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Blog {
    /// Visible to everyone: approved and not soft-deleted.
    pub fn is_published(&self) -> bool {
        self.is_approved && !self.is_deleted
    }
}

/// BlogSummary
///
/// List representation of a post (everything except the body).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BlogSummary {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub tags: Vec<String>,
    pub cover_image_url: Option<String>,
    pub is_approved: bool,
    pub view_count: i64,
    pub verified_view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<Blog> for BlogSummary {
    fn from(blog: Blog) -> Self {
        Self {
            id: blog.id,
            author_id: blog.author_id,
            author_name: blog.author_name,
            title: blog.title,
            slug: blog.slug,
            excerpt: blog.excerpt,
            tags: blog.tags,
            cover_image_url: blog.cover_image_url,
            is_approved: blog.is_approved,
            view_count: blog.view_count,
            verified_view_count: blog.verified_view_count,
            like_count: blog.like_count,
            comment_count: blog.comment_count,
            created_at: blog.created_at,
        }
    }
}

/// Detail representation: the full post plus the reader's own like state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BlogDetail {
    #[serde(flatten)]
    pub blog: Blog,
    pub liked_by_me: bool,
}

#[derive(Debug, Clone)]
pub struct NewBlog {
    pub author_id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub tags: Vec<String>,
    pub cover_image_url: Option<String>,
}

/// Which approval states a blog listing includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BlogVisibility {
    #[default]
    Approved,
    Pending,
    All,
}

/// Repository-level blog filter. Soft-deleted posts are always excluded.
#[derive(Debug, Clone, Default)]
pub struct BlogFilter {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub author_id: Option<Uuid>,
    pub visibility: BlogVisibility,
}

/// Comment
///
/// A comment row joined with its author and, for flattened replies, the user
/// being answered (`mentioned_user_*`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, FromRow)]
#[ts(export)]
pub struct Comment {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub user_id: Uuid,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    pub parent_id: Option<Uuid>,
    pub mentioned_user_id: Option<Uuid>,
    pub mentioned_user_name: Option<String>,
    pub content: String,
    pub is_deleted: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub blog_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub mentioned_user_id: Option<Uuid>,
    pub content: String,
}

/// A root comment with its (already flattened) replies.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

// --- Request Payloads (Input Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Partial profile update. Omitted fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthorApplicationRequest {
    pub motivation: String,
    #[serde(default)]
    pub portfolio_url: Option<String>,
}

/// Optional free-text note attached to a moderation decision.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct ModerationRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InviteAdminRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AcceptInviteRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CreateBlogRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
}

/// Partial blog update, applied with COALESCE semantics.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UpdateBlogRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
}

impl UpdateBlogRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.excerpt.is_none()
            && self.tags.is_none()
            && self.cover_image_url.is_none()
    }

    /// Whether applying the update would alter any stored field of `blog`.
    pub fn alters(&self, blog: &Blog) -> bool {
        self.title.as_ref().is_some_and(|t| *t != blog.title)
            || self.content.as_ref().is_some_and(|c| *c != blog.content)
            || self.excerpt.as_ref().is_some_and(|e| *e != blog.excerpt)
            || self.tags.as_ref().is_some_and(|t| *t != blog.tags)
            || self
                .cover_image_url
                .as_ref()
                .is_some_and(|url| blog.cover_image_url.as_ref() != Some(url))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateCommentRequest {
    pub content: String,
}

// --- Output Schemas ---

/// UserProfile
///
/// The public-facing account view returned by `/me` and the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub author_status: Option<AuthorStatus>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user: &User, author_status: Option<AuthorStatus>) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            bio: user.bio.clone(),
            avatar_url: user.avatar_url.clone(),
            author_status,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

/// SessionView
///
/// An active session as shown to its owner. `current` marks the session the
/// request was made with.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionView {
    pub id: Uuid,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub last_used_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
    pub current: bool,
}

impl SessionView {
    pub fn new(session: Session, current_session: Option<Uuid>) -> Self {
        Self {
            current: current_session == Some(session.id),
            id: session.id,
            user_agent: session.user_agent,
            ip_address: session.ip_address,
            created_at: session.created_at,
            last_used_at: session.last_used_at,
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LikeStatus {
    pub blog_id: Uuid,
    pub liked: bool,
    pub like_count: i64,
}

/// Counters returned by the view endpoints. `counted` tells whether this call
/// changed a counter (always true for generic views).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ViewStats {
    pub blog_id: Uuid,
    pub view_count: i64,
    pub verified_view_count: i64,
    pub counted: bool,
}

/// Multipart form accepted by the image upload endpoints (documentation only).
#[derive(Debug, ToSchema)]
pub struct ImageUploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Result of an image upload to the CMS.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UploadedAsset {
    pub asset_id: String,
    pub url: String,
}

/// AdminDashboardStats
///
/// Output schema for the administrative statistics dashboard (GET /admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq, FromRow)]
#[ts(export)]
pub struct AdminDashboardStats {
    pub total_users: i64,
    pub total_admins: i64,
    pub approved_authors: i64,
    pub pending_authors: i64,
    pub published_blogs: i64,
    pub pending_blogs: i64,
    pub total_comments: i64,
    pub total_likes: i64,
    pub total_views: i64,
    pub total_verified_views: i64,
}
