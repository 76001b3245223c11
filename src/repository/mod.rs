use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        AdminDashboardStats, AdminInvite, AuthorApplicationRequest, AuthorProfile, AuthorStatus,
        Blog, BlogFilter, Comment, NewAdminInvite, NewBlog, NewComment, NewSession, NewUser, Role,
        Session, UpdateBlogRequest, UpdateProfileRequest, User,
    },
    response::Pagination,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// Repository Trait
///
/// The persistence contract used by handlers and the session service. Every
/// method that checks ownership takes the acting user's id and reports "not
/// found" (`None`/`false`) rather than leaking whether the row exists.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across
/// Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;
    /// Returns soft-deleted users too; callers decide what to do with them.
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    /// Active accounts, newest first, optionally filtered by name/email substring.
    async fn list_users(
        &self,
        search: Option<String>,
        page: Pagination,
    ) -> Result<(Vec<User>, i64), AppError>;
    async fn update_user_profile(
        &self,
        id: Uuid,
        changes: UpdateProfileRequest,
    ) -> Result<Option<User>, AppError>;
    async fn set_user_avatar(&self, id: Uuid, url: String) -> Result<Option<User>, AppError>;
    async fn set_password_hash(&self, id: Uuid, password_hash: String) -> Result<bool, AppError>;
    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<bool, AppError>;
    async fn soft_delete_user(&self, id: Uuid) -> Result<bool, AppError>;

    // --- Author workflow ---
    async fn get_author_profile(&self, user_id: Uuid) -> Result<Option<AuthorProfile>, AppError>;
    /// Creates or resets the profile to `pending` with the new application text.
    async fn submit_author_application(
        &self,
        user_id: Uuid,
        application: AuthorApplicationRequest,
    ) -> Result<AuthorProfile, AppError>;
    /// Compare-and-swap on the status: returns `None` when the profile is missing
    /// or no longer in `from`.
    async fn transition_author_status(
        &self,
        user_id: Uuid,
        from: AuthorStatus,
        to: AuthorStatus,
        note: Option<String>,
        reviewer: Uuid,
    ) -> Result<Option<AuthorProfile>, AppError>;
    async fn list_author_profiles(
        &self,
        status: Option<AuthorStatus>,
        page: Pagination,
    ) -> Result<(Vec<AuthorProfile>, i64), AppError>;

    // --- Sessions ---
    /// Inserts a session and, atomically, revokes the user's oldest active sessions
    /// so that at most `max_active` remain active afterwards.
    async fn create_session(&self, session: NewSession, max_active: u32) -> Result<Session, AppError>;
    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, AppError>;
    /// Replaces the refresh hash only if it still equals `current_hash` and the
    /// session is active. Returns `false` when the swap lost.
    async fn rotate_session(
        &self,
        id: Uuid,
        current_hash: &str,
        next_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;
    async fn touch_session(&self, id: Uuid) -> Result<(), AppError>;
    async fn revoke_session(&self, id: Uuid, user_id: Uuid) -> Result<bool, AppError>;
    async fn revoke_user_sessions(&self, user_id: Uuid) -> Result<u64, AppError>;
    async fn list_active_sessions(&self, user_id: Uuid) -> Result<Vec<Session>, AppError>;
    /// Deletes sessions that expired or were revoked before `cutoff`.
    async fn purge_sessions(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;

    // --- Password resets ---
    async fn create_password_reset(
        &self,
        user_id: Uuid,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;
    /// Marks an unexpired, unused reset token as used and returns its user.
    async fn consume_password_reset(&self, token_hash: &str) -> Result<Option<Uuid>, AppError>;

    // --- Admin invites ---
    async fn create_admin_invite(&self, invite: NewAdminInvite) -> Result<AdminInvite, AppError>;
    async fn list_admin_invites(&self) -> Result<Vec<AdminInvite>, AppError>;
    async fn has_open_invite(&self, email: &str) -> Result<bool, AppError>;
    async fn revoke_admin_invite(&self, id: Uuid) -> Result<bool, AppError>;
    /// Marks the open invite matching `token_hash` and the user's email as
    /// accepted and grants the user the admin role, both or neither. Returns
    /// `None` when the invite is not open or the account is gone.
    async fn accept_admin_invite(
        &self,
        token_hash: &str,
        user_id: Uuid,
    ) -> Result<Option<AdminInvite>, AppError>;

    // --- Blogs ---
    async fn create_blog(&self, blog: NewBlog) -> Result<Blog, AppError>;
    /// Returns soft-deleted and unapproved posts too.
    async fn get_blog(&self, id: Uuid) -> Result<Option<Blog>, AppError>;
    async fn get_blog_by_slug(&self, slug: &str) -> Result<Option<Blog>, AppError>;
    /// Non-deleted posts matching the filter, newest first.
    async fn list_blogs(&self, filter: BlogFilter, page: Pagination) -> Result<(Vec<Blog>, i64), AppError>;
    /// Owner-only partial update. `reset_approval` sends the post back to moderation.
    async fn update_blog(
        &self,
        id: Uuid,
        author_id: Uuid,
        changes: UpdateBlogRequest,
        reset_approval: bool,
    ) -> Result<Option<Blog>, AppError>;
    /// Soft delete. With `author_id` only the owner's post is affected.
    async fn soft_delete_blog(&self, id: Uuid, author_id: Option<Uuid>) -> Result<bool, AppError>;
    async fn set_blog_approval(
        &self,
        id: Uuid,
        approved: bool,
        reviewer: Uuid,
    ) -> Result<Option<Blog>, AppError>;

    // --- Comments ---
    async fn create_comment(&self, comment: NewComment) -> Result<Comment, AppError>;
    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, AppError>;
    async fn update_comment(
        &self,
        id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Result<Option<Comment>, AppError>;
    /// Soft delete. With `user_id` only the author's comment is affected.
    async fn soft_delete_comment(&self, id: Uuid, user_id: Option<Uuid>) -> Result<bool, AppError>;
    /// Root comments of a post, newest first. Deleted roots are included only
    /// while they still have live replies.
    async fn list_root_comments(
        &self,
        blog_id: Uuid,
        page: Pagination,
    ) -> Result<(Vec<Comment>, i64), AppError>;
    /// Live replies under the given roots, oldest first.
    async fn list_replies(&self, root_ids: &[Uuid]) -> Result<Vec<Comment>, AppError>;

    // --- Likes & Views ---
    /// Adds the like when absent, removes it when present. Returns the new state.
    async fn toggle_like(&self, blog_id: Uuid, user_id: Uuid) -> Result<bool, AppError>;
    async fn count_likes(&self, blog_id: Uuid) -> Result<i64, AppError>;
    async fn has_liked(&self, blog_id: Uuid, user_id: Uuid) -> Result<bool, AppError>;
    /// Generic counter increment. Returns the new count, `None` for unknown posts.
    async fn increment_views(&self, blog_id: Uuid) -> Result<Option<i64>, AppError>;
    /// Idempotent per (user, post). Returns `true` only for the first view.
    async fn record_verified_view(&self, blog_id: Uuid, user_id: Uuid) -> Result<bool, AppError>;

    // --- Dashboard ---
    async fn get_stats(&self) -> Result<AdminDashboardStats, AppError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
