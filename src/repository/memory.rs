use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::Repository;
use crate::{
    error::AppError,
    models::{
        AdminDashboardStats, AdminInvite, AuthorApplicationRequest, AuthorProfile, AuthorStatus,
        Blog, BlogFilter, BlogVisibility, Comment, NewAdminInvite, NewBlog, NewComment, NewSession,
        NewUser, Role, Session, UpdateBlogRequest, UpdateProfileRequest, User,
    },
    response::Pagination,
};

struct AuthorRecord {
    status: AuthorStatus,
    motivation: String,
    portfolio_url: Option<String>,
    review_note: Option<String>,
    reviewed_by: Option<Uuid>,
    applied_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
}

struct ResetRecord {
    user_id: Uuid,
    token_hash: String,
    expires_at: DateTime<Utc>,
    used: bool,
}

struct InviteRecord {
    invite: AdminInvite,
    token_hash: String,
}

#[derive(Default)]
struct State {
    users: Vec<User>,
    authors: HashMap<Uuid, AuthorRecord>,
    sessions: HashMap<Uuid, Session>,
    resets: Vec<ResetRecord>,
    invites: Vec<InviteRecord>,
    blogs: Vec<Blog>,
    comments: Vec<Comment>,
    likes: HashSet<(Uuid, Uuid)>,
    views: HashSet<(Uuid, Uuid)>,
}

impl State {
    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn live_user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id && !u.is_deleted)
    }

    fn author_profile(&self, user_id: Uuid) -> Option<AuthorProfile> {
        let record = self.authors.get(&user_id)?;
        let user = self.user(user_id)?;
        Some(AuthorProfile {
            user_id,
            name: user.name.clone(),
            email: user.email.clone(),
            status: record.status,
            motivation: record.motivation.clone(),
            portfolio_url: record.portfolio_url.clone(),
            review_note: record.review_note.clone(),
            reviewed_by: record.reviewed_by,
            applied_at: record.applied_at,
            reviewed_at: record.reviewed_at,
        })
    }

    /// Fills the joined author columns and the derived counters, like the SQL select does.
    fn hydrate_blog(&self, blog: &Blog) -> Blog {
        let mut out = blog.clone();
        if let Some(author) = self.user(blog.author_id) {
            out.author_name = author.name.clone();
            out.author_avatar_url = author.avatar_url.clone();
        }
        out.like_count = self.likes.iter().filter(|(b, _)| *b == blog.id).count() as i64;
        out.verified_view_count = self.views.iter().filter(|(b, _)| *b == blog.id).count() as i64;
        out.comment_count = self
            .comments
            .iter()
            .filter(|c| c.blog_id == blog.id && !c.is_deleted)
            .count() as i64;
        out
    }

    fn blog(&self, id: Uuid) -> Option<Blog> {
        self.blogs.iter().find(|b| b.id == id).map(|b| self.hydrate_blog(b))
    }

    fn hydrate_comment(&self, comment: &Comment) -> Comment {
        let mut out = comment.clone();
        if let Some(author) = self.user(comment.user_id) {
            out.author_name = author.name.clone();
            out.author_avatar_url = author.avatar_url.clone();
        }
        out.mentioned_user_name = comment
            .mentioned_user_id
            .and_then(|id| self.user(id))
            .map(|u| u.name.clone());
        out
    }

    fn comment(&self, id: Uuid) -> Option<Comment> {
        self.comments
            .iter()
            .find(|c| c.id == id)
            .map(|c| self.hydrate_comment(c))
    }

    fn has_live_reply(&self, root_id: Uuid) -> bool {
        self.comments
            .iter()
            .any(|c| c.parent_id == Some(root_id) && !c.is_deleted)
    }
}

fn paginate<T>(mut items: Vec<T>, page: Pagination) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let start = (page.offset() as usize).min(items.len());
    let end = (start + page.limit() as usize).min(items.len());
    (items.drain(start..end).collect(), total)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// MemoryRepository
///
/// An in-process `Repository` used by the test suite and for running the API
/// without a database. Mirrors the Postgres implementation's semantics.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    // --- USERS ---

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut state = self.state();
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::conflict("an account with this email already exists"));
        }
        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            bio: None,
            avatar_url: None,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state().user(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.state().users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(
        &self,
        search: Option<String>,
        page: Pagination,
    ) -> Result<(Vec<User>, i64), AppError> {
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let state = self.state();
        let mut users: Vec<User> = state
            .users
            .iter()
            .filter(|u| !u.is_deleted)
            .filter(|u| match &needle {
                Some(n) => contains_ci(&u.name, n) || contains_ci(&u.email, n),
                None => true,
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(users, page))
    }

    async fn update_user_profile(
        &self,
        id: Uuid,
        changes: UpdateProfileRequest,
    ) -> Result<Option<User>, AppError> {
        let mut state = self.state();
        let Some(user) = state.live_user_mut(id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(bio) = changes.bio {
            user.bio = Some(bio);
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn set_user_avatar(&self, id: Uuid, url: String) -> Result<Option<User>, AppError> {
        let mut state = self.state();
        let Some(user) = state.live_user_mut(id) else {
            return Ok(None);
        };
        user.avatar_url = Some(url);
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: String) -> Result<bool, AppError> {
        let mut state = self.state();
        Ok(state
            .live_user_mut(id)
            .map(|user| {
                user.password_hash = password_hash;
                user.updated_at = Utc::now();
            })
            .is_some())
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<bool, AppError> {
        let mut state = self.state();
        Ok(state
            .live_user_mut(id)
            .map(|user| {
                user.role = role;
                user.updated_at = Utc::now();
            })
            .is_some())
    }

    async fn soft_delete_user(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state();
        Ok(state
            .live_user_mut(id)
            .map(|user| {
                let now = Utc::now();
                user.is_deleted = true;
                user.deleted_at = Some(now);
                user.updated_at = now;
            })
            .is_some())
    }

    // --- AUTHOR WORKFLOW ---

    async fn get_author_profile(&self, user_id: Uuid) -> Result<Option<AuthorProfile>, AppError> {
        Ok(self.state().author_profile(user_id))
    }

    async fn submit_author_application(
        &self,
        user_id: Uuid,
        application: AuthorApplicationRequest,
    ) -> Result<AuthorProfile, AppError> {
        let mut state = self.state();
        if let Some(existing) = state.authors.get(&user_id) {
            if existing.status != AuthorStatus::Rejected {
                return Err(AppError::conflict("an application is already on file"));
            }
        }
        state.authors.insert(
            user_id,
            AuthorRecord {
                status: AuthorStatus::Pending,
                motivation: application.motivation,
                portfolio_url: application.portfolio_url,
                review_note: None,
                reviewed_by: None,
                applied_at: Utc::now(),
                reviewed_at: None,
            },
        );
        state
            .author_profile(user_id)
            .ok_or(AppError::NotFound("author profile"))
    }

    async fn transition_author_status(
        &self,
        user_id: Uuid,
        from: AuthorStatus,
        to: AuthorStatus,
        note: Option<String>,
        reviewer: Uuid,
    ) -> Result<Option<AuthorProfile>, AppError> {
        let mut state = self.state();
        match state.authors.get_mut(&user_id) {
            Some(record) if record.status == from => {
                record.status = to;
                record.review_note = note;
                record.reviewed_by = Some(reviewer);
                record.reviewed_at = Some(Utc::now());
            }
            _ => return Ok(None),
        }
        Ok(state.author_profile(user_id))
    }

    async fn list_author_profiles(
        &self,
        status: Option<AuthorStatus>,
        page: Pagination,
    ) -> Result<(Vec<AuthorProfile>, i64), AppError> {
        let state = self.state();
        let mut profiles: Vec<AuthorProfile> = state
            .authors
            .iter()
            .filter(|(_, record)| status.is_none_or(|s| record.status == s))
            .filter_map(|(id, _)| state.author_profile(*id))
            .collect();
        profiles.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));
        Ok(paginate(profiles, page))
    }

    // --- SESSIONS ---

    async fn create_session(&self, session: NewSession, max_active: u32) -> Result<Session, AppError> {
        let keep = max_active.max(1) as usize - 1;
        let now = Utc::now();
        let mut state = self.state();

        let mut active: Vec<&mut Session> = state
            .sessions
            .values_mut()
            .filter(|s| s.user_id == session.user_id && s.is_active(now))
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        for stale in active.into_iter().skip(keep) {
            stale.revoked_at = Some(now);
        }

        let created = Session {
            id: session.id,
            user_id: session.user_id,
            refresh_token_hash: session.refresh_token_hash,
            user_agent: session.user_agent,
            ip_address: session.ip_address,
            created_at: now,
            last_used_at: now,
            expires_at: session.expires_at,
            revoked_at: None,
        };
        state.sessions.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        Ok(self.state().sessions.get(&id).cloned())
    }

    async fn rotate_session(
        &self,
        id: Uuid,
        current_hash: &str,
        next_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let now = Utc::now();
        let mut state = self.state();
        match state.sessions.get_mut(&id) {
            Some(session) if session.refresh_token_hash == current_hash && session.is_active(now) => {
                session.refresh_token_hash = next_hash;
                session.expires_at = expires_at;
                session.last_used_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn touch_session(&self, id: Uuid) -> Result<(), AppError> {
        if let Some(session) = self.state().sessions.get_mut(&id) {
            session.last_used_at = Utc::now();
        }
        Ok(())
    }

    async fn revoke_session(&self, id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state();
        match state.sessions.get_mut(&id) {
            Some(session) if session.user_id == user_id && session.revoked_at.is_none() => {
                session.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_user_sessions(&self, user_id: Uuid) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut revoked = 0;
        for session in self.state().sessions.values_mut() {
            if session.user_id == user_id && session.revoked_at.is_none() {
                session.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn list_active_sessions(&self, user_id: Uuid) -> Result<Vec<Session>, AppError> {
        let now = Utc::now();
        let mut sessions: Vec<Session> = self
            .state()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.is_active(now))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
        Ok(sessions)
    }

    async fn purge_sessions(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut state = self.state();
        let before = state.sessions.len();
        state
            .sessions
            .retain(|_, s| !(s.expires_at < cutoff || s.revoked_at.is_some_and(|r| r < cutoff)));
        Ok((before - state.sessions.len()) as u64)
    }

    // --- PASSWORD RESETS ---

    async fn create_password_reset(
        &self,
        user_id: Uuid,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut state = self.state();
        for reset in state.resets.iter_mut().filter(|r| r.user_id == user_id) {
            reset.used = true;
        }
        state.resets.push(ResetRecord {
            user_id,
            token_hash,
            expires_at,
            used: false,
        });
        Ok(())
    }

    async fn consume_password_reset(&self, token_hash: &str) -> Result<Option<Uuid>, AppError> {
        let now = Utc::now();
        let mut state = self.state();
        Ok(state
            .resets
            .iter_mut()
            .find(|r| r.token_hash == token_hash && !r.used && r.expires_at > now)
            .map(|reset| {
                reset.used = true;
                reset.user_id
            }))
    }

    // --- ADMIN INVITES ---

    async fn create_admin_invite(&self, invite: NewAdminInvite) -> Result<AdminInvite, AppError> {
        let created = AdminInvite {
            id: Uuid::new_v4(),
            email: invite.email,
            invited_by: invite.invited_by,
            expires_at: invite.expires_at,
            accepted_at: None,
            revoked_at: None,
            created_at: Utc::now(),
        };
        self.state().invites.push(InviteRecord {
            invite: created.clone(),
            token_hash: invite.token_hash,
        });
        Ok(created)
    }

    async fn list_admin_invites(&self) -> Result<Vec<AdminInvite>, AppError> {
        let mut invites: Vec<AdminInvite> =
            self.state().invites.iter().map(|r| r.invite.clone()).collect();
        invites.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invites)
    }

    async fn has_open_invite(&self, email: &str) -> Result<bool, AppError> {
        let now = Utc::now();
        Ok(self
            .state()
            .invites
            .iter()
            .any(|r| r.invite.email.eq_ignore_ascii_case(email) && r.invite.is_open(now)))
    }

    async fn revoke_admin_invite(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state();
        match state.invites.iter_mut().find(|r| r.invite.id == id) {
            Some(r) if r.invite.accepted_at.is_none() && r.invite.revoked_at.is_none() => {
                r.invite.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn accept_admin_invite(
        &self,
        token_hash: &str,
        user_id: Uuid,
    ) -> Result<Option<AdminInvite>, AppError> {
        let now = Utc::now();
        let mut state = self.state();
        let Some(email) = state.live_user_mut(user_id).map(|u| u.email.clone()) else {
            return Ok(None);
        };
        let Some(record) = state.invites.iter_mut().find(|r| {
            r.token_hash == token_hash
                && r.invite.email.eq_ignore_ascii_case(&email)
                && r.invite.is_open(now)
        }) else {
            return Ok(None);
        };
        record.invite.accepted_at = Some(now);
        let invite = record.invite.clone();

        if let Some(user) = state.live_user_mut(user_id) {
            user.role = Role::Admin;
            user.updated_at = now;
        }
        Ok(Some(invite))
    }

    // --- BLOGS ---

    async fn create_blog(&self, blog: NewBlog) -> Result<Blog, AppError> {
        let mut state = self.state();
        if state.blogs.iter().any(|b| b.slug == blog.slug) {
            return Err(AppError::conflict("a post with this slug already exists"));
        }
        let now = Utc::now();
        let created = Blog {
            id: Uuid::new_v4(),
            author_id: blog.author_id,
            title: blog.title,
            slug: blog.slug,
            excerpt: blog.excerpt,
            content: blog.content,
            tags: blog.tags,
            cover_image_url: blog.cover_image_url,
            created_at: now,
            updated_at: now,
            ..Blog::default()
        };
        let hydrated = state.hydrate_blog(&created);
        state.blogs.push(created);
        Ok(hydrated)
    }

    async fn get_blog(&self, id: Uuid) -> Result<Option<Blog>, AppError> {
        Ok(self.state().blog(id))
    }

    async fn get_blog_by_slug(&self, slug: &str) -> Result<Option<Blog>, AppError> {
        let state = self.state();
        Ok(state
            .blogs
            .iter()
            .find(|b| b.slug == slug)
            .map(|b| state.hydrate_blog(b)))
    }

    async fn list_blogs(&self, filter: BlogFilter, page: Pagination) -> Result<(Vec<Blog>, i64), AppError> {
        let search = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let tag = filter.tag.as_deref().map(|t| t.trim().to_lowercase());

        let state = self.state();
        let mut blogs: Vec<Blog> = state
            .blogs
            .iter()
            .filter(|b| !b.is_deleted)
            .filter(|b| match filter.visibility {
                BlogVisibility::Approved => b.is_approved,
                BlogVisibility::Pending => !b.is_approved,
                BlogVisibility::All => true,
            })
            .filter(|b| filter.author_id.is_none_or(|id| b.author_id == id))
            .filter(|b| tag.as_ref().is_none_or(|t| b.tags.contains(t)))
            .filter(|b| {
                search.as_ref().is_none_or(|s| {
                    contains_ci(&b.title, s) || contains_ci(&b.excerpt, s) || contains_ci(&b.content, s)
                })
            })
            .map(|b| state.hydrate_blog(b))
            .collect();
        blogs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(blogs, page))
    }

    async fn update_blog(
        &self,
        id: Uuid,
        author_id: Uuid,
        changes: UpdateBlogRequest,
        reset_approval: bool,
    ) -> Result<Option<Blog>, AppError> {
        let mut state = self.state();
        let Some(blog) = state
            .blogs
            .iter_mut()
            .find(|b| b.id == id && b.author_id == author_id && !b.is_deleted)
        else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            blog.title = title;
        }
        if let Some(content) = changes.content {
            blog.content = content;
        }
        if let Some(excerpt) = changes.excerpt {
            blog.excerpt = excerpt;
        }
        if let Some(tags) = changes.tags {
            blog.tags = tags;
        }
        if let Some(cover) = changes.cover_image_url {
            blog.cover_image_url = Some(cover);
        }
        if reset_approval {
            blog.is_approved = false;
            blog.approved_at = None;
            blog.approved_by = None;
        }
        blog.updated_at = Utc::now();
        Ok(state.blog(id))
    }

    async fn soft_delete_blog(&self, id: Uuid, author_id: Option<Uuid>) -> Result<bool, AppError> {
        let mut state = self.state();
        match state.blogs.iter_mut().find(|b| b.id == id && !b.is_deleted) {
            Some(blog) if author_id.is_none_or(|a| blog.author_id == a) => {
                let now = Utc::now();
                blog.is_deleted = true;
                blog.deleted_at = Some(now);
                blog.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_blog_approval(
        &self,
        id: Uuid,
        approved: bool,
        reviewer: Uuid,
    ) -> Result<Option<Blog>, AppError> {
        let mut state = self.state();
        let Some(blog) = state.blogs.iter_mut().find(|b| b.id == id && !b.is_deleted) else {
            return Ok(None);
        };
        let now = Utc::now();
        blog.is_approved = approved;
        blog.approved_at = approved.then_some(now);
        blog.approved_by = approved.then_some(reviewer);
        blog.updated_at = now;
        Ok(state.blog(id))
    }

    // --- COMMENTS ---

    async fn create_comment(&self, comment: NewComment) -> Result<Comment, AppError> {
        let mut state = self.state();
        let now = Utc::now();
        let created = Comment {
            id: Uuid::new_v4(),
            blog_id: comment.blog_id,
            user_id: comment.user_id,
            parent_id: comment.parent_id,
            mentioned_user_id: comment.mentioned_user_id,
            content: comment.content,
            created_at: now,
            updated_at: now,
            ..Comment::default()
        };
        let hydrated = state.hydrate_comment(&created);
        state.comments.push(created);
        Ok(hydrated)
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, AppError> {
        Ok(self.state().comment(id))
    }

    async fn update_comment(
        &self,
        id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Result<Option<Comment>, AppError> {
        let mut state = self.state();
        let Some(comment) = state
            .comments
            .iter_mut()
            .find(|c| c.id == id && c.user_id == user_id && !c.is_deleted)
        else {
            return Ok(None);
        };
        comment.content = content;
        comment.updated_at = Utc::now();
        Ok(state.comment(id))
    }

    async fn soft_delete_comment(&self, id: Uuid, user_id: Option<Uuid>) -> Result<bool, AppError> {
        let mut state = self.state();
        match state.comments.iter_mut().find(|c| c.id == id && !c.is_deleted) {
            Some(comment) if user_id.is_none_or(|u| comment.user_id == u) => {
                comment.is_deleted = true;
                comment.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_root_comments(
        &self,
        blog_id: Uuid,
        page: Pagination,
    ) -> Result<(Vec<Comment>, i64), AppError> {
        let state = self.state();
        let mut roots: Vec<Comment> = state
            .comments
            .iter()
            .filter(|c| c.blog_id == blog_id && c.parent_id.is_none())
            .filter(|c| !c.is_deleted || state.has_live_reply(c.id))
            .map(|c| state.hydrate_comment(c))
            .collect();
        roots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(roots, page))
    }

    async fn list_replies(&self, root_ids: &[Uuid]) -> Result<Vec<Comment>, AppError> {
        let state = self.state();
        let mut replies: Vec<Comment> = state
            .comments
            .iter()
            .filter(|c| !c.is_deleted && c.parent_id.is_some_and(|p| root_ids.contains(&p)))
            .map(|c| state.hydrate_comment(c))
            .collect();
        replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(replies)
    }

    // --- LIKES & VIEWS ---

    async fn toggle_like(&self, blog_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state();
        let key = (blog_id, user_id);
        if state.likes.remove(&key) {
            Ok(false)
        } else {
            state.likes.insert(key);
            Ok(true)
        }
    }

    async fn count_likes(&self, blog_id: Uuid) -> Result<i64, AppError> {
        Ok(self.state().likes.iter().filter(|(b, _)| *b == blog_id).count() as i64)
    }

    async fn has_liked(&self, blog_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self.state().likes.contains(&(blog_id, user_id)))
    }

    async fn increment_views(&self, blog_id: Uuid) -> Result<Option<i64>, AppError> {
        let mut state = self.state();
        Ok(state.blogs.iter_mut().find(|b| b.id == blog_id).map(|blog| {
            blog.view_count += 1;
            blog.view_count
        }))
    }

    async fn record_verified_view(&self, blog_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self.state().views.insert((blog_id, user_id)))
    }

    // --- DASHBOARD ---

    async fn get_stats(&self) -> Result<AdminDashboardStats, AppError> {
        let state = self.state();
        let live_users = state.users.iter().filter(|u| !u.is_deleted);
        let authors_with = |status: AuthorStatus| {
            state.authors.values().filter(|a| a.status == status).count() as i64
        };
        let live_blogs = || state.blogs.iter().filter(|b| !b.is_deleted);

        Ok(AdminDashboardStats {
            total_users: live_users.clone().count() as i64,
            total_admins: live_users.filter(|u| u.role == Role::Admin).count() as i64,
            approved_authors: authors_with(AuthorStatus::Approved),
            pending_authors: authors_with(AuthorStatus::Pending),
            published_blogs: live_blogs().filter(|b| b.is_approved).count() as i64,
            pending_blogs: live_blogs().filter(|b| !b.is_approved).count() as i64,
            total_comments: state.comments.iter().filter(|c| !c.is_deleted).count() as i64,
            total_likes: state.likes.len() as i64,
            total_views: state.blogs.iter().map(|b| b.view_count).sum(),
            total_verified_views: state.views.len() as i64,
        })
    }
}
