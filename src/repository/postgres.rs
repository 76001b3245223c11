use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::Repository;
use crate::{
    error::{AppError, conflict_on_unique},
    models::{
        AdminDashboardStats, AdminInvite, AuthorApplicationRequest, AuthorProfile, AuthorStatus,
        Blog, BlogFilter, BlogVisibility, Comment, NewAdminInvite, NewBlog, NewComment, NewSession,
        NewUser, Role, Session, UpdateBlogRequest, UpdateProfileRequest, User,
    },
    response::Pagination,
};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, bio, avatar_url, \
     is_deleted, deleted_at, created_at, updated_at";

const SESSION_COLUMNS: &str = "id, user_id, refresh_token_hash, user_agent, ip_address, \
     created_at, last_used_at, expires_at, revoked_at";

const INVITE_COLUMNS: &str =
    "id, email, invited_by, expires_at, accepted_at, revoked_at, created_at";

const AUTHOR_SELECT: &str = r#"
    SELECT a.user_id, u.name, u.email, a.status, a.motivation, a.portfolio_url,
           a.review_note, a.reviewed_by, a.applied_at, a.reviewed_at
    FROM author_profiles a
    JOIN users u ON u.id = a.user_id
"#;

// Counters are computed per row so every read of a post is consistent with the
// like/view/comment tables.
const BLOG_SELECT: &str = r#"
    SELECT b.id, b.author_id, u.name AS author_name, u.avatar_url AS author_avatar_url,
           b.title, b.slug, b.excerpt, b.content, b.tags, b.cover_image_url,
           b.is_approved, b.approved_at, b.approved_by, b.is_deleted, b.deleted_at,
           b.view_count,
           (SELECT COUNT(*) FROM blog_views v WHERE v.blog_id = b.id) AS verified_view_count,
           (SELECT COUNT(*) FROM blog_likes l WHERE l.blog_id = b.id) AS like_count,
           (SELECT COUNT(*) FROM comments c WHERE c.blog_id = b.id AND NOT c.is_deleted) AS comment_count,
           b.created_at, b.updated_at
    FROM blogs b
    JOIN users u ON u.id = b.author_id
"#;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.blog_id, c.user_id, u.name AS author_name, u.avatar_url AS author_avatar_url,
           c.parent_id, c.mentioned_user_id, m.name AS mentioned_user_name,
           c.content, c.is_deleted, c.created_at, c.updated_at
    FROM comments c
    JOIN users u ON u.id = c.user_id
    LEFT JOIN users m ON m.id = c.mentioned_user_id
"#;

// A root stays listed while it is live or still anchors live replies.
const VISIBLE_ROOT: &str = "c.parent_id IS NULL AND (NOT c.is_deleted OR EXISTS \
     (SELECT 1 FROM comments r WHERE r.parent_id = c.id AND NOT r.is_deleted))";

/// Raw `users` row; `role` is stored as text.
#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    bio: Option<String>,
    avatar_url: Option<String>,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            role: row.role.parse::<Role>()?,
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            bio: row.bio,
            avatar_url: row.avatar_url,
            is_deleted: row.is_deleted,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct AuthorRow {
    user_id: Uuid,
    name: String,
    email: String,
    status: String,
    motivation: String,
    portfolio_url: Option<String>,
    review_note: Option<String>,
    reviewed_by: Option<Uuid>,
    applied_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
}

impl TryFrom<AuthorRow> for AuthorProfile {
    type Error = AppError;

    fn try_from(row: AuthorRow) -> Result<Self, Self::Error> {
        Ok(AuthorProfile {
            status: row.status.parse::<AuthorStatus>()?,
            user_id: row.user_id,
            name: row.name,
            email: row.email,
            motivation: row.motivation,
            portfolio_url: row.portfolio_url,
            review_note: row.review_note,
            reviewed_by: row.reviewed_by,
            applied_at: row.applied_at,
            reviewed_at: row.reviewed_at,
        })
    }
}

/// Escapes LIKE wildcards so user input is matched literally.
fn contains_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_blog_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &BlogFilter) {
    builder.push(" WHERE NOT b.is_deleted");

    match filter.visibility {
        BlogVisibility::Approved => {
            builder.push(" AND b.is_approved");
        }
        BlogVisibility::Pending => {
            builder.push(" AND NOT b.is_approved");
        }
        BlogVisibility::All => {}
    }

    if let Some(author_id) = filter.author_id {
        builder.push(" AND b.author_id = ");
        builder.push_bind(author_id);
    }

    if let Some(tag) = &filter.tag {
        builder.push(" AND ");
        builder.push_bind(tag.trim().to_lowercase());
        builder.push(" = ANY(b.tags)");
    }

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        // Case-insensitive search across title, excerpt and body.
        let pattern = contains_pattern(search);
        builder.push(" AND (b.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR b.excerpt ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR b.content ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "an account with this email already exists"))?;
        row.try_into()
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn list_users(
        &self,
        search: Option<String>,
        page: Pagination,
    ) -> Result<(Vec<User>, i64), AppError> {
        let pattern = search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(contains_pattern);

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE NOT is_deleted AND ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&pattern)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users \
             WHERE NOT is_deleted AND ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1)",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let users = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((users, total))
    }

    async fn update_user_profile(
        &self,
        id: Uuid,
        changes: UpdateProfileRequest,
    ) -> Result<Option<User>, AppError> {
        let sql = format!(
            "UPDATE users SET name = COALESCE($2, name), bio = COALESCE($3, bio), updated_at = NOW() \
             WHERE id = $1 AND NOT is_deleted RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.bio)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn set_user_avatar(&self, id: Uuid, url: String) -> Result<Option<User>, AppError> {
        let sql = format!(
            "UPDATE users SET avatar_url = $2, updated_at = NOW() \
             WHERE id = $1 AND NOT is_deleted RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: String) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete_user(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- AUTHOR WORKFLOW ---

    async fn get_author_profile(&self, user_id: Uuid) -> Result<Option<AuthorProfile>, AppError> {
        let sql = format!("{AUTHOR_SELECT} WHERE a.user_id = $1");
        sqlx::query_as::<_, AuthorRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(AuthorProfile::try_from)
            .transpose()
    }

    /// Upsert guarded on `rejected`, so a concurrent decision is never overwritten.
    async fn submit_author_application(
        &self,
        user_id: Uuid,
        application: AuthorApplicationRequest,
    ) -> Result<AuthorProfile, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO author_profiles (user_id, status, motivation, portfolio_url, applied_at)
            VALUES ($1, 'pending', $2, $3, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET status = 'pending',
                motivation = EXCLUDED.motivation,
                portfolio_url = EXCLUDED.portfolio_url,
                applied_at = NOW(),
                review_note = NULL,
                reviewed_by = NULL,
                reviewed_at = NULL
            WHERE author_profiles.status = 'rejected'
            "#,
        )
        .bind(user_id)
        .bind(application.motivation)
        .bind(application.portfolio_url)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::conflict("an application is already on file"));
        }
        self.get_author_profile(user_id)
            .await?
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
        let result = sqlx::query(
            "UPDATE author_profiles \
             SET status = $3, review_note = $4, reviewed_by = $5, reviewed_at = NOW() \
             WHERE user_id = $1 AND status = $2",
        )
        .bind(user_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(note)
        .bind(reviewer)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_author_profile(user_id).await
    }

    async fn list_author_profiles(
        &self,
        status: Option<AuthorStatus>,
        page: Pagination,
    ) -> Result<(Vec<AuthorProfile>, i64), AppError> {
        let status = status.map(|s| s.as_str());
        let sql = format!(
            "{AUTHOR_SELECT} WHERE ($1::text IS NULL OR a.status = $1) \
             ORDER BY a.applied_at DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, AuthorRow>(&sql)
            .bind(status)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM author_profiles WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let profiles = rows
            .into_iter()
            .map(AuthorProfile::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((profiles, total))
    }

    // --- SESSIONS ---

    /// Runs in one transaction. The `FOR UPDATE` on the user row serializes
    /// concurrent sign-ins of the same account so the cap cannot be overshot.
    async fn create_session(&self, session: NewSession, max_active: u32) -> Result<Session, AppError> {
        let keep = i64::from(max_active.max(1) - 1);
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(session.user_id)
            .execute(&mut *tx)
            .await?;

        let evicted = sqlx::query(
            r#"
            UPDATE sessions SET revoked_at = NOW()
            WHERE id IN (
                SELECT id FROM sessions
                WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > NOW()
                ORDER BY created_at DESC
                OFFSET $2
            )
            "#,
        )
        .bind(session.user_id)
        .bind(keep)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if evicted > 0 {
            tracing::info!(user_id = %session.user_id, evicted, "session cap reached, evicted oldest sessions");
        }

        let sql = format!(
            "INSERT INTO sessions (id, user_id, refresh_token_hash, user_agent, ip_address, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {SESSION_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Session>(&sql)
            .bind(session.id)
            .bind(session.user_id)
            .bind(session.refresh_token_hash)
            .bind(session.user_agent)
            .bind(session.ip_address)
            .bind(session.expires_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1");
        Ok(sqlx::query_as::<_, Session>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn rotate_session(
        &self,
        id: Uuid,
        current_hash: &str,
        next_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE sessions \
             SET refresh_token_hash = $3, expires_at = $4, last_used_at = NOW() \
             WHERE id = $1 AND refresh_token_hash = $2 \
               AND revoked_at IS NULL AND expires_at > NOW()",
        )
        .bind(id)
        .bind(current_hash)
        .bind(next_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_session(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE sessions SET last_used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_session(&self, id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = NOW() \
             WHERE id = $1 AND user_id = $2 AND revoked_at IS NULL",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_user_sessions(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_active_sessions(&self, user_id: Uuid) -> Result<Vec<Session>, AppError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > NOW() \
             ORDER BY last_used_at DESC"
        );
        Ok(sqlx::query_as::<_, Session>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn purge_sessions(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM sessions WHERE expires_at < $1 OR (revoked_at IS NOT NULL AND revoked_at < $1)",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // --- PASSWORD RESETS ---

    /// Earlier unused tokens of the same user are invalidated first.
    async fn create_password_reset(
        &self,
        user_id: Uuid,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE password_resets SET used_at = NOW() WHERE user_id = $1 AND used_at IS NULL")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO password_resets (id, user_id, token_hash, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn consume_password_reset(&self, token_hash: &str) -> Result<Option<Uuid>, AppError> {
        Ok(sqlx::query_scalar::<_, Uuid>(
            "UPDATE password_resets SET used_at = NOW() \
             WHERE token_hash = $1 AND used_at IS NULL AND expires_at > NOW() \
             RETURNING user_id",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?)
    }

    // --- ADMIN INVITES ---

    async fn create_admin_invite(&self, invite: NewAdminInvite) -> Result<AdminInvite, AppError> {
        let sql = format!(
            "INSERT INTO admin_invites (id, email, token_hash, invited_by, expires_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {INVITE_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, AdminInvite>(&sql)
            .bind(Uuid::new_v4())
            .bind(invite.email)
            .bind(invite.token_hash)
            .bind(invite.invited_by)
            .bind(invite.expires_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_admin_invites(&self) -> Result<Vec<AdminInvite>, AppError> {
        let sql = format!("SELECT {INVITE_COLUMNS} FROM admin_invites ORDER BY created_at DESC");
        Ok(sqlx::query_as::<_, AdminInvite>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn has_open_invite(&self, email: &str) -> Result<bool, AppError> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM admin_invites \
             WHERE lower(email) = lower($1) AND accepted_at IS NULL \
               AND revoked_at IS NULL AND expires_at > NOW())",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn revoke_admin_invite(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE admin_invites SET revoked_at = NOW() \
             WHERE id = $1 AND accepted_at IS NULL AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Promotes the user and spends the invite in one transaction. Either
    /// statement matching nothing rolls both back.
    async fn accept_admin_invite(
        &self,
        token_hash: &str,
        user_id: Uuid,
    ) -> Result<Option<AdminInvite>, AppError> {
        let mut tx = self.pool.begin().await?;

        let email: Option<String> = sqlx::query_scalar(
            "UPDATE users SET role = $2, updated_at = NOW() \
             WHERE id = $1 AND NOT is_deleted RETURNING email",
        )
        .bind(user_id)
        .bind(Role::Admin.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(email) = email else {
            return Ok(None);
        };

        let sql = format!(
            "UPDATE admin_invites SET accepted_at = NOW() \
             WHERE token_hash = $1 AND lower(email) = lower($2) \
               AND accepted_at IS NULL AND revoked_at IS NULL AND expires_at > NOW() \
             RETURNING {INVITE_COLUMNS}"
        );
        let invite = sqlx::query_as::<_, AdminInvite>(&sql)
            .bind(token_hash)
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;

        if invite.is_some() {
            tx.commit().await?;
        }
        Ok(invite)
    }

    // --- BLOGS ---

    async fn create_blog(&self, blog: NewBlog) -> Result<Blog, AppError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO blogs (id, author_id, title, slug, excerpt, content, tags, cover_image_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(blog.author_id)
        .bind(blog.title)
        .bind(blog.slug)
        .bind(blog.excerpt)
        .bind(blog.content)
        .bind(blog.tags)
        .bind(blog.cover_image_url)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "a post with this slug already exists"))?;

        self.get_blog(id).await?.ok_or(AppError::NotFound("blog"))
    }

    async fn get_blog(&self, id: Uuid) -> Result<Option<Blog>, AppError> {
        let sql = format!("{BLOG_SELECT} WHERE b.id = $1");
        Ok(sqlx::query_as::<_, Blog>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_blog_by_slug(&self, slug: &str) -> Result<Option<Blog>, AppError> {
        let sql = format!("{BLOG_SELECT} WHERE b.slug = $1");
        Ok(sqlx::query_as::<_, Blog>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Dynamic filtering through `QueryBuilder`, so every user value is a bound
    /// parameter.
    async fn list_blogs(&self, filter: BlogFilter, page: Pagination) -> Result<(Vec<Blog>, i64), AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(BLOG_SELECT);
        push_blog_filters(&mut builder, &filter);
        builder.push(" ORDER BY b.created_at DESC LIMIT ");
        builder.push_bind(page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());
        let blogs = builder
            .build_query_as::<Blog>()
            .fetch_all(&self.pool)
            .await?;

        let mut counter: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM blogs b");
        push_blog_filters(&mut counter, &filter);
        let total: i64 = counter
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        Ok((blogs, total))
    }

    async fn update_blog(
        &self,
        id: Uuid,
        author_id: Uuid,
        changes: UpdateBlogRequest,
        reset_approval: bool,
    ) -> Result<Option<Blog>, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE blogs
            SET title = COALESCE($3, title),
                content = COALESCE($4, content),
                excerpt = COALESCE($5, excerpt),
                tags = COALESCE($6, tags),
                cover_image_url = COALESCE($7, cover_image_url),
                is_approved = CASE WHEN $8 THEN FALSE ELSE is_approved END,
                approved_at = CASE WHEN $8 THEN NULL ELSE approved_at END,
                approved_by = CASE WHEN $8 THEN NULL ELSE approved_by END,
                updated_at = NOW()
            WHERE id = $1 AND author_id = $2 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .bind(author_id)
        .bind(changes.title)
        .bind(changes.content)
        .bind(changes.excerpt)
        .bind(changes.tags)
        .bind(changes.cover_image_url)
        .bind(reset_approval)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_blog(id).await
    }

    async fn soft_delete_blog(&self, id: Uuid, author_id: Option<Uuid>) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE blogs SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND NOT is_deleted AND ($2::uuid IS NULL OR author_id = $2)",
        )
        .bind(id)
        .bind(author_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_blog_approval(
        &self,
        id: Uuid,
        approved: bool,
        reviewer: Uuid,
    ) -> Result<Option<Blog>, AppError> {
        let result = sqlx::query(
            "UPDATE blogs \
             SET is_approved = $2, \
                 approved_at = CASE WHEN $2 THEN NOW() ELSE NULL END, \
                 approved_by = CASE WHEN $2 THEN $3 ELSE NULL END, \
                 updated_at = NOW() \
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .bind(approved)
        .bind(reviewer)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_blog(id).await
    }

    // --- COMMENTS ---

    async fn create_comment(&self, comment: NewComment) -> Result<Comment, AppError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO comments (id, blog_id, user_id, parent_id, mentioned_user_id, content) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(comment.blog_id)
        .bind(comment.user_id)
        .bind(comment.parent_id)
        .bind(comment.mentioned_user_id)
        .bind(comment.content)
        .execute(&self.pool)
        .await?;

        self.get_comment(id).await?.ok_or(AppError::NotFound("comment"))
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, AppError> {
        let sql = format!("{COMMENT_SELECT} WHERE c.id = $1");
        Ok(sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_comment(
        &self,
        id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Result<Option<Comment>, AppError> {
        let result = sqlx::query(
            "UPDATE comments SET content = $3, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 AND NOT is_deleted",
        )
        .bind(id)
        .bind(user_id)
        .bind(content)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_comment(id).await
    }

    async fn soft_delete_comment(&self, id: Uuid, user_id: Option<Uuid>) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE comments SET is_deleted = TRUE, updated_at = NOW() \
             WHERE id = $1 AND NOT is_deleted AND ($2::uuid IS NULL OR user_id = $2)",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_root_comments(
        &self,
        blog_id: Uuid,
        page: Pagination,
    ) -> Result<(Vec<Comment>, i64), AppError> {
        let sql = format!(
            "{COMMENT_SELECT} WHERE c.blog_id = $1 AND {VISIBLE_ROOT} \
             ORDER BY c.created_at DESC LIMIT $2 OFFSET $3"
        );
        let roots = sqlx::query_as::<_, Comment>(&sql)
            .bind(blog_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM comments c WHERE c.blog_id = $1 AND {VISIBLE_ROOT}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(blog_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((roots, total))
    }

    async fn list_replies(&self, root_ids: &[Uuid]) -> Result<Vec<Comment>, AppError> {
        if root_ids.is_empty() {
            return Ok(vec![]);
        }
        let sql = format!(
            "{COMMENT_SELECT} WHERE c.parent_id = ANY($1) AND NOT c.is_deleted \
             ORDER BY c.created_at ASC"
        );
        Ok(sqlx::query_as::<_, Comment>(&sql)
            .bind(root_ids.to_vec())
            .fetch_all(&self.pool)
            .await?)
    }

    // --- LIKES & VIEWS ---

    async fn toggle_like(&self, blog_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM blog_likes WHERE blog_id = $1 AND user_id = $2")
            .bind(blog_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            sqlx::query(
                "INSERT INTO blog_likes (blog_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(blog_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(removed == 0)
    }

    async fn count_likes(&self, blog_id: Uuid) -> Result<i64, AppError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM blog_likes WHERE blog_id = $1")
            .bind(blog_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn has_liked(&self, blog_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM blog_likes WHERE blog_id = $1 AND user_id = $2)",
        )
        .bind(blog_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn increment_views(&self, blog_id: Uuid) -> Result<Option<i64>, AppError> {
        Ok(sqlx::query_scalar::<_, i64>(
            "UPDATE blogs SET view_count = view_count + 1 WHERE id = $1 RETURNING view_count",
        )
        .bind(blog_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn record_verified_view(&self, blog_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO blog_views (blog_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(blog_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- DASHBOARD ---

    /// Compiles all dashboard counters in a single round trip.
    async fn get_stats(&self) -> Result<AdminDashboardStats, AppError> {
        Ok(sqlx::query_as::<_, AdminDashboardStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users WHERE NOT is_deleted) AS total_users,
                (SELECT COUNT(*) FROM users WHERE NOT is_deleted AND role = 'admin') AS total_admins,
                (SELECT COUNT(*) FROM author_profiles WHERE status = 'approved') AS approved_authors,
                (SELECT COUNT(*) FROM author_profiles WHERE status = 'pending') AS pending_authors,
                (SELECT COUNT(*) FROM blogs WHERE is_approved AND NOT is_deleted) AS published_blogs,
                (SELECT COUNT(*) FROM blogs WHERE NOT is_approved AND NOT is_deleted) AS pending_blogs,
                (SELECT COUNT(*) FROM comments WHERE NOT is_deleted) AS total_comments,
                (SELECT COUNT(*) FROM blog_likes) AS total_likes,
                (SELECT COALESCE(SUM(view_count), 0)::BIGINT FROM blogs) AS total_views,
                (SELECT COUNT(*) FROM blog_views) AS total_verified_views
            "#,
        )
        .fetch_one(&self.pool)
        .await?)
    }
}
