use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use std::convert::Infallible;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::Role,
    rate_limit::client_ip,
    repository::RepositoryState,
    tokens::TokenService,
};

/// Header accepted in `Env::Local` to impersonate a user without a token.
pub const DEV_USER_HEADER: &str = "x-user-id";

/// `last_used_at` is only written when it is older than this.
const TOUCH_INTERVAL_SECS: i64 = 60;

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request. `session_id` is `None`
/// only for the local development bypass.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    /// Current role, read from the database rather than trusted from the token.
    pub role: Role,
    pub session_id: Option<Uuid>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// AuthUser Extractor Implementation
///
/// 1. Reuses an identity already resolved by `auth_middleware` for this request.
/// 2. Local bypass via the `x-user-id` header (never in production).
/// 3. Access-token validation (signature, type, expiry).
/// 4. DB lookup: the user must exist and not be soft-deleted, and the token's
///    session must still be active. Revoking a session therefore locks out its
///    access tokens immediately.
///
/// Rejection: `AppError::Unauthorized` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(resolved) = parts.extensions.get::<AuthUser>() {
            return Ok(resolved.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        // Local Development Bypass
        if config.env == Env::Local {
            let dev_user = parts
                .headers
                .get(DEV_USER_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| Uuid::parse_str(value).ok());
            if let Some(user_id) = dev_user {
                if let Some(user) = repo.get_user(user_id).await?.filter(|u| !u.is_deleted) {
                    tracing::debug!(user_id = %user.id, "authenticated through local bypass");
                    let auth = AuthUser {
                        id: user.id,
                        role: user.role,
                        session_id: None,
                    };
                    parts.extensions.insert(auth.clone());
                    return Ok(auth);
                }
            }
        }

        let token =
            bearer_token(parts).ok_or_else(|| AppError::unauthorized("missing bearer token"))?;
        let claims = TokenService::from_ref(state).decode_access(token)?;

        let user = repo
            .get_user(claims.sub)
            .await?
            .filter(|u| !u.is_deleted)
            .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;

        let now = Utc::now();
        let session = repo
            .get_session(claims.sid)
            .await?
            .filter(|s| s.user_id == user.id && s.is_active(now))
            .ok_or_else(|| AppError::unauthorized("session has been revoked or expired"))?;

        if now - session.last_used_at > Duration::seconds(TOUCH_INTERVAL_SECS) {
            repo.touch_session(session.id).await?;
        }

        let auth = AuthUser {
            id: user.id,
            role: user.role,
            session_id: Some(session.id),
        };
        parts.extensions.insert(auth.clone());
        Ok(auth)
    }
}

/// MaybeAuthUser
///
/// Optional identity for public endpoints. A missing or invalid credential
/// yields an anonymous caller instead of a 401.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl MaybeAuthUser {
    pub fn id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|user| user.id)
    }

    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(AuthUser::is_admin)
    }
}

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
    TokenService: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let has_credentials = parts.headers.contains_key(header::AUTHORIZATION)
            || parts.headers.contains_key(DEV_USER_HEADER);
        if !has_credentials {
            return Ok(MaybeAuthUser(None));
        }

        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeAuthUser(Some(user))),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring invalid credentials on public route");
                Ok(MaybeAuthUser(None))
            }
        }
    }
}

/// AdminUser
///
/// An authenticated caller with the `admin` role. Non-admins get 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, "non-admin attempted an admin action");
            return Err(AppError::forbidden("admin access required"));
        }
        Ok(AdminUser(user))
    }
}

/// ClientInfo
///
/// Request metadata recorded on new sessions.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let trust_proxy_headers = AppConfig::from_ref(state).trust_proxy_headers;
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(|ua| ua.chars().take(512).collect());

        Ok(ClientInfo {
            user_agent,
            ip_address: client_ip(&parts.headers, peer, trust_proxy_headers),
        })
    }
}

/// auth_middleware
///
/// Route layer for the authenticated routes. Extracting `AuthUser` rejects the
/// request with 401 before any handler runs; the resolved identity is cached in
/// the request extensions for the handler.
pub async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// admin_middleware
///
/// Route layer for `/admin`: 401 without credentials, 403 for non-admins.
pub async fn admin_middleware(_admin: AdminUser, request: Request, next: Next) -> Response {
    next.run(request).await
}
