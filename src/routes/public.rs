use crate::{
    AppState,
    handlers::{auth, blogs, comments, engagement},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without credentials. Read handlers only return
/// published posts; a valid bearer token is still honoured (through
/// `MaybeAuthUser`) so an author can preview their own drafts.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /blogs?page=&limit=&search=&tag=&author=
        // Published posts, newest first.
        .route("/blogs", get(blogs::list_blogs))
        // GET /blogs/{id}
        // Accepts either the UUID or the slug.
        .route("/blogs/{id}", get(blogs::get_blog))
        // GET /blogs/{id}/comments
        // Root comments with their flattened replies.
        .route("/blogs/{id}/comments", get(comments::list_comments))
        // GET /blogs/{id}/likes
        .route("/blogs/{id}/likes", get(engagement::get_likes))
        // POST /blogs/{id}/views
        // Generic counter, anonymous and not deduplicated.
        .route("/blogs/{id}/views", post(engagement::record_view))
}

/// Credential endpoints. Kept apart from `public_routes` so the router can
/// wrap them in the per-IP rate limiter.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/signup
        .route("/auth/signup", post(auth::signup))
        // POST /auth/signin
        // Unknown email and wrong password produce the same 401.
        .route("/auth/signin", post(auth::signin))
        // POST /auth/refresh
        // Rotates the refresh token; presenting an old one revokes the session.
        .route("/auth/refresh", post(auth::refresh))
        // POST /auth/password/forgot
        // Always 200 so the endpoint cannot be used to probe for accounts.
        .route("/auth/password/forgot", post(auth::forgot_password))
        // POST /auth/password/reset
        .route("/auth/password/reset", post(auth::reset_password))
}
