use crate::{
    AppState,
    handlers::{account, admin, auth, blogs, comments, engagement},
    storage::MAX_IMAGE_BYTES,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

/// Multipart framing on top of the largest accepted image.
const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 64 * 1024;

/// Authenticated Router Module
///
/// Routes for any signed-in account. The whole router sits behind
/// `auth_middleware`, so every handler here receives a validated `AuthUser`.
/// Author-only and owner-only rules are enforced inside the handlers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Sessions ---
        // POST /auth/signout
        // Revokes the session the access token belongs to.
        .route("/auth/signout", post(auth::signout))
        // POST /auth/signout-all
        .route("/auth/signout-all", post(auth::signout_all))
        // GET /auth/sessions
        // Active sessions of the caller; `current` marks this device.
        .route("/auth/sessions", get(auth::list_sessions))
        // DELETE /auth/sessions/{id}
        .route("/auth/sessions/{id}", delete(auth::revoke_session))
        // --- Account ---
        // GET/PUT/DELETE /me
        .route(
            "/me",
            get(account::get_me)
                .put(account::update_me)
                .delete(account::delete_me),
        )
        // PUT /me/password
        // Signs out every device and returns a fresh session for this one.
        .route("/me/password", put(account::change_password))
        // POST /me/avatar
        // Multipart field `file`, stored on the image CDN.
        .route(
            "/me/avatar",
            post(account::upload_avatar).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        // GET/POST /me/author-application
        .route(
            "/me/author-application",
            get(account::get_author_application).post(account::apply_for_author),
        )
        // GET /me/blogs
        // Own posts in every approval state.
        .route("/me/blogs", get(blogs::my_blogs))
        // --- Blogs (approved authors) ---
        // POST /blogs
        // New posts start pending until an admin approves them.
        .route("/blogs", post(blogs::create_blog))
        // PUT/DELETE /blogs/{id}
        // Owner only. Editing an approved post sends it back to moderation.
        .route(
            "/blogs/{id}",
            put(blogs::update_blog).delete(blogs::delete_blog),
        )
        // POST /uploads/images
        .route(
            "/uploads/images",
            post(blogs::upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        // --- Comments ---
        // POST /blogs/{id}/comments
        // Replies to replies are re-parented to the root with a mention.
        .route("/blogs/{id}/comments", post(comments::create_comment))
        // PUT/DELETE /comments/{id}
        .route(
            "/comments/{id}",
            put(comments::update_comment).delete(comments::delete_comment),
        )
        // --- Engagement ---
        // POST /blogs/{id}/like
        // Toggles; the (blog, user) key allows one like per reader.
        .route("/blogs/{id}/like", post(engagement::toggle_like))
        // POST /blogs/{id}/views/verified
        // Counted at most once per reader.
        .route(
            "/blogs/{id}/views/verified",
            post(engagement::record_verified_view),
        )
        // --- Admin invites ---
        // POST /admin-invites/accept
        // The invitee is not an admin yet, so this lives outside `/admin`.
        .route("/admin-invites/accept", post(admin::accept_invite))
}
