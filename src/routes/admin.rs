use crate::{AppState, handlers::admin};
use axum::{
    Router,
    routing::{delete, get, put},
};

/// Admin Router Module
///
/// Moderation and oversight endpoints, nested under `/admin`.
///
/// Access Control:
/// The router is wrapped in `admin_middleware`, which resolves the caller
/// through `AuthUser` (401) and then requires the admin role (403). The
/// handlers additionally take `AdminUser`, so a handler cannot be mounted
/// elsewhere by mistake without the check.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        // Dashboard counters: users, authors, posts, comments, likes and views.
        .route("/stats", get(admin::get_admin_stats))
        // GET /admin/users?search=&page=&limit=
        .route("/users", get(admin::list_users))
        // --- Authors ---
        // GET /admin/authors?status=
        .route("/authors", get(admin::list_authors))
        // PUT /admin/authors/{id}/{approve|reject|suspend|reinstate}
        // Illegal transitions are rejected with 409. The applicant is emailed.
        .route("/authors/{id}/{decision}", put(admin::moderate_author))
        // --- Blogs ---
        // GET /admin/blogs?status=pending|approved|all
        // Defaults to the pending queue.
        .route("/blogs", get(admin::list_admin_blogs))
        // PUT /admin/blogs/{id}/approve
        .route("/blogs/{id}/approve", put(admin::approve_blog))
        // PUT /admin/blogs/{id}/unapprove
        .route("/blogs/{id}/unapprove", put(admin::unapprove_blog))
        // DELETE /admin/blogs/{id}
        // Soft-deletes any post regardless of owner.
        .route("/blogs/{id}", delete(admin::admin_delete_blog))
        // --- Invites ---
        // GET/POST /admin/invites
        .route(
            "/invites",
            get(admin::list_invites).post(admin::create_invite),
        )
        // DELETE /admin/invites/{id}
        .route("/invites/{id}", delete(admin::revoke_invite))
}
