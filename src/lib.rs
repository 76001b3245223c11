use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core services and domain logic.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod models;
pub mod password;
pub mod rate_limit;
pub mod repository;
pub mod response;
pub mod sessions;
pub mod slug;
pub mod storage;
pub mod threading;
pub mod tokens;
pub mod validation;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use mail::{MailerState, OutboxMailer, SmtpMailer};
pub use rate_limit::{RateLimiter, RateLimiterState};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, SanityStorageClient, StorageState};
pub use tokens::TokenService;

/// ApiDoc
///
/// The OpenAPI document for every handler, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::signup, handlers::auth::signin, handlers::auth::refresh,
        handlers::auth::signout, handlers::auth::signout_all, handlers::auth::list_sessions,
        handlers::auth::revoke_session, handlers::auth::forgot_password,
        handlers::auth::reset_password,
        handlers::account::get_me, handlers::account::update_me, handlers::account::delete_me,
        handlers::account::change_password, handlers::account::upload_avatar,
        handlers::account::apply_for_author, handlers::account::get_author_application,
        handlers::blogs::list_blogs, handlers::blogs::get_blog, handlers::blogs::create_blog,
        handlers::blogs::update_blog, handlers::blogs::delete_blog, handlers::blogs::my_blogs,
        handlers::blogs::upload_image,
        handlers::comments::list_comments, handlers::comments::create_comment,
        handlers::comments::update_comment, handlers::comments::delete_comment,
        handlers::engagement::toggle_like, handlers::engagement::get_likes,
        handlers::engagement::record_view, handlers::engagement::record_verified_view,
        handlers::admin::get_admin_stats, handlers::admin::list_users,
        handlers::admin::list_authors, handlers::admin::moderate_author,
        handlers::admin::list_admin_blogs, handlers::admin::approve_blog,
        handlers::admin::unapprove_blog, handlers::admin::admin_delete_blog,
        handlers::admin::create_invite, handlers::admin::list_invites,
        handlers::admin::revoke_invite, handlers::admin::accept_invite
    ),
    components(
        schemas(
            models::Role, models::AuthorStatus, models::UserProfile, models::AuthorProfile,
            models::AdminInvite, models::Blog, models::BlogSummary, models::BlogDetail,
            models::BlogVisibility, models::Comment, models::CommentThread,
            models::SignUpRequest, models::SignInRequest, models::RefreshRequest,
            models::ForgotPasswordRequest, models::ResetPasswordRequest,
            models::ChangePasswordRequest, models::UpdateProfileRequest,
            models::AuthorApplicationRequest, models::ModerationRequest,
            models::InviteAdminRequest, models::AcceptInviteRequest,
            models::CreateBlogRequest, models::UpdateBlogRequest,
            models::CreateCommentRequest, models::UpdateCommentRequest,
            models::TokenPair, models::AuthResponse, models::SessionView,
            models::LikeStatus, models::ViewStats, models::ImageUploadForm,
            models::UploadedAsset, models::AdminDashboardStats,
            handlers::admin::AuthorDecision,
        )
    ),
    tags(
        (name = "inkwell", description = "Inkwell blogging API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared container of services handed to every handler. All
/// members are cheap to clone (`Arc`s or small config values).
#[derive(Clone)]
pub struct AppState {
    /// Persistence: Postgres in production, in-memory in tests.
    pub repo: RepositoryState,
    /// Image uploads to the Sanity asset API.
    pub storage: StorageState,
    /// Outgoing email. Failures are logged, never surfaced to the client.
    pub mailer: MailerState,
    /// JWT signing and verification.
    pub tokens: TokenService,
    pub config: AppConfig,
    /// Per-IP window counters for the credential endpoints.
    pub limiter: RateLimiterState,
}

impl AppState {
    /// Builds the state with a rate limiter sized from the configuration.
    pub fn new(
        repo: RepositoryState,
        storage: StorageState,
        mailer: MailerState,
        config: AppConfig,
    ) -> Self {
        let limiter = std::sync::Arc::new(
            RateLimiter::new(
                config.rate_limit_max_requests,
                std::time::Duration::from_secs(config.rate_limit_window_secs),
            )
            .trust_proxy_headers(config.trust_proxy_headers),
        );
        Self {
            repo,
            storage,
            mailer,
            tokens: TokenService::new(&config),
            config,
            limiter,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for MailerState {
    fn from_ref(app_state: &AppState) -> MailerState {
        app_state.mailer.clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for RateLimiterState {
    fn from_ref(app_state: &AppState) -> RateLimiterState {
        app_state.limiter.clone()
    }
}

/// cors_layer
///
/// `Any` origin when no `CORS_ORIGIN` is configured. A configured origin that
/// is not a valid header value allows no cross-origin calls at all.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let x_request_id = HeaderName::from_static("x-request-id");
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            x_request_id.clone(),
        ])
        .expose_headers([x_request_id, header::RETRY_AFTER]);

    match config.cors_origin.as_deref() {
        None => cors.allow_origin(Any),
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(value) => cors.allow_origin(value),
            Err(_) => {
                tracing::warn!(%origin, "CORS_ORIGIN is not a valid origin; cross-origin requests disabled");
                cors
            }
        },
    }
}

/// create_router
///
/// Assembles the route groups, applies their access-control layers and the
/// observability stack, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        // Documentation: Swagger UI over the generated OpenAPI document.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: no credentials required.
        .merge(public::public_routes())
        // Credential endpoints: one rate-limit window per client IP.
        .merge(public::auth_routes().route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit,
        )))
        // Authenticated Routes: 401 before any handler runs without a valid session.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::auth_middleware,
            )),
        )
        // Admin Routes: 401 unauthenticated, 403 for non-admins.
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::admin_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                // Request ID generation for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // One tracing span per request, carrying the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // Echo the request ID back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: every log line of a request carries its
/// `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
