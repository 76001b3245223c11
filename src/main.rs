use inkwell_api::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    mail::{MailerState, OutboxMailer, SmtpMailer},
    repository::{PostgresRepository, RepositoryState},
    sessions::spawn_session_reaper,
    storage::{SanityStorageClient, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database and migrations, outbound
/// services (mail, image storage), the session reaper, then the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "inkwell_api=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database: pool and schema migrations.
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Database migrations failed.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. Mail: SMTP when configured, otherwise an in-process outbox.
    let mailer: MailerState = match &config.smtp {
        Some(smtp) => Arc::new(
            SmtpMailer::new(smtp, &config.mail_from)
                .expect("FATAL: Invalid SMTP configuration."),
        ),
        None => {
            tracing::warn!("SMTP_HOST not set; outgoing email is only logged");
            Arc::new(OutboxMailer::new())
        }
    };

    // 5. Image storage (Sanity asset API)
    let storage = Arc::new(SanityStorageClient::new(&config.sanity)) as StorageState;

    // 6. Background session cleanup
    spawn_session_reaper(
        repo.clone(),
        Duration::from_secs(config.session_purge_interval_secs),
        chrono::Duration::seconds(config.session_retention_secs),
    );

    // 7. Router and server
    let addr = config.bind_addr();
    let app_state = AppState::new(repo, storage, mailer, config);
    let app = create_router(app_state);

    let listener = TcpListener::bind(&addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://{addr}/swagger-ui");

    // ConnectInfo feeds the peer address to the rate limiter and session metadata.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("FATAL: HTTP server terminated unexpectedly.");
}
