//! Paperback server binary.
//!
//! # Architecture
//!
//! - Axum with tower-sessions (`PostgreSQL` store) for cookie sessions
//! - `PostgreSQL` via sqlx for accounts, permissions, tokens and resources
//! - Sentry and tracing for error tracking and logs
//!
//! Migrations are not run here; use `paperback-cli migrate`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use sentry::integrations::tracing as sentry_tracing;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paperback_server::config::{ConfigError, ServerConfig};
use paperback_server::db::{self, Repositories};
use paperback_server::server::{self, ServeError};
use paperback_server::services::{LogNotifier, PasswordError};
use paperback_server::tasks::BackgroundTasks;
use paperback_server::{AppState, build_app};

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("bind: {0}")]
    Bind(#[from] std::io::Error),

    #[error(transparent)]
    Serve(#[from] ServeError),
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ServerConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing(config: &ServerConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "paperback_server=info,tower_http=debug".into());

    let (json, text) = if config.log_json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(text)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = ServerConfig::from_env()?;

    // Sentry must be up before the subscriber that forwards to it
    let _sentry_guard = init_sentry(&config);
    init_tracing(&config);
    if !config.secure_cookies() {
        tracing::warn!("Cookies are not marked Secure; use only over plain-HTTP development");
    }

    let pool = db::create_pool(&config).await?;
    tracing::info!("Database pool created");

    let tasks = BackgroundTasks::new();
    let state = AppState::new(
        config.clone(),
        Repositories::postgres(pool.clone(), config.database.query_timeout),
        Arc::new(LogNotifier::new(config.base_url.clone())),
        tasks.clone(),
    )?;
    let app = build_app(state, PostgresStore::new(pool));

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("paperback listening on {}", addr);

    server::serve(listener, app, tasks, config.shutdown_grace, shutdown_signal()).await?;
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
