//! # ProjectCamp API Server
//!
//! Serves account, session and project membership endpoints.
//!
//! ## Architecture
//!
//! - PostgreSQL store when `DATABASE_URL` is set (migrations run at startup),
//!   in-memory store otherwise
//! - Verification and reset emails are written to the log
//! - Graceful shutdown on Ctrl+C / SIGTERM
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=... TOKEN_PEPPER=... cargo run -p projectcamp-api
//! ```

use std::sync::Arc;

use projectcamp_api::{
    app::{build_router, AppState},
    config::{Config, LogFormat},
};
use projectcamp_shared::{
    clock::SystemClock,
    db::{self, pool::DatabaseConfig},
    mail::LogMailer,
    store::{memory::MemoryStore, postgres::PgStore, MembershipStore, UserStore},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    tracing::info!(
        "ProjectCamp API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let (users, memberships, pool): (Arc<dyn UserStore>, Arc<dyn MembershipStore>, _) =
        match &config.database {
            Some(database) => {
                let pool = db::pool::create_pool(DatabaseConfig {
                    url: database.url.clone(),
                    max_connections: database.max_connections,
                    ..DatabaseConfig::default()
                })
                .await?;
                db::migrations::run_migrations(&pool).await?;

                let store = Arc::new(PgStore::new(pool.clone()));
                (store.clone(), store, Some(pool))
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store");
                let store = Arc::new(MemoryStore::new());
                (store.clone(), store, None)
            }
        };

    let address = config.bind_address();
    let state = AppState::new(
        config,
        users,
        memberships,
        Arc::new(LogMailer),
        Arc::new(SystemClock),
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = pool {
        db::pool::close_pool(pool).await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "projectcamp_api=debug,projectcamp_shared=debug,tower_http=debug".into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}
