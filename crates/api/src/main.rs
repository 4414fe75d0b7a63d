//! API server entry point.

use std::sync::Arc;

use api::auth::TokenSigner;
use api::config::{Config, LogFormat};
use api::{AppState, create_app};
use checkout::InMemoryPaymentGateway;
use domain::{InMemoryStore, Store};
use metrics_exporter_prometheus::PrometheusHandle;
use persistence::PostgresStore;
use secrecy::ExposeSecret;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const MAX_DB_CONNECTIONS: u32 = 10;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Seeds the admin account, builds the app and serves it until shutdown.
async fn serve<S: Store>(store: S, config: Config, metrics_handle: PrometheusHandle) {
    let tokens = TokenSigner::new(config.token_key(), config.token_ttl_secs)
        .expect("failed to build token signer");
    let state = Arc::new(AppState::new(store, InMemoryPaymentGateway::new(), tokens));

    if let Some(admin) = &config.admin {
        let user = state
            .identity
            .ensure_admin(&admin.email, admin.password.expose_secret())
            .await
            .expect("failed to seed admin account");
        tracing::info!(user_id = %user.id, "admin account ready");
    }

    let app = create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration
    let config = Config::from_env().expect("invalid configuration");

    // 2. Initialize tracing
    init_tracing(&config);
    if config.token_secret_generated {
        tracing::warn!("TOKEN_SECRET is not set; using a random key, tokens will not survive a restart");
    }

    // 3. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 4. Pick the store and serve
    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresStore::connect(url.expose_secret(), MAX_DB_CONNECTIONS)
                .await
                .expect("failed to connect to PostgreSQL");
            store.run_migrations().await.expect("migrations failed");
            tracing::info!("using PostgreSQL store");
            serve(store, config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL is not set; using the in-memory store");
            serve(InMemoryStore::new(), config, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
