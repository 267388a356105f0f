//! Emporium API Server
//!
//! Configuration comes from the environment, optionally layered over the TOML
//! file named by `EMPORIUM_CONFIG`.

use std::sync::Arc;

use anyhow::Context;
use emporium_api::{create_router, state::AppState};
use emporium_core::{AppConfig, Environment, InMemoryUserStore, LoggingConfig, PgUserStore, UserStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.logging, config.environment);
    config.validate().context("invalid configuration")?;

    tracing::info!(environment = ?config.environment, "Configuration loaded");

    let store = connect_store(&config).await?;
    let state = Arc::new(AppState::new(config, store));

    // Missing or weak bootstrap settings are logged and skipped
    state
        .auth
        .bootstrap_admin(&state.config.admin)
        .await
        .context("admin bootstrap failed")?;

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Emporium API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var("EMPORIUM_CONFIG") {
        Ok(path) => AppConfig::from_file(&path)
            .with_context(|| format!("failed to load {path}"))?
            .with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig, environment: Environment) {
    let default_filter = match environment {
        Environment::Development => "emporium_api=debug,tower_http=debug".to_string(),
        _ => format!("{0},emporium_api={0},tower_http={0}", logging.level),
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn connect_store(config: &AppConfig) -> anyhow::Result<Arc<dyn UserStore>> {
    let Some(url) = config.database.postgres_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using in-memory user store");
        return Ok(Arc::new(InMemoryUserStore::new()));
    };

    let store = PgUserStore::connect(url, config.database.pool_size)
        .await
        .context("failed to connect to PostgreSQL")?;
    if config.database.auto_migrate {
        store
            .ensure_schema()
            .await
            .context("failed to create users schema")?;
    }

    tracing::info!(pool_size = config.database.pool_size, "Connected to PostgreSQL");
    Ok(Arc::new(store))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
