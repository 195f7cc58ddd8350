//! The gatelimit HTTP service.
//!
//! Environment-driven configuration with CLI overrides, a Redis-backed
//! limiter in front of `/api/v1`, and graceful shutdown on SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Extension, Json, Router};
use clap::Parser;
use serde_json::json;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gatelimit::middleware::RateLimitLayer;
use gatelimit::response::SuccessBody;
use gatelimit::store::{RedisConfig, RedisStore, Store};
use gatelimit::{QuotaProfile, RateLimitExt, RateLimiter, TokenProfiles};

/// Distributed HTTP rate limiting service.
#[derive(Parser, Debug)]
#[command(name = "gatelimit-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listen port
    #[arg(long, env = "SERVER_PORT", default_value_t = 8080)]
    port: u16,

    /// Environment label
    #[arg(long, env = "APP_ENV", default_value = "development")]
    app_env: String,

    /// Default per-IP request limit
    #[arg(long, env = "RATE_LIMIT_IP", default_value_t = 10)]
    ip_limit: u32,

    /// Default window length in seconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECONDS", default_value_t = 1)]
    window_seconds: u64,

    /// Default penalty duration in seconds
    #[arg(long, env = "RATE_LIMIT_BLOCK_DURATION_SECONDS", default_value_t = 300)]
    block_duration_seconds: u64,

    /// Redis host
    #[arg(long, env = "REDIS_HOST", default_value = "localhost")]
    redis_host: String,

    /// Redis port
    #[arg(long, env = "REDIS_PORT", default_value_t = 6379)]
    redis_port: u16,

    /// Redis password
    #[arg(long, env = "REDIS_PASSWORD", default_value = "")]
    redis_password: String,

    /// Redis database index
    #[arg(long, env = "REDIS_DB", default_value_t = 0)]
    redis_db: i64,

    /// Path to the token profile file
    #[arg(long, env = "TOKEN_PROFILES_PATH", default_value = "configs/tokens.json")]
    token_profiles: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    info!("Starting gatelimit");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(environment = %args.app_env, port = args.port, "Configuration loaded");

    let token_profiles = TokenProfiles::from_file(&args.token_profiles)?;
    info!(
        path = %args.token_profiles.display(),
        tokens = token_profiles.len(),
        "Token profiles loaded"
    );

    let ip_profile = QuotaProfile::try_new(
        args.ip_limit,
        Duration::from_secs(args.window_seconds),
        Duration::from_secs(args.block_duration_seconds),
    )?;

    let redis_config = RedisConfig::from_parts(
        &args.redis_host,
        args.redis_port,
        &args.redis_password,
        args.redis_db,
    );
    let store = Arc::new(RedisStore::new(redis_config).await?);
    info!(
        host = %args.redis_host,
        port = args.redis_port,
        db = args.redis_db,
        "Connected to Redis"
    );

    let limiter = RateLimiter::new(store.clone(), ip_profile, token_profiles);

    let api = Router::new()
        .route("/resource", get(resource))
        .layer(RateLimitLayer::new(limiter));

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Draining complete, closing store");
    store.close().await;
    info!("Server exited");

    Ok(())
}

async fn health() -> Json<SuccessBody> {
    Json(SuccessBody::new(
        "Service is healthy",
        json!({
            "status": "ok",
            "service": "gatelimit",
        }),
    ))
}

async fn resource(rate_limit: Option<Extension<RateLimitExt>>) -> Json<SuccessBody> {
    let mut data = json!({
        "resource": "sample-resource",
        "message": "This is a sample resource for testing rate limiting",
    });
    if let Some(Extension(rate_limit)) = rate_limit {
        data["remaining"] = json!(rate_limit.remaining());
    }

    Json(SuccessBody::new("Resource accessed successfully", data))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
