// src/main.rs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use oab_practice::config::Config;
use oab_practice::engine::{EngineSettings, PracticeEngine};
use oab_practice::routes;
use oab_practice::state::AppState;
use oab_practice::store::postgres::PgStore;
use oab_practice::utils::rate_limit::{RateLimiter, SlidingWindowLimiter, Unlimited};
use sqlx::postgres::PgPoolOptions;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    let limiter: Arc<dyn RateLimiter> = if config.rate_limits.disabled {
        tracing::warn!("Rate limiting disabled via RATE_LIMIT_DISABLED");
        Arc::new(Unlimited)
    } else {
        let sliding = Arc::new(SlidingWindowLimiter::from_config(&config.rate_limits));
        let sweeper = sliding.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                sweeper.retain_recent().await;
                let keys = sweeper.len().await;
                tracing::debug!(keys, "Per-user rate limiter swept");
            }
        });
        sliding
    };

    let engine = PracticeEngine::new(
        Arc::new(PgStore::new(pool)),
        limiter,
        EngineSettings::from_config(&config),
    );

    let state = AppState {
        engine: Arc::new(engine),
        config: config.clone(),
    };

    // Per-IP flood guard in front of the per-user limits.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(100)
            .burst_size(50)
            .finish()
            .expect("Invalid governor configuration"),
    );

    // The governor keeps one entry per client IP until told otherwise.
    let governor_limiter = governor_conf.limiter().clone();
    std::thread::spawn(move || {
        loop {
            std::thread::sleep(SWEEP_INTERVAL);
            tracing::debug!("Per-IP rate limiting storage size: {}", governor_limiter.len());
            governor_limiter.retain_recent();
        }
    });

    let app = routes::create_router(state).layer(GovernorLayer::new(governor_conf));

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .expect("BIND_ADDR must be a socket address");
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("Server error");
}
