// Main entry point for the agent server

use std::sync::Arc;

use agent_core::domains::tasks::scraper::ScraperConfig;
use agent_core::domains::tasks::store::PostgresTaskStore;
use agent_core::domains::tasks::{EngineConfig, TaskEngine};
use agent_core::kernel::{create_page_fetcher, LlmResumeScorer};
use agent_core::server::build_app;
use agent_core::Config;
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,agent_core=debug,sqlx=warn,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("Starting agent task server");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Wire up the engine
    let store = Arc::new(PostgresTaskStore::new(pool));
    let scorer = Arc::new(
        LlmResumeScorer::new(config.provider_configs())
            .context("Failed to build LLM provider clients")?,
    );
    let fetcher = create_page_fetcher(config.chrome_binary.clone())
        .context("Failed to create page fetcher")?;
    let scraper_config = ScraperConfig {
        base_url: config.seek_base_url.clone(),
        ..ScraperConfig::default()
    };

    let engine = TaskEngine::new(
        store,
        scorer,
        fetcher,
        scraper_config,
        EngineConfig::default(),
    );

    let app = build_app(engine, &config.allowed_origins);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
