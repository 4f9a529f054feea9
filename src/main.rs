use pikshare::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{InMemoryRepository, PostgresRepository, RepositoryState},
    seed,
    storage::{MediaPointerBuilder, S3StorageClient, StorageState, StorageService},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The asynchronous entry point: configuration, logging, store selection,
/// blob storage and the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration loading (fail-fast on missing production secrets).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging filter: RUST_LOG wins, with sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pikshare=debug,tower_http=info,axum=trace".into());

    // 3. Log format per environment: pretty locally, JSON for aggregators.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Store selection: Postgres when DATABASE_URL is configured, the
    // seeded in-memory demonstration store otherwise.
    let pointers = MediaPointerBuilder::new(&config.cdn_base_url);
    let repo: RepositoryState = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
            let repo = PostgresRepository::initialize(pool, pointers.clone())
                .await
                .expect("FATAL: Failed to seed id sequences from Postgres.");
            tracing::info!("Using Postgres store");
            Arc::new(repo)
        }
        None => {
            let (posts, comments) = seed::demo_fixture(&pointers);
            tracing::info!("DATABASE_URL not set; using seeded in-memory store");
            Arc::new(InMemoryRepository::with_data(pointers.clone(), posts, comments))
        }
    };

    // 5. Blob storage initialization (S3/MinIO).
    let s3_client = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    )
    .await;

    // LOCAL-ONLY: provision the MinIO bucket for the Dockerized setup.
    if config.env == Env::Local {
        s3_client.ensure_bucket_exists().await;
    }

    let storage = Arc::new(s3_client) as StorageState;

    // 6. Unified state assembly and server startup.
    let app_state = AppState {
        repo,
        storage,
        config,
    };
    let app = create_router(app_state);

    let listener = TcpListener::bind("0.0.0.0:3000").await.unwrap();

    tracing::info!("Listening on 0.0.0.0:3000");
    tracing::info!("API documentation available at: http://localhost:3000/swagger-ui");

    axum::serve(listener, app).await.unwrap();
}
