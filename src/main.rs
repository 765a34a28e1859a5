use course_portal::{
    AppState, CurrencyConverter,
    config::{AppConfig, Env},
    create_router,
    oauth::{GoogleOAuthClient, OAuthProvider},
    repository::{PostgresRepository, RepositoryState},
    seed,
    storage::{S3StorageClient, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::{error::Error, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, Postgres, S3 and the outbound HTTP clients,
/// then serves the router. Any startup failure ends the process with an error.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load()?;

    // 2. Logging: pretty locally, JSON in production.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "course_portal=debug,tower_http=info".into());

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

    // 3. Database
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await?;

    sqlx::migrate!().run(&pool).await?;

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. Storage
    let s3_client = S3StorageClient::new(
        config.s3_endpoint.as_deref(),
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    )
    .await;

    // LOCAL-ONLY: the MinIO bucket is created on demand.
    if config.env == Env::Local {
        s3_client.ensure_bucket_exists().await;
    }

    let storage = Arc::new(s3_client) as StorageState;

    // 5. Outbound HTTP collaborators
    let fx = Arc::new(CurrencyConverter::from_config(&config)?);
    tracing::info!(providers = ?fx.provider_names(), "FX provider chain ready");

    let oauth = config
        .google
        .clone()
        .map(|google| Arc::new(GoogleOAuthClient::new(google)) as Arc<dyn OAuthProvider>);
    if oauth.is_none() {
        tracing::info!("Google sign-in disabled: GOOGLE_CLIENT_ID/SECRET/REDIRECT_URL not set");
    }

    // 6. Demo data
    if config.seed_demo {
        let report = seed::seed_demo(repo.as_ref()).await?;
        tracing::info!(
            users = report.users_created,
            courses = report.courses_created,
            enrollments = report.enrollments_created,
            "demo data seeded"
        );
    }

    // 7. Router and server
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState {
        repo,
        storage,
        fx,
        oauth,
        config,
    });

    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Listening on {bind_addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://{bind_addr}/swagger-ui");

    axum::serve(listener, app).await?;
    Ok(())
}
