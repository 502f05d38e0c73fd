use sea_orm_migration::MigratorTrait;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use trackshare_db::{SeaOrmTrackRepository, SeaOrmUserRepository};
use trackshare_server::config::StorageConfig;
use trackshare_server::{build_router, AppState, RouterOptions, ServerConfig};
use trackshare_storage::{LocalStorage, S3Storage, StorageBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env()?;

    // Database connection
    let db_config = trackshare_db::DatabaseConfig::from_env();
    tracing::info!("connecting to database...");
    let db = trackshare_db::connect(&db_config).await?;

    // Run migrations
    tracing::info!("running database migrations...");
    trackshare_migration::Migrator::up(&db, None).await?;
    tracing::info!("migrations complete");

    // Initialize storage backend (S3 or local)
    let storage: Arc<dyn StorageBackend> = match &config.storage {
        StorageConfig::S3 {
            endpoint,
            region,
            access_key,
            secret_key,
            bucket,
            prefix,
        } => {
            tracing::info!(bucket = %bucket, "initializing S3 storage backend");
            Arc::new(S3Storage::from_config(
                endpoint.as_deref(),
                region,
                access_key,
                secret_key,
                bucket,
                prefix,
            )?)
        }
        StorageConfig::Local { upload_dir } => {
            tracing::info!(path = %upload_dir.display(), "using local filesystem storage backend");
            let local = LocalStorage::new(upload_dir.clone());
            local.init().await?;
            Arc::new(local)
        }
    };

    let state = Arc::new(AppState::new(
        config.jwt.clone(),
        Arc::new(SeaOrmUserRepository::new(db.clone())),
        Arc::new(SeaOrmTrackRepository::new(db)),
        storage,
        config.upload_limits,
    ));

    let app = build_router(state, &RouterOptions::from(&config));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server started");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
