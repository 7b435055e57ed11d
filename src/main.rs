use anyhow::Result;
use axum::Router;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use storefront_api::{
    assets::{AssetManager, disk::DiskObjectStore, r2::R2ObjectStore, store::ObjectStore},
    auth, config,
    config::AssetStoreConfig,
    db, routes, state,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!(
        addr = %cfg.addr(),
        database_url = %cfg.database_url,
        assets = ?cfg.assets,
        upload_timeout = ?cfg.upload_timeout,
        "Starting storefront-api"
    );

    // --- Initialize SQLite connection ---
    let db = db::connect(&cfg.database_url).await?;

    // --- Handle migration mode ---
    db::run_migrations(&db).await?;
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Object store + asset manager ---
    let store: Arc<dyn ObjectStore> = match &cfg.assets {
        AssetStoreConfig::R2(settings) => Arc::new(R2ObjectStore::new(settings)),
        AssetStoreConfig::Disk { storage_dir, .. } => {
            if !Path::new(storage_dir).exists() {
                fs::create_dir_all(storage_dir)?;
                tracing::info!("Created storage directory at {}", storage_dir);
            }
            Arc::new(DiskObjectStore::new(storage_dir))
        }
    };
    let assets = AssetManager::new(store, cfg.assets.public_domain(), cfg.upload_timeout)?;
    let tokens = auth::TokenIssuer::new(&cfg.jwt_secret, cfg.jwt_ttl);
    let state = state::AppState::new(db, assets, tokens);

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
