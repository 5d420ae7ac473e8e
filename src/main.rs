use anyhow::{Context, Result};
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use upload_companion::{
    config::AppConfig, routes::routes, services::coordinator::UploadCoordinator,
    store::s3::S3Store,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;
    tracing::info!("Starting upload-companion with config: {:?}", cfg);

    // --- Initialize the shared store client ---
    let store = S3Store::new(cfg.s3_settings())
        .await
        .context("building S3 client")?;
    tracing::info!(
        bucket = store.bucket(),
        region = store.region(),
        "S3 client ready"
    );

    // --- Initialize core service ---
    let coordinator =
        UploadCoordinator::new(Arc::new(store)).with_presign_expiry(cfg.presign_expiry);
    tracing::info!(
        presign_expiry_secs = coordinator.presign_expiry().as_secs(),
        "upload coordinator ready"
    );

    // --- Build router ---
    let app = routes::routes(coordinator);

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
