use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::storage::s3::{S3BlobStore, S3Settings};
use common::storage::{BlobStore, FilesystemBlobStore, ensure_public_bucket};
use rand::RngCore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nakama::config::AppConfig;
use nakama::database::init_db;
use nakama::mailer::LogSender;
use nakama::service::Service;
use nakama::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "nakama=info,tower_http=info".into()),
        )
        .init();

    let mut config = AppConfig::load().context("failed to load configuration")?;
    if config.auth.token_key.is_empty() {
        warn!("auth.token_key not set, generating a random key; sessions will not survive a restart");
        let mut key = [0u8; 48];
        rand::rng().fill_bytes(&mut key);
        config.auth.token_key = URL_SAFE_NO_PAD.encode(key);
    }

    let db = init_db(&config.database.url)
        .await
        .context("failed to connect to database")?;

    let blobs: Arc<dyn BlobStore> = if config.storage.endpoint.is_empty() {
        info!(dir = %config.storage.local_dir, "Using filesystem blob store");
        Arc::new(FilesystemBlobStore::new(config.storage.local_dir.clone().into()).await?)
    } else {
        info!(endpoint = %config.storage.endpoint, "Using S3 blob store");
        let storage = &config.storage;
        Arc::new(S3BlobStore::new(&S3Settings {
            endpoint: storage.endpoint.clone(),
            access_key: storage.access_key.clone(),
            secret_key: storage.secret_key.clone(),
            secure: storage.secure,
            region: storage.region.clone(),
        }))
    };
    for bucket in [&config.storage.media_bucket, &config.storage.avatars_bucket] {
        ensure_public_bucket(blobs.as_ref(), bucket)
            .await
            .with_context(|| format!("failed to prepare bucket {bucket}"))?;
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;

    let service = Service::new(config, db, blobs, Arc::new(LogSender))?;
    let state = AppState::new(service);
    let shutdown = state.shutdown.clone();
    let service = state.service.clone();
    let app = nakama::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running at http://{}", addr);
    info!("API docs at http://{}/scalar", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutting down");
            shutdown.cancel();
        })
        .await?;

    service.background().shutdown().await;
    info!("Background tasks finished");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
