use crate::config::{BlobBackend, BlobConfig};
use crate::services::storage::{BlobStore, GridFsBlobStore, MemoryBlobStore, S3BlobStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Connects the configured blob store and proves it is reachable.
///
/// Any error here is fatal: the caller must not start listening.
pub async fn setup_blob_store(config: &BlobConfig) -> Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.backend {
        BlobBackend::Gridfs => {
            info!(
                "🍃 GridFS Storage: database '{}', bucket '{}'",
                config.mongodb_database, config.gridfs_bucket
            );
            Arc::new(
                GridFsBlobStore::connect(
                    &config.mongodb_uri,
                    &config.mongodb_database,
                    &config.gridfs_bucket,
                )
                .await?,
            )
        }
        BlobBackend::S3 => {
            info!(
                "☁️  S3 Storage: {} (Bucket: {})",
                config.s3.endpoint.as_deref().unwrap_or("aws default"),
                config.s3.bucket
            );
            Arc::new(S3BlobStore::connect(&config.s3).await?)
        }
        BlobBackend::Memory => {
            info!("🧪 Memory Storage: blobs are lost on exit");
            Arc::new(MemoryBlobStore::new())
        }
    };

    store
        .ping()
        .await
        .with_context(|| format!("Can't connect to {} blob store", store.backend_name()))?;

    let names = store.list_names().await?;
    info!("📚 {} blob(s) already stored", names.len());
    for name in &names {
        info!("Filename: {}", name);
    }

    Ok(store)
}
