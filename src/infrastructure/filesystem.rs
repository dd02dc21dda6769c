use anyhow::{Context, Result, bail};
use std::path::Path;
use tracing::info;

/// Creates the upload directory if needed and checks it is a directory.
pub async fn prepare_upload_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("failed to create upload directory {}", path.display()))?;

    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_dir() {
        bail!("{} is not a directory", path.display());
    }

    info!("📁 Upload directory: {}", path.display());
    Ok(())
}
