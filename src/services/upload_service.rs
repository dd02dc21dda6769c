use crate::models::FileInfo;
use crate::services::storage::{BlobStore, BlobWriter};
use crate::utils::validation::validate_file_name;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

/// What happened to one file part
#[derive(Debug)]
pub enum PartOutcome {
    /// The part body was read to the end. Sink failures, if any, are in
    /// `FileInfo::error`.
    Done(FileInfo),
    /// Reading the part body failed. Nothing was kept and the rest of the
    /// request body cannot be trusted.
    Interrupted(FileInfo),
}

impl PartOutcome {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, PartOutcome::Interrupted(_))
    }

    pub fn into_info(self) -> FileInfo {
        match self {
            PartOutcome::Done(info) | PartOutcome::Interrupted(info) => info,
        }
    }
}

/// Writes uploaded parts to the blob store and the upload directory at once
pub struct UploadService {
    blob_store: Arc<dyn BlobStore>,
    upload_dir: PathBuf,
}

impl UploadService {
    pub fn new(blob_store: Arc<dyn BlobStore>, upload_dir: PathBuf) -> Self {
        Self {
            blob_store,
            upload_dir,
        }
    }

    /// Stores one part under `file_name` in both sinks.
    ///
    /// The body is read exactly once; every chunk goes to the blob writer and
    /// the local file concurrently. A sink that fails is dropped and cleaned
    /// up while the other one keeps going.
    pub async fn store_part<S, E>(
        &self,
        file_name: &str,
        content_type: &str,
        body: S,
    ) -> PartOutcome
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let mut info = FileInfo::new(file_name, content_type);

        if let Err(e) = validate_file_name(file_name) {
            return PartOutcome::Done(info.failed(e.to_string()));
        }

        let (mut blob, mut local) = tokio::join!(
            BlobSink::open(self.blob_store.as_ref(), file_name),
            LocalSink::open(&self.upload_dir, file_name),
        );

        let mut body = std::pin::pin!(body);
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!("Upload of {} interrupted: {}", file_name, e);
                    tokio::join!(blob.discard(), local.discard());
                    return PartOutcome::Interrupted(
                        info.failed(format!("upload interrupted: {}", e)),
                    );
                }
            };

            if blob.is_failed() && local.is_failed() {
                // keep draining so the next part can be read
                continue;
            }
            tokio::join!(blob.write(&chunk), local.write(&chunk));
        }

        let (blob, local) = tokio::join!(blob.finish(), local.finish());
        match (blob, local) {
            (Ok(size), Ok(_)) => {
                info!(
                    "✅ Uploaded {} ({} bytes) to {} and {}",
                    file_name,
                    size,
                    self.blob_store.backend_name(),
                    self.upload_dir.display()
                );
                info.size = size;
            }
            (Err(blob_err), Ok(size)) => {
                info.size = size;
                info.error = Some(format!("blob store: {}", blob_err));
            }
            (Ok(size), Err(local_err)) => {
                info.size = size;
                info.error = Some(format!("local file: {}", local_err));
            }
            (Err(blob_err), Err(local_err)) => {
                info.size = 0;
                info.error = Some(format!(
                    "blob store: {}; local file: {}",
                    blob_err, local_err
                ));
            }
        }

        PartOutcome::Done(info)
    }
}

/// Blob half of the tee
struct BlobSink {
    name: String,
    writer: Option<Box<dyn BlobWriter>>,
    error: Option<String>,
}

impl BlobSink {
    async fn open(store: &dyn BlobStore, name: &str) -> Self {
        let mut sink = Self {
            name: name.to_string(),
            writer: None,
            error: None,
        };
        match store.create(name).await {
            Ok(writer) => sink.writer = Some(writer),
            Err(e) => sink.record(e),
        }
        sink
    }

    fn is_failed(&self) -> bool {
        self.writer.is_none()
    }

    fn record(&mut self, e: anyhow::Error) {
        error!("Blob store write for {} failed: {:#}", self.name, e);
        self.error = Some(format!("{:#}", e));
    }

    async fn write(&mut self, chunk: &[u8]) {
        let result = match self.writer.as_mut() {
            Some(writer) => writer.write_chunk(chunk).await,
            None => return,
        };
        if let Err(e) = result {
            self.record(e);
            self.discard().await;
        }
    }

    async fn discard(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.abort().await {
                warn!("Failed to abort blob {}: {:#}", self.name, e);
            }
        }
    }

    async fn finish(mut self) -> Result<u64, String> {
        let Some(mut writer) = self.writer.take() else {
            return Err(self.error.unwrap_or_default());
        };
        match writer.finish().await {
            Ok(size) => Ok(size),
            Err(e) => {
                self.record(e);
                if let Err(e) = writer.abort().await {
                    warn!("Failed to abort blob {}: {:#}", self.name, e);
                }
                Err(self.error.unwrap_or_default())
            }
        }
    }
}

/// Local-file half of the tee.
///
/// Bytes go to a hidden staging file next to the target, which is renamed
/// onto the target only once the part is complete. An earlier file with the
/// same name stays untouched until then.
struct LocalSink {
    path: PathBuf,
    staging: PathBuf,
    file: Option<File>,
    written: u64,
    error: Option<String>,
}

impl LocalSink {
    async fn open(dir: &Path, name: &str) -> Self {
        let mut sink = Self {
            path: dir.join(name),
            staging: dir.join(format!(".upload-{}.part", Uuid::new_v4())),
            file: None,
            written: 0,
            error: None,
        };
        match File::create(&sink.staging).await {
            Ok(file) => sink.file = Some(file),
            Err(e) => sink.record(e),
        }
        sink
    }

    fn is_failed(&self) -> bool {
        self.file.is_none()
    }

    fn record(&mut self, e: std::io::Error) {
        error!("Writing {} failed: {}", self.path.display(), e);
        self.error = Some(e.to_string());
    }

    async fn write(&mut self, chunk: &[u8]) {
        let result = match self.file.as_mut() {
            Some(file) => file.write_all(chunk).await,
            None => return,
        };
        match result {
            Ok(()) => self.written += chunk.len() as u64,
            Err(e) => {
                self.record(e);
                self.discard().await;
            }
        }
    }

    /// Closes and removes the staging file.
    async fn discard(&mut self) {
        if let Some(file) = self.file.take() {
            drop(file);
            if let Err(e) = tokio::fs::remove_file(&self.staging).await {
                warn!(
                    "Failed to remove staging file {}: {}",
                    self.staging.display(),
                    e
                );
            }
        }
    }

    async fn finish(mut self) -> Result<u64, String> {
        let Some(mut file) = self.file.take() else {
            return Err(self.error.unwrap_or_default());
        };
        let committed = match file.flush().await {
            Ok(()) => {
                drop(file);
                tokio::fs::rename(&self.staging, &self.path).await
            }
            Err(e) => {
                drop(file);
                Err(e)
            }
        };
        match committed {
            Ok(()) => Ok(self.written),
            Err(e) => {
                self.record(e);
                if let Err(e) = tokio::fs::remove_file(&self.staging).await {
                    warn!(
                        "Failed to remove staging file {}: {}",
                        self.staging.display(),
                        e
                    );
                }
                Err(self.error.unwrap_or_default())
            }
        }
    }
}
