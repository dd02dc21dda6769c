use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub mod gridfs;
pub mod s3;

pub use gridfs::GridFsBlobStore;
pub use s3::S3BlobStore;

/// Name-addressed binary object store that uploads are mirrored into.
///
/// Writing a name that already exists makes the new blob the one returned
/// for that name from then on.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Opens a write stream for a blob called `name`.
    async fn create(&self, name: &str) -> Result<Box<dyn BlobWriter>>;

    /// Names of every blob currently stored.
    async fn list_names(&self) -> Result<Vec<String>>;

    /// Round trip to the backend; fails when it is unreachable.
    async fn ping(&self) -> Result<()>;

    fn backend_name(&self) -> &'static str;
}

/// An open, not yet committed blob.
///
/// Data written before `finish` returns is not visible to readers. A writer
/// whose `finish` failed must still be passed to `abort` so the backend can
/// drop whatever it already received.
#[async_trait]
pub trait BlobWriter: Send {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()>;

    /// Commits the blob and returns the number of bytes stored.
    async fn finish(&mut self) -> Result<u64>;

    /// Discards everything written so far.
    async fn abort(self: Box<Self>) -> Result<()>;
}

/// Process-local store used by the `memory` backend and the test suite
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        lock(&self.blobs).get(name).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.blobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock(blobs: &Mutex<HashMap<String, Vec<u8>>>) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
    blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn create(&self, name: &str) -> Result<Box<dyn BlobWriter>> {
        Ok(Box::new(MemoryBlobWriter {
            name: name.to_string(),
            buffer: Vec::new(),
            blobs: self.blobs.clone(),
        }))
    }

    async fn list_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = lock(&self.blobs).keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryBlobWriter {
    name: String,
    buffer: Vec<u8>,
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

#[async_trait]
impl BlobWriter for MemoryBlobWriter {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    async fn finish(&mut self) -> Result<u64> {
        let buffer = std::mem::take(&mut self.buffer);
        let size = buffer.len() as u64;
        lock(&self.blobs).insert(self.name.clone(), buffer);
        Ok(size)
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
