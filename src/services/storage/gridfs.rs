use super::{BlobStore, BlobWriter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{AsyncWriteExt, TryStreamExt};
use mongodb::bson::doc;
use mongodb::gridfs::{GridFsBucket, GridFsUploadStream};
use mongodb::options::GridFsBucketOptions;
use mongodb::{Client, Database};

/// Blobs kept in a MongoDB GridFS bucket.
///
/// GridFS keeps every revision of a name; readers resolve a name to its most
/// recent upload.
pub struct GridFsBlobStore {
    database: Database,
    bucket: GridFsBucket,
}

impl GridFsBlobStore {
    /// Parses the URI and builds a client. The driver connects lazily, so
    /// reachability is only known after `ping`.
    pub async fn connect(uri: &str, database: &str, bucket: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .with_context(|| format!("invalid MongoDB connection string {:?}", uri))?;
        Ok(Self::new(client.database(database), bucket))
    }

    pub fn new(database: Database, bucket: &str) -> Self {
        let options = GridFsBucketOptions::builder()
            .bucket_name(bucket.to_string())
            .build();
        let bucket = database.gridfs_bucket(options);
        Self { database, bucket }
    }
}

#[async_trait]
impl BlobStore for GridFsBlobStore {
    async fn create(&self, name: &str) -> Result<Box<dyn BlobWriter>> {
        let stream = self.bucket.open_upload_stream(name, None);
        Ok(Box::new(GridFsBlobWriter { stream, written: 0 }))
    }

    async fn list_names(&self) -> Result<Vec<String>> {
        let mut cursor = self.bucket.find(doc! {}, None).await?;
        let mut names = Vec::new();
        while let Some(file) = cursor.try_next().await? {
            if let Some(name) = file.filename {
                names.push(name);
            }
        }
        Ok(names)
    }

    async fn ping(&self) -> Result<()> {
        self.database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .context("MongoDB did not answer ping")?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "gridfs"
    }
}

struct GridFsBlobWriter {
    stream: GridFsUploadStream,
    written: u64,
}

#[async_trait]
impl BlobWriter for GridFsBlobWriter {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.stream.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn finish(&mut self) -> Result<u64> {
        // close() flushes the last chunk and writes the files document
        self.stream.close().await?;
        Ok(self.written)
    }

    async fn abort(mut self: Box<Self>) -> Result<()> {
        self.stream.abort().await?;
        Ok(())
    }
}
