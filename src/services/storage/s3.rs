use super::{BlobStore, BlobWriter};
use crate::config::S3Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use tracing::info;

/// Buffered bytes that trigger an UploadPart call. S3 requires every part but
/// the last to be at least 5 MB.
const PART_SIZE: usize = 10 * 1024 * 1024;

pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Builds a client from `config`. Nothing is sent until `ping`, which also
    /// creates the bucket when it is missing.
    pub async fn connect(config: &S3Config) -> Result<Self> {
        let mut loader = aws_config::from_env().region(Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "static",
            ));
        }
        let aws_config = loader.load().await;

        // MinIO and other self-hosted endpoints only speak path-style URLs
        let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .force_path_style(config.endpoint.is_some())
            .build();

        Ok(Self::new(Client::from_conf(s3_config), config.bucket.clone()))
    }

    async fn ensure_bucket(&self) -> Result<()> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            info!("✅ Bucket '{}' is ready", self.bucket);
            return Ok(());
        }

        info!("🪣 Bucket '{}' not found, creating...", self.bucket);
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .with_context(|| format!("failed to create bucket '{}'", self.bucket))?;
        info!("✅ Bucket '{}' created successfully", self.bucket);
        Ok(())
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn create(&self, name: &str) -> Result<Box<dyn BlobWriter>> {
        Ok(Box::new(S3BlobWriter {
            client: self.client.clone(),
            bucket: self.bucket.clone(),
            key: name.to_string(),
            buffer: Vec::new(),
            upload_id: None,
            parts: Vec::new(),
            written: 0,
        }))
    }

    async fn list_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut continuation_token = None;

        loop {
            let res = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_continuation_token(continuation_token)
                .send()
                .await?;

            if let Some(contents) = res.contents {
                names.extend(contents.into_iter().filter_map(|object| object.key));
            }

            if res.is_truncated.unwrap_or(false) {
                continuation_token = res.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(names)
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_bucket().await
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

/// Streams a blob as a multipart upload, falling back to a single PutObject
/// when the whole blob fits in one part.
struct S3BlobWriter {
    client: Client,
    bucket: String,
    key: String,
    buffer: Vec<u8>,
    upload_id: Option<String>,
    parts: Vec<CompletedPart>,
    written: u64,
}

impl S3BlobWriter {
    async fn upload_id(&mut self) -> Result<String> {
        if let Some(id) = &self.upload_id {
            return Ok(id.clone());
        }

        let res = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await?;
        let id = res
            .upload_id()
            .ok_or_else(|| anyhow::anyhow!("No upload ID"))?
            .to_string();
        self.upload_id = Some(id.clone());
        Ok(id)
    }

    async fn flush_part(&mut self) -> Result<()> {
        let upload_id = self.upload_id().await?;
        let part_number = self.parts.len() as i32 + 1;
        let body = ByteStream::from(std::mem::take(&mut self.buffer));

        let res = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(upload_id)
            .body(body)
            .part_number(part_number)
            .send()
            .await?;

        self.parts.push(
            CompletedPart::builder()
                .e_tag(res.e_tag().unwrap_or_default())
                .part_number(part_number)
                .build(),
        );
        Ok(())
    }
}

#[async_trait]
impl BlobWriter for S3BlobWriter {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(chunk);
        self.written += chunk.len() as u64;
        if self.buffer.len() >= PART_SIZE {
            self.flush_part().await?;
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<u64> {
        let Some(upload_id) = self.upload_id.clone() else {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&self.key)
                .body(ByteStream::from(std::mem::take(&mut self.buffer)))
                .send()
                .await?;
            return Ok(self.written);
        };

        if !self.buffer.is_empty() {
            self.flush_part().await?;
        }

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(self.parts.clone()))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await?;

        // nothing left for abort to clean up
        self.upload_id = None;
        Ok(self.written)
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        if let Some(upload_id) = &self.upload_id {
            self.client
                .abort_multipart_upload()
                .bucket(&self.bucket)
                .key(&self.key)
                .upload_id(upload_id)
                .send()
                .await?;
        }
        Ok(())
    }
}
