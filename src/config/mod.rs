use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use std::env;
use std::path::PathBuf;

/// Default ceiling for a whole multipart request body: 256 MB
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 256 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Webserver port
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Directory path for uploaded files
    #[arg(long, default_value = "./up/")]
    pub dir: String,

    /// Printer the print route may target (repeatable)
    #[arg(long = "printer")]
    pub printers: Vec<String>,

    /// Command used to submit print jobs
    #[arg(long)]
    pub print_command: Option<String>,

    /// Blob store backend (overrides BLOB_BACKEND)
    #[arg(long, value_enum)]
    pub blob_backend: Option<BlobBackend>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BlobBackend {
    /// MongoDB GridFS bucket
    Gridfs,
    /// S3-compatible object storage
    S3,
    /// In-process map, contents are lost on exit
    Memory,
}

impl std::fmt::Display for BlobBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BlobBackend::Gridfs => "gridfs",
            BlobBackend::S3 => "s3",
            BlobBackend::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: String,
    pub region: String,
}

/// Connection settings for the external blob store
#[derive(Debug, Clone)]
pub struct BlobConfig {
    pub backend: BlobBackend,

    /// MongoDB connection string (default: "mongodb://localhost:27017")
    pub mongodb_uri: String,

    /// Database holding the GridFS bucket (default: "test")
    pub mongodb_database: String,

    /// GridFS bucket name (default: "fs")
    pub gridfs_bucket: String,

    pub s3: S3Config,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            backend: BlobBackend::Gridfs,
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            mongodb_database: "test".to_string(),
            gridfs_bucket: "fs".to_string(),
            s3: S3Config {
                endpoint: None,
                access_key: None,
                secret_key: None,
                bucket: "uploads".to_string(),
                region: "us-east-1".to_string(),
            },
        }
    }
}

impl BlobConfig {
    /// Load storage settings from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            backend: env::var("BLOB_BACKEND")
                .ok()
                .and_then(|v| BlobBackend::from_str(&v, true).ok())
                .unwrap_or(default.backend),

            mongodb_uri: env::var("MONGODB_URI").unwrap_or(default.mongodb_uri),

            mongodb_database: env::var("MONGODB_DATABASE").unwrap_or(default.mongodb_database),

            gridfs_bucket: env::var("GRIDFS_BUCKET").unwrap_or(default.gridfs_bucket),

            s3: S3Config {
                endpoint: env::var("S3_ENDPOINT").ok(),
                access_key: env::var("S3_ACCESS_KEY").ok(),
                secret_key: env::var("S3_SECRET_KEY").ok(),
                bucket: env::var("S3_BUCKET").unwrap_or(default.s3.bucket),
                region: env::var("S3_REGION").unwrap_or(default.s3.region),
            },
        }
    }

    pub fn memory() -> Self {
        Self {
            backend: BlobBackend::Memory,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrintConfig {
    /// Printers the print route is allowed to target. Empty disables printing.
    pub allowed_printers: Vec<String>,

    /// Executable spawned for each print job (default: "lp")
    pub command: String,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            allowed_printers: Vec::new(),
            command: "lp".to_string(),
        }
    }
}

impl PrintConfig {
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            allowed_printers: env::var("UPLOADER_PRINTERS")
                .map(|v| split_list(&v))
                .unwrap_or(default.allowed_printers),

            command: env::var("PRINT_COMMAND").unwrap_or(default.command),
        }
    }

    pub fn is_allowed(&self, printer: &str) -> bool {
        self.allowed_printers.iter().any(|p| p == printer)
    }
}

/// Everything the server needs, resolved once at startup
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    pub port: u16,
    pub upload_dir: PathBuf,
    pub max_upload_size: usize,
    pub blob: BlobConfig,
    pub print: PrintConfig,
}

impl UploaderConfig {
    /// Merge command-line flags over environment settings
    pub fn from_cli(cli: Cli) -> Result<Self> {
        if cli.dir.trim().is_empty() {
            bail!("Please specify directory path for uploaded files");
        }

        let mut blob = BlobConfig::from_env();
        if let Some(backend) = cli.blob_backend {
            blob.backend = backend;
        }

        let mut print = PrintConfig::from_env();
        if !cli.printers.is_empty() {
            print.allowed_printers = cli.printers;
        }
        if let Some(command) = cli.print_command {
            print.command = command;
        }

        Ok(Self {
            port: cli.port,
            upload_dir: PathBuf::from(cli.dir),
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_SIZE),
            blob,
            print,
        })
    }

    /// Config for tests and local runs: memory blob store, no printers
    pub fn development(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            port: 8080,
            upload_dir: upload_dir.into(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            blob: BlobConfig::memory(),
            print: PrintConfig::default(),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
