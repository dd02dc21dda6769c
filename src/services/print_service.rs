use crate::config::PrintConfig;
use crate::utils::validation::{ValidationError, validate_file_name, validate_printer_name};
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum PrintError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("printer {0:?} is not allowed")]
    PrinterNotAllowed(String),

    #[error("file {0:?} not found")]
    FileNotFound(String),

    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Sends uploaded files to an allow-listed printer through the print command
pub struct PrintService {
    config: PrintConfig,
    upload_dir: PathBuf,
}

impl PrintService {
    pub fn new(config: PrintConfig, upload_dir: PathBuf) -> Self {
        Self { config, upload_dir }
    }

    /// Runs `<command> -d <printer> <upload dir>/<file>` without a shell.
    pub async fn print(&self, printer: &str, file_name: &str) -> Result<(), PrintError> {
        validate_printer_name(printer)?;
        if !self.config.is_allowed(printer) {
            warn!("Print request for printer {:?} outside the allow-list", printer);
            return Err(PrintError::PrinterNotAllowed(printer.to_string()));
        }

        validate_file_name(file_name)?;
        let path = self.upload_dir.join(file_name);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            _ => return Err(PrintError::FileNotFound(file_name.to_string())),
        }

        let output = Command::new(&self.config.command)
            .arg("-d")
            .arg(printer)
            .arg(&path)
            .output()
            .await
            .map_err(|source| {
                error!("Failed to start {}: {}", self.config.command, source);
                PrintError::Spawn {
                    command: self.config.command.clone(),
                    source,
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("{} failed: {}", self.config.command, stderr);
            return Err(PrintError::CommandFailed {
                command: self.config.command.clone(),
                status: output.status,
                stderr,
            });
        }

        info!("🖨️  Sent {} to printer {}", file_name, printer);
        Ok(())
    }
}
