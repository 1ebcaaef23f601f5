//! Typed error definitions for pdf_exporter.
//! Provides the well-known failure modes of the ingestion agent for better logs and tests.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Configuration file not found: {0}")]
    ConfigMissing(PathBuf),

    #[error("Configuration file {path} is invalid: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("{label} directory '{path}' is unavailable: {reason}")]
    DirectoryUnavailable {
        label: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("Could not allocate a sequence number for {year}: {reason}")]
    Allocation { year: i32, reason: String },

    #[error("Refusing to allocate for {year}: counters for {latest} already exist")]
    StaleYear { year: i32, latest: i32 },

    #[error("Custody lost for {path}: {reason}")]
    CustodyLoss { path: PathBuf, reason: String },

    #[error("Directory watch failed: {0}")]
    Watch(String),

    #[error("Could not start background worker: {0}")]
    Spawn(String),
}

impl IngestError {
    /// Stable numeric code emitted as a structured log field.
    pub fn code(&self) -> u16 {
        match self {
            IngestError::ConfigMissing(_) => 10,
            IngestError::ConfigInvalid { .. } => 11,
            IngestError::DirectoryUnavailable { .. } => 12,
            IngestError::Allocation { .. } => 20,
            IngestError::StaleYear { .. } => 21,
            IngestError::CustodyLoss { .. } => 30,
            IngestError::Watch(_) => 40,
            IngestError::Spawn(_) => 41,
        }
    }

    /// True for the failures that abort a service start.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            IngestError::ConfigMissing(_)
                | IngestError::ConfigInvalid { .. }
                | IngestError::DirectoryUnavailable { .. }
        )
    }
}
