//! Error types for Convoy
//!
//! Covers configuration, dataset discovery, partitioning, checkpoint
//! and communication-type errors.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for all Convoy operations
#[derive(Debug, Error)]
pub enum ConvoyError {
    // ========== Configuration Errors ==========

    /// Config file could not be parsed
    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// Storage mode not one of hkl, lmdb, both
    #[error("Unsupported data source: {source_name}")]
    UnsupportedDataSource { source_name: String },

    // ========== Data Errors ==========

    /// Dataset folder or file not found
    #[error("Dataset not found: {}", .path.display())]
    DatasetNotFound { path: PathBuf },

    /// Array file could not be read or written
    #[error("Array I/O failed for {}: {reason}", .path.display())]
    Npy { path: PathBuf, reason: String },

    /// Record store could not report its size
    #[error("Record store error: {message}")]
    RecordStore { message: String },

    // ========== Partition Errors ==========

    /// Invalid partition request (zero ranks, zero batch size, ...)
    #[error("Invalid shard spec: {reason}")]
    InvalidShardSpec { reason: String },

    /// Fewer labels than the shards require
    #[error("Label count {actual} is short of {expected} required by {shards} shards")]
    LabelShortfall { expected: usize, actual: usize, shards: usize },

    // ========== Checkpoint Errors ==========

    /// Required checkpoint file is absent
    #[error("Checkpoint file missing: {}", .path.display())]
    CheckpointFileMissing { path: PathBuf },

    /// Checksum mismatch on read
    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch { file: String, expected: u32, actual: u32 },

    /// Checkpoint index validation failed
    #[error("Checkpoint index invalid: {reason}")]
    IndexInvalid { reason: String },

    // ========== Communication Errors ==========

    /// Element type has no collective type tag
    #[error("Cannot convert type {type_name} to a communication type")]
    UnsupportedElementType { type_name: String },

    // ========== Runtime Errors ==========

    /// Underlying I/O failure
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConvoyError {
    /// Wrap an I/O error, mapping not-found to the checkpoint variant
    pub fn checkpoint_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            ConvoyError::CheckpointFileMissing { path }
        } else {
            ConvoyError::Io { path, source }
        }
    }

    /// Returns true if this error indicates data corruption
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            ConvoyError::ChecksumMismatch { .. } | ConvoyError::IndexInvalid { .. }
        )
    }

    /// Returns true if this error means something on disk is absent
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            ConvoyError::CheckpointFileMissing { .. } | ConvoyError::DatasetNotFound { .. }
        )
    }
}

/// Result type alias for Convoy operations
pub type Result<T> = std::result::Result<T, ConvoyError>;
