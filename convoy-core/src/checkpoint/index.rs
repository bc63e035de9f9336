//! Per-epoch checkpoint index
//!
//! Records every parameter and momentum file written for an epoch along
//! with its size and CRC32C. Loaders verify against it when present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{ConvoyError, Result};

/// What a checkpoint file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Weight,
    Momentum,
}

/// One file in the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// File name relative to the weights directory
    pub file: String,
    pub kind: EntryKind,
    pub byte_size: u64,
    pub crc32c: u32,
}

/// Index of the files saved for one epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointIndex {
    /// Index format version
    pub version: u32,
    pub epoch: u64,
    /// Last update time
    pub timestamp_utc: DateTime<Utc>,
    pub entries: Vec<IndexEntry>,
}

impl CheckpointIndex {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(epoch: u64) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            epoch,
            timestamp_utc: Utc::now(),
            entries: Vec::new(),
        }
    }

    /// Insert or replace the entry for `entry.file`
    pub fn upsert(&mut self, entry: IndexEntry) {
        match self.entries.iter_mut().find(|e| e.file == entry.file) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self.timestamp_utc = Utc::now();
    }

    /// Drop the entry for `file`, returning it if present
    pub fn remove(&mut self, file: &str) -> Option<IndexEntry> {
        let pos = self.entries.iter().position(|e| e.file == file)?;
        self.timestamp_utc = Utc::now();
        Some(self.entries.remove(pos))
    }

    pub fn get(&self, file: &str) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.file == file)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConvoyError::IndexInvalid {
            reason: format!("Serialization failed: {}", e),
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let index: Self = serde_json::from_str(json).map_err(|e| ConvoyError::IndexInvalid {
            reason: format!("Deserialization failed: {}", e),
        })?;

        if index.version > Self::CURRENT_VERSION {
            return Err(ConvoyError::IndexInvalid {
                reason: format!(
                    "Index version {} is newer than supported {}",
                    index.version,
                    Self::CURRENT_VERSION
                ),
            });
        }

        Ok(index)
    }

    /// Check for duplicate file names
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.file.as_str()) {
                return Err(ConvoyError::IndexInvalid {
                    reason: format!("Duplicate entry: {}", entry.file),
                });
            }
        }
        Ok(())
    }

    /// File name of the index for `epoch`
    pub fn file_name(epoch: u64) -> String {
        format!("index_{}.json", epoch)
    }

    pub fn path(dir: &Path, epoch: u64) -> PathBuf {
        dir.join(Self::file_name(epoch))
    }

    /// Load the index for `epoch`, `None` if it was never written
    pub fn load(dir: &Path, epoch: u64) -> Result<Option<Self>> {
        let path = Self::path(dir, epoch);
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No checkpoint index at {}", path.display());
                return Ok(None);
            }
            Err(source) => return Err(ConvoyError::Io { path, source }),
        };
        let index = Self::from_json(&json)?;
        index.validate()?;
        Ok(Some(index))
    }

    /// Write the index through a temp file and rename it into place
    pub fn store(&self, dir: &Path) -> Result<()> {
        let path = Self::path(dir, self.epoch);
        let tmp = dir.join(format!(".{}.tmp", Self::file_name(self.epoch)));
        let json = self.to_json()?;
        std::fs::write(&tmp, json).map_err(|source| ConvoyError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| ConvoyError::Io { path, source })
    }
}

/// Parse the epoch out of an index file name
fn parse_epoch(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix("index_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

/// Highest epoch in `dir` that has an index
pub fn latest_epoch(dir: &Path) -> Result<Option<u64>> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut latest = None;
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| ConvoyError::Io {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        if let Some(epoch) = parse_epoch(&entry.file_name().to_string_lossy()) {
            if latest.map_or(true, |e| epoch > e) {
                latest = Some(epoch);
            }
        }
    }

    Ok(latest)
}
