//! Training configuration
//!
//! Immutable settings shared by the partitioner, the dataset loader,
//! the augmentation sampler and checkpoint I/O. Built once per rank and
//! passed by reference.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ConvoyError, Result};

/// Where training shards come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataSource {
    /// One file per shard
    Hkl,
    /// Key-indexed record store, shards addressed by offset
    Lmdb,
    /// Shard files plus record-store offsets
    Both,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Hkl => "hkl",
            DataSource::Lmdb => "lmdb",
            DataSource::Both => "both",
        }
    }

    /// Whether this mode produces record offsets
    pub fn uses_offsets(&self) -> bool {
        matches!(self, DataSource::Lmdb | DataSource::Both)
    }

    /// Whether this mode iterates shard files
    pub fn uses_files(&self) -> bool {
        matches!(self, DataSource::Hkl | DataSource::Both)
    }
}

impl FromStr for DataSource {
    type Err = ConvoyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hkl" => Ok(DataSource::Hkl),
            "lmdb" => Ok(DataSource::Lmdb),
            "both" => Ok(DataSource::Both),
            other => Err(ConvoyError::UnsupportedDataSource {
                source_name: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for DataSource {
    type Error = ConvoyError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DataSource> for String {
    fn from(source: DataSource) -> Self {
        source.as_str().to_string()
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-rank training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Prefix joined onto every dataset path below
    pub dir_head: String,
    /// Training shard folder, relative to `dir_head`
    pub train_folder: String,
    /// Validation shard folder, relative to `dir_head`
    pub val_folder: String,
    /// Label folder, relative to `dir_head`
    pub label_folder: String,
    /// Mean image file, relative to `dir_head`
    pub mean_file: String,
    /// Directory holding weight and momentum checkpoints
    #[serde(default = "default_weights_dir")]
    pub weights_dir: PathBuf,
    /// Load batches in a parallel loader process
    #[serde(default)]
    pub para_load: bool,
    /// Report top-5 error alongside top-1
    #[serde(default)]
    pub flag_top_5: bool,
    /// Total number of ranks
    pub size: usize,
    /// This process's rank
    #[serde(default)]
    pub rank: usize,
    /// Examples per shard
    pub file_batch_size: usize,
    /// Storage mode
    #[serde(default = "default_data_source")]
    pub data_source: DataSource,
    /// Master switch for training-time randomness
    #[serde(default)]
    pub random: bool,
    /// Random crop and flip augmentation
    #[serde(default)]
    pub rand_crop: bool,
    /// Identifier mixed into the crop seed
    #[serde(default)]
    pub worker_id: u64,
}

fn default_weights_dir() -> PathBuf {
    PathBuf::from("weights")
}

fn default_data_source() -> DataSource {
    DataSource::Hkl
}

impl TrainConfig {
    /// Parse and validate a config from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConvoyError::InvalidConfig {
            reason: format!("Deserialization failed: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConvoyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Check rank-pool and batch settings
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(ConvoyError::InvalidConfig {
                reason: "size must be at least 1".into(),
            });
        }
        if self.rank >= self.size {
            return Err(ConvoyError::InvalidConfig {
                reason: format!("rank {} out of range for size {}", self.rank, self.size),
            });
        }
        if self.file_batch_size == 0 {
            return Err(ConvoyError::InvalidConfig {
                reason: "file_batch_size must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Copy of this config as seen by another rank
    pub fn for_rank(&self, rank: usize) -> Self {
        Self {
            rank,
            ..self.clone()
        }
    }

    pub fn train_dir(&self) -> PathBuf {
        PathBuf::from(format!("{}{}", self.dir_head, self.train_folder))
    }

    pub fn val_dir(&self) -> PathBuf {
        PathBuf::from(format!("{}{}", self.dir_head, self.val_folder))
    }

    /// Label file path; the label folder is concatenated, not joined
    pub fn label_path(&self, stem: &str, ext: &str) -> PathBuf {
        PathBuf::from(format!(
            "{}{}{}{}",
            self.dir_head, self.label_folder, stem, ext
        ))
    }

    pub fn mean_path(&self) -> PathBuf {
        PathBuf::from(format!("{}{}", self.dir_head, self.mean_file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "dir_head": "/data/",
        "train_folder": "train_hkl",
        "val_folder": "val_hkl",
        "label_folder": "labels/",
        "mean_file": "img_mean.npy",
        "size": 4,
        "rank": 1,
        "file_batch_size": 128
    }"#;

    #[test]
    fn test_defaults_and_paths() {
        let config = TrainConfig::from_json(MINIMAL).unwrap();
        assert_eq!(config.data_source, DataSource::Hkl);
        assert!(!config.rand_crop);
        assert_eq!(config.train_dir(), PathBuf::from("/data/train_hkl"));
        assert_eq!(
            config.label_path("train_labels", ".npy"),
            PathBuf::from("/data/labels/train_labels.npy")
        );
        assert_eq!(config.mean_path(), PathBuf::from("/data/img_mean.npy"));
    }

    #[test]
    fn test_unknown_data_source_rejected() {
        let json = MINIMAL.replace("\"size\": 4", "\"data_source\": \"tfrecord\", \"size\": 4");
        let err = TrainConfig::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("tfrecord"));

        let err = "tfrecord".parse::<DataSource>().unwrap_err();
        assert!(matches!(err, ConvoyError::UnsupportedDataSource { .. }));
    }

    #[test]
    fn test_rank_out_of_range() {
        let json = MINIMAL.replace("\"rank\": 1", "\"rank\": 4");
        assert!(TrainConfig::from_json(&json).is_err());
    }

    #[test]
    fn test_data_source_roundtrip() {
        let config = TrainConfig::from_json(
            &MINIMAL.replace("\"size\": 4", "\"data_source\": \"both\", \"size\": 4"),
        )
        .unwrap();
        assert_eq!(config.data_source, DataSource::Both);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"data_source\":\"both\""));
    }
}
