//! Checkpoint writer
//!
//! Writes each owned parameter of each layer, and each momentum buffer,
//! to its own `.npy` file and records it in the epoch index.

use bytes::Bytes;
use ndarray::ArrayD;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::index::{CheckpointIndex, EntryKind, IndexEntry};
use super::params::{ParamSet, ParamSlot};
use crate::array_io;
use crate::error::{ConvoyError, Result};

/// `<slot>_<layer>_<epoch>.npy`
pub fn weight_file_name(slot: ParamSlot, layer: usize, epoch: u64) -> String {
    format!("{}_{}_{}.npy", slot.name(), layer, epoch)
}

/// `mom_<idx>_<epoch>.npy`
pub fn momentum_file_name(idx: usize, epoch: u64) -> String {
    format!("mom_{}_{}.npy", idx, epoch)
}

/// Writes checkpoints into one weights directory
#[derive(Debug, Clone)]
pub struct CheckpointWriter {
    dir: PathBuf,
}

impl CheckpointWriter {
    /// Create a writer, creating `dir` if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| ConvoyError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Save every owned parameter of every layer for `epoch`
    pub fn save_weights<L: ParamSet>(&self, layers: &[L], epoch: u64) -> Result<usize> {
        let mut pending = Vec::new();
        for (idx, layer) in layers.iter().enumerate() {
            for slot in ParamSlot::ALL {
                if let Some(value) = layer.param(slot) {
                    pending.push((weight_file_name(slot, idx, epoch), value, EntryKind::Weight));
                }
            }
        }

        let written = self.write_epoch(epoch, &pending)?;
        info!(
            "Saved {} parameter files for {} layers at epoch {}",
            written,
            layers.len(),
            epoch
        );
        Ok(written)
    }

    /// Save momentum buffers by position for `epoch`
    pub fn save_momentums(&self, vels: &[ArrayD<f32>], epoch: u64) -> Result<usize> {
        let pending: Vec<_> = vels
            .iter()
            .enumerate()
            .map(|(idx, vel)| (momentum_file_name(idx, epoch), vel, EntryKind::Momentum))
            .collect();

        let written = self.write_epoch(epoch, &pending)?;
        info!("Saved {} momentum buffers at epoch {}", written, epoch);
        Ok(written)
    }

    /// Write `pending` files and record them in the epoch index
    ///
    /// Entries about to be overwritten are dropped from the index before
    /// any file is touched, and the index is stored again even when a
    /// write fails, so it never vouches for bytes that are not on disk.
    fn write_epoch(
        &self,
        epoch: u64,
        pending: &[(String, &ArrayD<f32>, EntryKind)],
    ) -> Result<usize> {
        let mut index = CheckpointIndex::load(&self.dir, epoch)?
            .unwrap_or_else(|| CheckpointIndex::new(epoch));
        for (file, _, _) in pending {
            index.remove(file);
        }
        index.store(&self.dir)?;

        let mut outcome = Ok(0);
        for (file, value, kind) in pending {
            match self.write_array(file, value, *kind) {
                Ok(entry) => {
                    index.upsert(entry);
                    outcome = outcome.map(|n| n + 1);
                }
                Err(e) => {
                    warn!("Checkpoint write of {} failed: {}", file, e);
                    outcome = Err(e);
                    break;
                }
            }
        }

        index.store(&self.dir)?;
        outcome
    }

    fn write_array(&self, file: &str, value: &ArrayD<f32>, kind: EntryKind) -> Result<IndexEntry> {
        let path = self.dir.join(file);
        let data: Bytes = array_io::encode(value, &path)?;
        let crc32c = crc32c::crc32c(&data);

        std::fs::write(&path, &data).map_err(|source| ConvoyError::Io {
            path: path.clone(),
            source,
        })?;

        debug!("Wrote {} ({} bytes, crc32c={})", file, data.len(), crc32c);

        Ok(IndexEntry {
            file: file.to_string(),
            kind,
            byte_size: data.len() as u64,
            crc32c,
        })
    }
}
