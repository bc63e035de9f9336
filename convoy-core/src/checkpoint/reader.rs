//! Checkpoint reader
//!
//! Restores parameters and momentum buffers in place. A missing file is
//! an error; a missing index only disables verification.

use bytes::Bytes;
use ndarray::ArrayD;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::index::CheckpointIndex;
use super::params::{ParamSet, ParamSlot};
use super::writer::{momentum_file_name, weight_file_name};
use crate::array_io;
use crate::error::{ConvoyError, Result};

/// Reads checkpoints from one weights directory
#[derive(Debug, Clone)]
pub struct CheckpointReader {
    dir: PathBuf,
    verify: bool,
}

impl CheckpointReader {
    /// Create a reader that verifies against the epoch index
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            verify: true,
        }
    }

    /// Skip checksum verification
    pub fn without_verification(mut self) -> Self {
        self.verify = false;
        self
    }

    /// Restore owned parameters for `epoch`
    ///
    /// With `layer_range` set, only the listed layer indices are touched.
    pub fn load_weights<L: ParamSet>(
        &self,
        layers: &mut [L],
        epoch: u64,
        layer_range: Option<&[usize]>,
    ) -> Result<usize> {
        let index = self.open_index(epoch)?;
        let mut loaded = 0;

        for (idx, layer) in layers.iter_mut().enumerate() {
            if let Some(range) = layer_range {
                if !range.contains(&idx) {
                    continue;
                }
            }

            for slot in ParamSlot::ALL {
                if let Some(value) = layer.param_mut(slot) {
                    let file = weight_file_name(slot, idx, epoch);
                    *value = self.read_array(&file, index.as_ref())?;
                    loaded += 1;
                }
            }
        }

        info!("Loaded {} parameter files at epoch {}", loaded, epoch);
        Ok(loaded)
    }

    /// Restore momentum buffers by position for `epoch`
    pub fn load_momentums(&self, vels: &mut [ArrayD<f32>], epoch: u64) -> Result<usize> {
        let index = self.open_index(epoch)?;

        for (idx, vel) in vels.iter_mut().enumerate() {
            let file = momentum_file_name(idx, epoch);
            *vel = self.read_array(&file, index.as_ref())?;
        }

        info!("Loaded {} momentum buffers at epoch {}", vels.len(), epoch);
        Ok(vels.len())
    }

    fn open_index(&self, epoch: u64) -> Result<Option<CheckpointIndex>> {
        if !self.verify {
            return Ok(None);
        }
        let index = CheckpointIndex::load(&self.dir, epoch)?;
        if index.is_none() {
            warn!("No index for epoch {}, loading without verification", epoch);
        }
        Ok(index)
    }

    fn read_array(&self, file: &str, index: Option<&CheckpointIndex>) -> Result<ArrayD<f32>> {
        let path = self.dir.join(file);
        let data: Bytes =
            array_io::read_bytes(&path).map_err(|e| ConvoyError::checkpoint_io(&path, e))?;

        if let Some(entry) = index.and_then(|i| i.get(file)) {
            let actual = crc32c::crc32c(&data);
            if actual != entry.crc32c {
                return Err(ConvoyError::ChecksumMismatch {
                    file: file.to_string(),
                    expected: entry.crc32c,
                    actual,
                });
            }
            if data.len() as u64 != entry.byte_size {
                return Err(ConvoyError::IndexInvalid {
                    reason: format!(
                        "Size mismatch for {}: expected {}, got {}",
                        file,
                        entry.byte_size,
                        data.len()
                    ),
                });
            }
            debug!("Verified {} ({} bytes)", file, data.len());
        }

        array_io::decode(&data, &path)
    }
}
