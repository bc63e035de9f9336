//! Checkpoint I/O
//!
//! Per-layer parameter files and optimizer momentum buffers, keyed by
//! layer index and epoch, with a CRC32C index per epoch.

pub mod index;
pub mod params;
pub mod reader;
pub mod writer;

pub use index::{latest_epoch, CheckpointIndex, EntryKind, IndexEntry};
pub use params::{LayerParams, ParamSet, ParamSlot};
pub use reader::CheckpointReader;
pub use writer::{momentum_file_name, weight_file_name, CheckpointWriter};

use ndarray::ArrayD;
use std::path::Path;

use crate::error::Result;

/// Save every owned parameter of `layers` under `weights_dir`
pub fn save_weights<L: ParamSet>(layers: &[L], weights_dir: &Path, epoch: u64) -> Result<()> {
    CheckpointWriter::new(weights_dir)?.save_weights(layers, epoch)?;
    Ok(())
}

/// Restore parameters of `layers`, optionally only those in `layer_range`
pub fn load_weights<L: ParamSet>(
    layers: &mut [L],
    weights_dir: &Path,
    epoch: u64,
    layer_range: Option<&[usize]>,
) -> Result<()> {
    CheckpointReader::new(weights_dir).load_weights(layers, epoch, layer_range)?;
    Ok(())
}

pub fn save_momentums(vels: &[ArrayD<f32>], weights_dir: &Path, epoch: u64) -> Result<()> {
    CheckpointWriter::new(weights_dir)?.save_momentums(vels, epoch)?;
    Ok(())
}

pub fn load_momentums(vels: &mut [ArrayD<f32>], weights_dir: &Path, epoch: u64) -> Result<()> {
    CheckpointReader::new(weights_dir).load_momentums(vels, epoch)?;
    Ok(())
}
