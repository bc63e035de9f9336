//! Convoy Core - data and checkpoint helpers for distributed training
//!
//! Utilities called by every rank of an externally coordinated
//! training loop:
//! - Shard discovery and rank-balanced padding
//! - Crop/flip parameter sampling
//! - Per-layer weight and momentum checkpoints
//! - Element type mapping for the collective layer

pub mod array_io;
pub mod augment;
pub mod checkpoint;
pub mod comm;
pub mod config;
pub mod data;
pub mod error;

pub use config::{DataSource, TrainConfig};
pub use error::{ConvoyError, Result};
