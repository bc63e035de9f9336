//! Data preparation
//!
//! Shard discovery, rank-balanced padding and per-rank assignment.

pub mod assigner;
pub mod dataset;
pub mod partition;

pub use assigner::RankAssigner;
pub use dataset::{list_shard_files, load_labels, load_mean_image, DatasetFiles};
pub use partition::{
    bad_list, extend_data, padding_needed, InMemoryRecordStore, Partition, RecordStore,
};
