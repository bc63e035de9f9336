//! Rank-balanced shard padding
//!
//! Pads the shard list, record offsets and labels so that every rank
//! receives the same number of shards per epoch. Padding repeats the
//! tail of each sequence; nothing is dropped.

use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::{DataSource, TrainConfig};
use crate::error::{ConvoyError, Result};

/// Key-indexed record store backing the `lmdb` storage mode
pub trait RecordStore {
    /// Total number of records in the store
    fn entry_count(&self) -> Result<u64>;
}

/// Record store that only knows its size
#[derive(Debug, Clone, Copy)]
pub struct InMemoryRecordStore {
    entries: u64,
}

impl InMemoryRecordStore {
    pub fn new(entries: u64) -> Self {
        Self { entries }
    }
}

impl RecordStore for InMemoryRecordStore {
    fn entry_count(&self) -> Result<u64> {
        Ok(self.entries)
    }
}

/// Indices of the trailing units that cannot be spread evenly
///
/// Listed from the last unit backwards, e.g. `bad_list(10, 4) == [9, 8]`.
pub fn bad_list(n_units: usize, rank_count: usize) -> Vec<usize> {
    if rank_count == 0 {
        return Vec::new();
    }
    let leftover = n_units % rank_count;
    (0..leftover).map(|bad| n_units - (bad + 1)).collect()
}

/// Number of extra units needed to reach the next multiple of `rank_count`
pub fn padding_needed(n_units: usize, rank_count: usize) -> usize {
    if rank_count == 0 {
        return 0;
    }
    (rank_count - n_units % rank_count) % rank_count
}

/// Append `need` groups of `group` items, taken from the tail
///
/// With fewer groups than `need` the tail wraps around, so the result
/// always holds `n_groups + need` whole groups.
fn pad_tail<T: Clone>(items: &mut Vec<T>, group: usize, need: usize) {
    if need == 0 || group == 0 || items.len() < group {
        return;
    }
    let n_groups = items.len() / group;
    let start = n_groups - need % n_groups;
    items.reserve(need * group);
    for i in 0..need {
        let g = (start + i) % n_groups;
        items.extend_from_within(g * group..(g + 1) * group);
    }
}

/// Shard list after padding
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Shard files, padded in `hkl` and `both` modes and returned
    /// untouched in `lmdb` mode
    pub filenames: Vec<PathBuf>,
    /// Labels, `file_batch_size` per shard
    pub labels: Vec<i64>,
    /// Record offsets (`lmdb` and `both` only)
    pub record_offsets: Option<Vec<u64>>,
    /// Shard count after padding
    pub n_files: usize,
    /// Trailing shards that did not divide evenly before padding
    pub bad_list: Vec<usize>,
    /// Number of shards appended
    pub padded: usize,
    /// Ranks the list was padded for
    pub rank_count: usize,
    /// Labels per shard
    pub file_batch_size: usize,
}

impl Partition {
    /// Shards each rank receives per epoch
    pub fn per_rank(&self) -> usize {
        self.n_files / self.rank_count
    }

    /// Labels belonging to shard `idx`
    pub fn labels_for_shard(&self, idx: usize) -> Option<&[i64]> {
        let start = idx.checked_mul(self.file_batch_size)?;
        self.labels.get(start..start + self.file_batch_size)
    }

    /// Whether the padding invariants hold
    pub fn is_balanced(&self) -> bool {
        self.n_files % self.rank_count == 0
            && self.labels.len() == self.n_files * self.file_batch_size
            && self
                .record_offsets
                .as_ref()
                .map_or(true, |o| o.len() == self.n_files)
    }
}

/// Pad shards and labels so every rank gets an equal share
///
/// `store` is consulted only in `lmdb` mode, where the shard count is
/// derived from the number of records rather than from `filenames`.
pub fn extend_data(
    config: &TrainConfig,
    mut filenames: Vec<PathBuf>,
    mut labels: Vec<i64>,
    store: Option<&dyn RecordStore>,
) -> Result<Partition> {
    let size = config.size;
    let file_batch_size = config.file_batch_size;

    if size == 0 {
        return Err(ConvoyError::InvalidShardSpec {
            reason: "rank count must be at least 1".into(),
        });
    }
    if file_batch_size == 0 {
        return Err(ConvoyError::InvalidShardSpec {
            reason: "file_batch_size must be at least 1".into(),
        });
    }

    let n_units = match config.data_source {
        DataSource::Hkl | DataSource::Both => filenames.len(),
        DataSource::Lmdb => {
            let store = store.ok_or_else(|| ConvoyError::InvalidShardSpec {
                reason: "lmdb data source needs a record store".into(),
            })?;
            let entries = store.entry_count()?;
            usize::try_from(entries / file_batch_size as u64).map_err(|_| {
                ConvoyError::InvalidShardSpec {
                    reason: format!("record count {} does not fit in memory", entries),
                }
            })?
        }
    };

    if config.data_source == DataSource::Both {
        info!("total hkl files {}", n_units);
    }

    // cut unused labels
    let expected = n_units * file_batch_size;
    if labels.len() < expected {
        return Err(ConvoyError::LabelShortfall {
            expected,
            actual: labels.len(),
            shards: n_units,
        });
    }
    labels.truncate(expected);

    let bad = bad_list(n_units, size);
    if config.rank == 0 {
        info!("bad list is {:?}", bad);
    }
    let need = padding_needed(n_units, size);

    let mut record_offsets = config.data_source.uses_offsets().then(|| {
        (0..n_units)
            .map(|index| (index * file_batch_size) as u64)
            .collect::<Vec<u64>>()
    });

    if need != 0 {
        if config.data_source.uses_files() {
            pad_tail(&mut filenames, 1, need);
        }
        if let Some(offsets) = record_offsets.as_mut() {
            pad_tail(offsets, 1, need);
        }
        pad_tail(&mut labels, file_batch_size, need);
    }

    let n_files = n_units + need;
    debug!(
        "Partitioned {} shards into {} for {} ranks ({} padded)",
        n_units, n_files, size, need
    );

    Ok(Partition {
        filenames,
        labels,
        record_offsets,
        n_files,
        bad_list: bad,
        padded: need,
        rank_count: size,
        file_batch_size,
    })
}
