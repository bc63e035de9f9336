//! Rank assignment over a padded partition
//!
//! Every rank derives the same shard order from the same seed, then takes
//! its own contiguous block of `per_rank` shards. No coordination needed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use super::partition::Partition;
use crate::error::{ConvoyError, Result};

/// Fixed mapping from ranks to shard indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankAssigner {
    /// Shard indices in assignment order
    order: Vec<usize>,
    rank_count: usize,
}

impl RankAssigner {
    /// Assign `num_shards` shards to `rank_count` ranks
    ///
    /// `num_shards` must already be padded to a multiple of `rank_count`.
    /// Seed 0 keeps the natural shard order.
    pub fn new(num_shards: usize, rank_count: usize, seed: u64) -> Result<Self> {
        if rank_count == 0 {
            return Err(ConvoyError::InvalidShardSpec {
                reason: "rank count must be at least 1".into(),
            });
        }
        if num_shards % rank_count != 0 {
            return Err(ConvoyError::InvalidShardSpec {
                reason: format!(
                    "{} shards do not split evenly across {} ranks",
                    num_shards, rank_count
                ),
            });
        }

        let mut order: Vec<usize> = (0..num_shards).collect();
        if seed != 0 {
            order.shuffle(&mut StdRng::seed_from_u64(seed));
        }

        debug!(
            "Assigned {} shards to {} ranks (seed {})",
            num_shards, rank_count, seed
        );

        Ok(Self { order, rank_count })
    }

    /// Assignment for a partition built by `extend_data`
    pub fn for_partition(partition: &Partition, seed: u64) -> Result<Self> {
        Self::new(partition.n_files, partition.rank_count, seed)
    }

    pub fn rank_count(&self) -> usize {
        self.rank_count
    }

    /// Shards every rank holds
    pub fn per_rank(&self) -> usize {
        self.order.len() / self.rank_count
    }

    /// Shards owned by `rank`, `None` past the last rank
    pub fn shards_for_rank(&self, rank: usize) -> Option<&[usize]> {
        if rank >= self.rank_count {
            return None;
        }
        let per_rank = self.per_rank();
        self.order.get(rank * per_rank..(rank + 1) * per_rank)
    }

    /// Rank that owns `shard`
    pub fn owner(&self, shard: usize) -> Option<usize> {
        let pos = self.order.iter().position(|&s| s == shard)?;
        Some(pos / self.per_rank())
    }

    /// Per-rank shard lists, indexed by rank
    pub fn ranks(&self) -> impl Iterator<Item = &[usize]> + '_ {
        (0..self.rank_count).filter_map(move |rank| self.shards_for_rank(rank))
    }
}
