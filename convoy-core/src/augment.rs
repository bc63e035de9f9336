//! Crop and flip parameters for augmentation
//!
//! The sampler returns `[x, y, flip]`: crop position as fractions of the
//! free margin and a 0/1 horizontal flip flag.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::str::FromStr;
use tracing::debug;

use crate::config::TrainConfig;
use crate::error::{ConvoyError, Result};

/// Centered crop, no flip
pub const CENTER_CROP: [f32; 3] = [0.5, 0.5, 0.0];

/// Seeds are folded into this range
const SEED_MODULUS: u64 = 1000;

/// Which pass the batch belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Val,
}

impl FromStr for Mode {
    type Err = ConvoyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Mode::Train),
            "val" => Ok(Mode::Val),
            other => Err(ConvoyError::InvalidConfig {
                reason: format!("unknown mode {}", other),
            }),
        }
    }
}

/// Crop parameters for one batch
///
/// Randomized only for training with both `random` and `rand_crop` set.
/// The seed comes from the wall clock, so runs are not reproducible.
pub fn crop_params(config: &TrainConfig, mode: Mode) -> [f32; 3] {
    match mode {
        Mode::Val => CENTER_CROP,
        Mode::Train if config.random && config.rand_crop => {
            let now = chrono::Utc::now().timestamp().max(0) as u64;
            let seed = time_seed(now, config.worker_id);
            debug!("Sampling crop with seed {}", seed);
            sample_with_seed(seed)
        }
        Mode::Train => CENTER_CROP,
    }
}

/// `(unix_secs * worker_id) % 1000`, reduced first so it cannot overflow
pub fn time_seed(unix_secs: u64, worker_id: u64) -> u64 {
    (unix_secs % SEED_MODULUS) * (worker_id % SEED_MODULUS) % SEED_MODULUS
}

/// Draw `[x, y, flip]` from a PRNG seeded with `seed`
pub fn sample_with_seed(seed: u64) -> [f32; 3] {
    let mut rng = StdRng::seed_from_u64(seed);
    let x: f32 = rng.gen();
    let y: f32 = rng.gen();
    let flip: f32 = rng.gen();
    [x, y, round_flip(flip)]
}

/// Round to 0 or 1, ties to even
fn round_flip(v: f32) -> f32 {
    if v > 0.5 {
        1.0
    } else {
        0.0
    }
}
