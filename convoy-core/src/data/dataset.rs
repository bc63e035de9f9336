//! Dataset discovery
//!
//! Resolves the configured folders into sorted shard file lists and
//! loads the label arrays and mean image.

use ndarray::{Array1, Array3, Array4, Axis};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::array_io;
use crate::config::TrainConfig;
use crate::error::{ConvoyError, Result};

/// Default shard file extension
pub const DEFAULT_DATA_EXT: &str = ".hkl";

/// Default label file extension
pub const DEFAULT_LABEL_EXT: &str = ".npy";

/// Everything a training run needs to know about its data
#[derive(Debug, Clone)]
pub struct DatasetFiles {
    /// Load batches in a parallel loader
    pub para_load: bool,
    /// Report top-5 error
    pub flag_top_5: bool,
    /// Sorted training shard files
    pub train_filenames: Vec<PathBuf>,
    /// Sorted validation shard files
    pub val_filenames: Vec<PathBuf>,
    pub train_labels: Vec<i64>,
    pub val_labels: Vec<i64>,
    /// Mean image with a trailing batch axis, `(C, H, W, 1)`
    pub img_mean: Array4<f32>,
}

impl DatasetFiles {
    /// Load with the default `.hkl` / `.npy` extensions
    pub fn load(config: &TrainConfig) -> Result<Self> {
        Self::load_with_ext(config, DEFAULT_DATA_EXT, DEFAULT_LABEL_EXT)
    }

    /// Load with explicit data and label extensions
    pub fn load_with_ext(config: &TrainConfig, ext_data: &str, ext_label: &str) -> Result<Self> {
        let train_filenames = list_shard_files(&config.train_dir(), ext_data)?;
        let val_filenames = list_shard_files(&config.val_dir(), ext_data)?;
        let train_labels = load_labels(&config.label_path("train_labels", ext_label))?;
        let val_labels = load_labels(&config.label_path("val_labels", ext_label))?;
        let img_mean = load_mean_image(&config.mean_path())?;

        info!(
            "Dataset: {} train shards, {} val shards, {} train labels, {} val labels",
            train_filenames.len(),
            val_filenames.len(),
            train_labels.len(),
            val_labels.len()
        );

        Ok(Self {
            para_load: config.para_load,
            flag_top_5: config.flag_top_5,
            train_filenames,
            val_filenames,
            train_labels,
            val_labels,
            img_mean,
        })
    }
}

/// Files directly under `dir` whose name ends with `ext`, sorted
///
/// Symlinks are followed; hidden files and dangling links are skipped.
pub fn list_shard_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ConvoyError::DatasetNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.io_error().map_or(false, |io| io.kind() == std::io::ErrorKind::NotFound) => {
                warn!("Skipping dangling link {:?}", e.path());
                continue;
            }
            Err(e) => {
                return Err(ConvoyError::Io {
                    path: dir.to_path_buf(),
                    source: e.into(),
                })
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') || !name.ends_with(ext) {
            continue;
        }
        files.push(entry.into_path());
    }
    files.sort();

    debug!("Found {} {} files in {}", files.len(), ext, dir.display());
    Ok(files)
}

/// Read a 1-D integer label array stored as `int64` or `int32`
pub fn load_labels(path: &Path) -> Result<Vec<i64>> {
    let data = read_dataset_file(path)?;
    let labels = match array_io::decode::<Array1<i64>>(&data, path) {
        Ok(labels) => labels,
        Err(e) => array_io::decode::<Array1<i32>>(&data, path)
            .map_err(|_| e)?
            .mapv(i64::from),
    };
    Ok(labels.to_vec())
}

/// Read a `(C, H, W)` mean image and append a unit batch axis
///
/// `float64` means (what `np.mean` produces) are narrowed to `f32`.
pub fn load_mean_image(path: &Path) -> Result<Array4<f32>> {
    let data = read_dataset_file(path)?;
    let mean = match array_io::decode::<Array3<f32>>(&data, path) {
        Ok(mean) => mean,
        Err(e) => array_io::decode::<Array3<f64>>(&data, path)
            .map_err(|_| e)?
            .mapv(|v| v as f32),
    };
    Ok(mean.insert_axis(Axis(3)))
}

fn read_dataset_file(path: &Path) -> Result<bytes::Bytes> {
    array_io::read_bytes(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConvoyError::DatasetNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConvoyError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}
