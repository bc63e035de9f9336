//! Unit tests for rank-balanced padding
//!
//! Covers the divisibility invariant and agreement between storage modes.

use convoy_core::config::{DataSource, TrainConfig};
use convoy_core::data::{extend_data, InMemoryRecordStore, RecordStore};
use convoy_core::ConvoyError;
use std::path::PathBuf;

fn config(source: DataSource, size: usize, rank: usize, file_batch_size: usize) -> TrainConfig {
    let json = format!(
        r#"{{
            "dir_head": "/data/", "train_folder": "train", "val_folder": "val",
            "label_folder": "labels/", "mean_file": "mean.npy",
            "size": {}, "rank": {}, "file_batch_size": {}, "data_source": "{}"
        }}"#,
        size, rank, file_batch_size, source
    );
    TrainConfig::from_json(&json).unwrap()
}

fn files(n: usize) -> Vec<PathBuf> {
    (0..n).map(|i| PathBuf::from(format!("{:04}.hkl", i))).collect()
}

/// Label `k` of shard `s` is `s * 100 + k`
fn labels(n: usize, fbs: usize) -> Vec<i64> {
    (0..n)
        .flat_map(|s| (0..fbs).map(move |k| (s * 100 + k) as i64))
        .collect()
}

#[test]
fn test_ten_files_four_ranks() {
    let cfg = config(DataSource::Hkl, 4, 0, 2);
    let p = extend_data(&cfg, files(10), labels(10, 2), None).unwrap();

    assert_eq!(p.bad_list, vec![9, 8]);
    assert_eq!(p.padded, 2);
    assert_eq!(p.n_files, 12);
    assert_eq!(p.per_rank(), 3);
    assert_eq!(p.filenames[10], PathBuf::from("0008.hkl"));
    assert_eq!(p.filenames[11], PathBuf::from("0009.hkl"));
    assert_eq!(p.labels_for_shard(10).unwrap(), &[800, 801]);
    assert_eq!(p.labels_for_shard(11).unwrap(), &[900, 901]);
    assert!(p.record_offsets.is_none());
    assert!(p.is_balanced());
}

#[test]
fn test_already_divisible_untouched() {
    let cfg = config(DataSource::Hkl, 4, 1, 3);
    let p = extend_data(&cfg, files(8), labels(8, 3), None).unwrap();

    assert_eq!(p.padded, 0);
    assert!(p.bad_list.is_empty());
    assert_eq!(p.filenames, files(8));
    assert_eq!(p.labels, labels(8, 3));
}

#[test]
fn test_unused_labels_cut() {
    let cfg = config(DataSource::Hkl, 2, 0, 4);
    let p = extend_data(&cfg, files(4), labels(6, 4), None).unwrap();

    assert_eq!(p.labels.len(), 16);
    assert_eq!(p.labels, labels(4, 4));
}

#[test]
fn test_short_labels_rejected() {
    let cfg = config(DataSource::Hkl, 2, 0, 4);
    let err = extend_data(&cfg, files(4), labels(3, 4), None).unwrap_err();
    assert!(matches!(
        err,
        ConvoyError::LabelShortfall { expected: 16, actual: 12, shards: 4 }
    ));
}

#[test]
fn test_invariant_across_sizes() {
    for n in 0..30 {
        for size in 1..10 {
            let cfg = config(DataSource::Hkl, size, 0, 2);
            let p = extend_data(&cfg, files(n), labels(n, 2), None).unwrap();

            assert_eq!(p.n_files % size, 0, "n={} size={}", n, size);
            assert!(p.n_files >= n);
            assert!(p.n_files <= n + size - 1);
            assert_eq!(p.filenames.len(), p.n_files);
            assert_eq!(p.labels.len(), p.n_files * 2);
            assert!(p.is_balanced());
        }
    }
}

#[test]
fn test_fewer_files_than_ranks() {
    let cfg = config(DataSource::Hkl, 8, 0, 1);
    let p = extend_data(&cfg, files(3), labels(3, 1), None).unwrap();

    assert_eq!(p.n_files, 8);
    assert_eq!(p.filenames.len(), 8);
    assert_eq!(p.filenames.last().unwrap(), &PathBuf::from("0002.hkl"));
    // each padded file keeps its own label
    for (i, file) in p.filenames.iter().enumerate() {
        let src: usize = file.to_string_lossy()[..4].parse().unwrap();
        assert_eq!(p.labels[i], (src * 100) as i64);
    }
}

#[test]
fn test_lmdb_offsets() {
    let cfg = config(DataSource::Lmdb, 4, 0, 10);
    let store = InMemoryRecordStore::new(105);
    let p = extend_data(&cfg, Vec::new(), labels(12, 10), Some(&store as &dyn RecordStore))
        .unwrap();

    // 105 records / 10 per shard = 10 shards, padded to 12
    assert_eq!(p.n_files, 12);
    assert!(p.filenames.is_empty());
    let offsets = p.record_offsets.as_ref().unwrap();
    assert_eq!(offsets.len(), 12);
    assert_eq!(&offsets[..3], &[0, 10, 20]);
    assert_eq!(&offsets[10..], &[80, 90]);
    assert_eq!(p.labels.len(), 120);
    assert!(p.is_balanced());
}

#[test]
fn test_lmdb_leaves_filenames_alone() {
    let cfg = config(DataSource::Lmdb, 4, 0, 10);
    let store = InMemoryRecordStore::new(105);
    let p = extend_data(&cfg, files(3), labels(12, 10), Some(&store as &dyn RecordStore))
        .unwrap();

    // shard count comes from the store, the listed files are not padded
    assert_eq!(p.n_files, 12);
    assert_eq!(p.filenames, files(3));
}

#[test]
fn test_lmdb_without_store_rejected() {
    let cfg = config(DataSource::Lmdb, 4, 0, 10);
    let err = extend_data(&cfg, Vec::new(), labels(4, 10), None).unwrap_err();
    assert!(matches!(err, ConvoyError::InvalidShardSpec { .. }));
}

#[test]
fn test_modes_agree() {
    let fbs = 3;
    for n in 1..20 {
        let store = InMemoryRecordStore::new((n * fbs) as u64);
        let hkl = extend_data(&config(DataSource::Hkl, 4, 0, fbs), files(n), labels(n, fbs), None)
            .unwrap();
        let lmdb = extend_data(
            &config(DataSource::Lmdb, 4, 0, fbs),
            Vec::new(),
            labels(n, fbs),
            Some(&store as &dyn RecordStore),
        )
        .unwrap();
        let both = extend_data(&config(DataSource::Both, 4, 0, fbs), files(n), labels(n, fbs), None)
            .unwrap();

        assert_eq!(hkl.n_files, lmdb.n_files);
        assert_eq!(hkl.n_files, both.n_files);
        assert_eq!(hkl.labels, lmdb.labels);
        assert_eq!(hkl.labels, both.labels);
        assert_eq!(hkl.filenames, both.filenames);
        assert_eq!(lmdb.record_offsets, both.record_offsets);
    }
}

#[test]
fn test_every_rank_agrees() {
    let base = config(DataSource::Both, 6, 0, 2);
    let reference = extend_data(&base, files(17), labels(17, 2), None).unwrap();
    for rank in 1..6 {
        let p = extend_data(&base.for_rank(rank), files(17), labels(17, 2), None).unwrap();
        assert_eq!(p, reference);
    }
}

struct UnreachableStore;

impl RecordStore for UnreachableStore {
    fn entry_count(&self) -> convoy_core::Result<u64> {
        Err(ConvoyError::RecordStore {
            message: "environment closed".into(),
        })
    }
}

#[test]
fn test_store_error_propagates() {
    let cfg = config(DataSource::Lmdb, 2, 0, 4);
    let err = extend_data(&cfg, Vec::new(), labels(4, 4), Some(&UnreachableStore as &dyn RecordStore))
        .unwrap_err();
    assert!(matches!(err, ConvoyError::RecordStore { .. }));
}
