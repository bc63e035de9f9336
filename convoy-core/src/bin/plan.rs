//! Partition plan binary
//!
//! Prints how the training shards of a config are padded and split
//! across ranks.

use clap::Parser;
use convoy_core::config::TrainConfig;
use convoy_core::data::{self, InMemoryRecordStore, RankAssigner, RecordStore};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "convoy-plan", about = "Show the per-rank shard plan for a training config")]
struct Args {
    /// JSON training config
    #[arg(long, env = "CONVOY_CONFIG")]
    config: PathBuf,

    /// Override the configured rank
    #[arg(long, env = "CONVOY_RANK")]
    rank: Option<usize>,

    /// Override the configured rank count
    #[arg(long, env = "CONVOY_SIZE")]
    size: Option<usize>,

    /// Record count of the record store (lmdb mode)
    #[arg(long, env = "CONVOY_RECORD_ENTRIES")]
    entries: Option<u64>,

    /// Shuffle seed for rank assignment, 0 keeps file order
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Print the shard list of every rank, not just this one
    #[arg(long)]
    all_ranks: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match TrainConfig::from_json_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config {}: {}", args.config.display(), e);
            return Err(e.into());
        }
    };
    if let Some(size) = args.size {
        config.size = size;
    }
    if let Some(rank) = args.rank {
        config.rank = rank;
    }
    config.validate()?;

    info!(
        "Planning {} data for rank {} of {}",
        config.data_source, config.rank, config.size
    );

    let filenames = if config.data_source.uses_files() {
        data::list_shard_files(&config.train_dir(), data::dataset::DEFAULT_DATA_EXT)?
    } else {
        Vec::new()
    };
    let labels = data::load_labels(
        &config.label_path("train_labels", data::dataset::DEFAULT_LABEL_EXT),
    )?;

    let store = args.entries.map(InMemoryRecordStore::new);
    let partition = data::extend_data(
        &config,
        filenames,
        labels,
        store.as_ref().map(|s| s as &dyn RecordStore),
    )?;

    println!("data_source:    {}", config.data_source);
    println!("shards:         {}", partition.n_files);
    println!("padded:         {}", partition.padded);
    println!("bad list:       {:?}", partition.bad_list);
    println!("per rank:       {}", partition.per_rank());
    println!("labels:         {}", partition.labels.len());

    let assigner = RankAssigner::for_partition(&partition, args.seed)?;
    let ranks: Vec<usize> = if args.all_ranks {
        (0..assigner.rank_count()).collect()
    } else {
        vec![config.rank]
    };

    for rank in ranks {
        let shards = assigner.shards_for_rank(rank).unwrap_or_default();
        println!("rank {:>4}: {} shards", rank, shards.len());
        for &shard in shards {
            let file = config
                .data_source
                .uses_files()
                .then(|| partition.filenames.get(shard))
                .flatten();
            match file {
                Some(file) => println!("    {:>6}  {}", shard, file.display()),
                None => {
                    let offset = partition
                        .record_offsets
                        .as_ref()
                        .and_then(|o| o.get(shard))
                        .copied()
                        .unwrap_or_default();
                    println!("    {:>6}  @{}", shard, offset);
                }
            }
        }
    }

    Ok(())
}
