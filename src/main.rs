use action100m_loader::{
    columnar, ensure_snapshot, init_logging, BatchProcessor, Config, DatasetStore, FfprobeProbe,
};
use anyhow::Result;
use clap::{value_parser, Arg, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

fn cli() -> Command {
    Command::new("Action100M Loader")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Convert the Action100M preview into a browsable video dataset")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (default: action100m.toml or config/action100m.toml)"),
        )
        .arg(
            Arg::new("dataset-dir")
                .short('d')
                .long("dataset-dir")
                .value_name("DIR")
                .help("Local directory of the dataset snapshot"),
        )
        .arg(
            Arg::new("videos-dir")
                .long("videos-dir")
                .value_name("DIR")
                .help("Directory containing <video_uid>.mp4 files"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Directory the dataset is written into"),
        )
        .arg(
            Arg::new("name")
                .short('n')
                .long("name")
                .value_name("NAME")
                .help("Dataset name"),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("NUM")
                .value_parser(value_parser!(usize))
                .help("Number of parallel shard workers"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => {
            let mut config = Config::from_file(Path::new(path))?;
            config.apply_env_overrides();
            config
        }
        None => Config::load()?,
    };

    if let Some(dir) = matches.get_one::<String>("dataset-dir") {
        config.dataset.local_dir = PathBuf::from(dir);
    }
    if let Some(dir) = matches.get_one::<String>("videos-dir") {
        config.media.videos_dir = PathBuf::from(dir);
    }
    if let Some(dir) = matches.get_one::<String>("output") {
        config.output.datasets_dir = PathBuf::from(dir);
    }
    if let Some(name) = matches.get_one::<String>("name") {
        config.output.dataset_name = name.clone();
    }
    if let Some(workers) = matches.get_one::<usize>("workers") {
        config.performance.max_workers = *workers;
    }

    Ok(config)
}

async fn run(config: Config) -> Result<()> {
    info!("🚀 Action100M Loader starting...");
    info!("{}", config.summary());

    info!("Loading Action100M dataset from the hub...");
    let snapshot_dir = ensure_snapshot(&config.dataset).await?;
    let shards = columnar::list_shards(&snapshot_dir, &config.dataset.shard_pattern)?;
    if shards.is_empty() {
        warn!(
            "No files matching {} in {}",
            config.dataset.shard_pattern,
            snapshot_dir.display()
        );
    }

    let probe = Arc::new(FfprobeProbe::new(config.media.ffprobe_path.clone()));
    let processor = BatchProcessor::new(&config, probe);
    let result = processor.process(&shards, &config.media.videos_dir).await?;

    let mut store = DatasetStore::create(
        &config.output.datasets_dir,
        &config.output.dataset_name,
        config.output.overwrite,
        config.output.persistent,
    )
    .await?;
    let added = store.add_samples(result.samples);
    store.add_dynamic_sample_fields();
    store.save().await?;

    info!(
        "🎉 Added {} samples to dataset '{}' in {:.2}s",
        added,
        store.name(),
        result.total_time.as_secs_f64()
    );
    println!("{}", store.summary());

    Ok(())
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    let verbose = matches.get_flag("verbose");

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            init_logging(verbose, "info");
            error!("❌ {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(verbose, &config.logging.level);
    if verbose {
        info!("Verbose logging enabled");
    }

    let outcome = match config.validate() {
        Ok(()) => run(config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        error!("❌ {:#}", e);
        std::process::exit(1);
    }
}
