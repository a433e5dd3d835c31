use action100m_loader::{columnar, ensure_snapshot, extract_ids, init_logging, Config};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "extract-video-ids")]
#[command(about = "Write the sorted unique video ids of the Action100M preview")]
struct Cli {
    /// Configuration file (default: action100m.toml or config/action100m.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Local directory of the dataset snapshot
    #[arg(short, long)]
    dataset_dir: Option<PathBuf>,

    /// Output text file, one id per line
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let mut config = Config::from_file(path)?;
                config.apply_env_overrides();
                config
            }
            None => Config::load()?,
        };

        if let Some(dir) = &self.dataset_dir {
            config.dataset.local_dir = dir.clone();
        }
        if let Some(output) = &self.output {
            config.output.ids_file = output.clone();
        }
        Ok(config)
    }
}

async fn run(config: Config) -> Result<()> {
    config.validate()?;

    let snapshot_dir = ensure_snapshot(&config.dataset).await?;
    let shards = columnar::list_shards(&snapshot_dir, &config.dataset.shard_pattern)?;
    let extractor = extract_ids(&shards, &config.dataset.id_column, &config.output.ids_file)?;

    info!(
        "✅ {} unique video ids from {} files",
        extractor.len(),
        extractor.files_read()
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let outcome = match cli.load_config() {
        Ok(config) => {
            init_logging(cli.verbose, &config.logging.level);
            run(config).await
        }
        Err(e) => {
            init_logging(cli.verbose, "info");
            Err(e)
        }
    };

    if let Err(e) = outcome {
        error!("❌ {:#}", e);
        std::process::exit(1);
    }
}
