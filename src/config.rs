use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::hub::RepoType;

/// Configuration for the Action100M loader
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote dataset and local snapshot settings
    pub dataset: DatasetConfig,

    /// Local video files
    pub media: MediaConfig,

    /// Record-to-sample conversion settings
    pub conversion: ConversionConfig,

    /// Output artifacts
    pub output: OutputConfig,

    /// Performance and resource settings
    pub performance: PerformanceConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Repository id on the hub
    pub repo_id: String,

    /// Repository kind
    pub repo_type: RepoType,

    /// Branch, tag or commit to snapshot
    pub revision: String,

    /// Directory the snapshot is materialized into
    pub local_dir: PathBuf,

    /// Shard file pattern relative to `local_dir`, one `*` wildcard in the file name
    pub shard_pattern: String,

    /// Column holding the video identifier
    pub id_column: String,

    /// Hub endpoint
    pub endpoint: String,

    /// Files downloaded at once
    pub max_concurrent_downloads: usize,

    /// Skip the hub entirely and use whatever is in `local_dir`
    pub offline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Directory of `<video_uid>.<extension>` files
    pub videos_dir: PathBuf,

    /// Video file extension, without the dot
    pub extension: String,

    /// Prefix of the canonical source URL
    pub source_url_prefix: String,

    /// ffprobe binary used to read frame rates
    pub ffprobe_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Seconds of each clip represented in the output
    pub clip_duration: f64,

    /// Window given to the last transcript entry
    pub transcript_trailing_window: f64,

    /// Placeholder for segments without an action
    pub not_applicable: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Name of the materialized dataset
    pub dataset_name: String,

    /// Directory holding named datasets
    pub datasets_dir: PathBuf,

    /// Replace an existing dataset of the same name
    pub overwrite: bool,

    /// Mark the dataset as persistent
    pub persistent: bool,

    /// Sorted identifier list written by `extract-video-ids`
    pub ids_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Maximum number of shard workers
    pub max_workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for this crate's targets
    pub level: String,
}

impl Config {
    /// Candidate configuration files, first match wins
    pub const SEARCH_PATHS: [&'static str; 2] = ["action100m.toml", "config/action100m.toml"];

    /// Load configuration from the first config file found, else defaults,
    /// then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::SEARCH_PATHS.iter().map(Path::new).find(|p| p.exists()) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Defaults overlaid with environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Override settings from `ACTION100M_*` and hub environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(workers) = std::env::var("ACTION100M_WORKERS") {
            if let Ok(workers) = workers.parse() {
                self.performance.max_workers = workers;
            }
        }

        if let Ok(dir) = std::env::var("ACTION100M_DATASET_DIR") {
            self.dataset.local_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("ACTION100M_VIDEOS_DIR") {
            self.media.videos_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("ACTION100M_DATASETS_DIR") {
            self.output.datasets_dir = PathBuf::from(dir);
        }

        if let Ok(level) = std::env::var("ACTION100M_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(endpoint) = std::env::var("HF_ENDPOINT") {
            self.dataset.endpoint = endpoint;
        }

        if let Ok(offline) = std::env::var("HF_HUB_OFFLINE") {
            self.dataset.offline = matches!(offline.as_str(), "1" | "true" | "TRUE" | "yes");
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.performance.max_workers == 0 {
            return Err(anyhow!("max_workers must be greater than 0"));
        }

        if self.dataset.max_concurrent_downloads == 0 {
            return Err(anyhow!("max_concurrent_downloads must be greater than 0"));
        }

        if !(self.conversion.clip_duration > 0.0) {
            return Err(anyhow!("clip_duration must be positive"));
        }

        if !(self.conversion.transcript_trailing_window > 0.0) {
            return Err(anyhow!("transcript_trailing_window must be positive"));
        }

        if self.dataset.repo_id.split('/').count() != 2 {
            return Err(anyhow!("repo_id must look like <owner>/<name>, got {}", self.dataset.repo_id));
        }

        if self.dataset.shard_pattern.matches('*').count() > 1 {
            return Err(anyhow!("shard_pattern supports a single '*' wildcard"));
        }

        url::Url::parse(&self.dataset.endpoint)
            .with_context(|| format!("Invalid hub endpoint {}", self.dataset.endpoint))?;

        if self.output.dataset_name.trim().is_empty()
            || self.output.dataset_name.contains(['/', '\\'])
        {
            return Err(anyhow!("dataset_name must be a plain name, got {:?}", self.output.dataset_name));
        }

        if self.media.extension.is_empty() || self.media.extension.starts_with('.') {
            return Err(anyhow!("media extension must be given without a leading dot"));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Action100M Loader Configuration:\n\
            - Dataset: {} ({}, revision {})\n\
            - Snapshot Directory: {}\n\
            - Videos Directory: {} (*.{})\n\
            - Clip Duration: {:.1}s\n\
            - Output Dataset: {} in {}\n\
            - Overwrite: {}\n\
            - Workers: {}",
            self.dataset.repo_id,
            self.dataset.repo_type.as_str(),
            self.dataset.revision,
            self.dataset.local_dir.display(),
            self.media.videos_dir.display(),
            self.media.extension,
            self.conversion.clip_duration,
            self.output.dataset_name,
            self.output.datasets_dir.display(),
            self.output.overwrite,
            self.performance.max_workers
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig::default(),
            media: MediaConfig::default(),
            conversion: ConversionConfig::default(),
            output: OutputConfig::default(),
            performance: PerformanceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            repo_id: "facebook/action100m-preview".to_string(),
            repo_type: RepoType::Dataset,
            revision: "main".to_string(),
            local_dir: PathBuf::from("./action100m-preview"),
            shard_pattern: "data/part-*.parquet".to_string(),
            id_column: "video_uid".to_string(),
            endpoint: "https://huggingface.co".to_string(),
            max_concurrent_downloads: 4,
            offline: false,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            videos_dir: PathBuf::from("./videos"),
            extension: "mp4".to_string(),
            source_url_prefix: action_core::sample::DEFAULT_SOURCE_URL_PREFIX.to_string(),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            clip_duration: action_core::DEFAULT_CLIP_DURATION,
            transcript_trailing_window: action_core::transcript::DEFAULT_TRAILING_WINDOW,
            not_applicable: action_core::NOT_APPLICABLE.to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dataset_name: "action100m".to_string(),
            datasets_dir: PathBuf::from("./datasets"),
            overwrite: true,
            persistent: true,
            ids_file: PathBuf::from("video_ids.txt"),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get().max(1),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.performance.max_workers = workers;
        self
    }

    pub fn with_dataset_dir(mut self, dir: PathBuf) -> Self {
        self.config.dataset.local_dir = dir;
        self
    }

    pub fn with_videos_dir(mut self, dir: PathBuf) -> Self {
        self.config.media.videos_dir = dir;
        self
    }

    pub fn with_datasets_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.datasets_dir = dir;
        self
    }

    pub fn with_dataset_name(mut self, name: impl Into<String>) -> Self {
        self.config.output.dataset_name = name.into();
        self
    }

    pub fn with_clip_duration(mut self, seconds: f64) -> Self {
        self.config.conversion.clip_duration = seconds;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.dataset.endpoint = endpoint.into();
        self
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.config.dataset.offline = offline;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.config.output.overwrite = overwrite;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
