//! Action100M Loader
//!
//! Fetches the Action100M preview from the dataset hub, lists the videos it
//! references and converts its caption trees into a browsable video dataset.

pub mod columnar;
pub mod config;
pub mod dataset;
pub mod hub;
pub mod ids;
pub mod processing;
pub mod video;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::dataset::{Dataset, DatasetStore};
pub use crate::hub::{ensure_snapshot, Snapshot, SnapshotDownloader};
pub use crate::ids::{extract_ids, IdExtractor};
pub use crate::processing::{BatchProcessor, ProcessingResult};
pub use crate::video::{FfprobeProbe, MediaProbe, VideoProcessor};

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub fn default_log_filter(verbose: bool, level: &str) -> String {
    let level = if verbose { "debug" } else { level };
    format!("action100m_loader={level},action_core={level},warn")
}

/// Install the global subscriber; `RUST_LOG` takes precedence over `--verbose`
/// and the configured level
pub fn init_logging(verbose: bool, level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(verbose, level)));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_filter() {
        assert_eq!(
            default_log_filter(false, "info"),
            "action100m_loader=info,action_core=info,warn"
        );
        assert_eq!(
            default_log_filter(true, "warn"),
            "action100m_loader=debug,action_core=debug,warn"
        );
    }
}
