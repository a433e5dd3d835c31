use action_core::{Sample, SampleAssembler, TranscriptSegmenter, TreeFlattener, VideoRecord};
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::columnar;
use crate::config::Config;
use crate::video::{MediaProbe, VideoProcessor};

const PROGRESS_INTERVAL: usize = 100;

/// Overall conversion results
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// Local clips found in the videos directory
    pub available: usize,
    /// Rows read across every shard
    pub records_seen: usize,
    /// Records whose clip exists locally
    pub matched: usize,
    pub samples: Vec<Sample>,
    pub total_time: Duration,
}

/// Records kept from one shard
#[derive(Debug, Default)]
struct ShardRecords {
    records_seen: usize,
    records: Vec<VideoRecord>,
}

/// Joins the remote records with the local clips and assembles one sample per video
pub struct BatchProcessor {
    video_processor: VideoProcessor,
    probe: Arc<dyn MediaProbe>,
    assembler: SampleAssembler,
    worker_semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl BatchProcessor {
    pub fn new(config: &Config, probe: Arc<dyn MediaProbe>) -> Self {
        let max_workers = config.performance.max_workers.max(1);
        info!("🔧 Initializing BatchProcessor with {} workers", max_workers);

        let conversion = &config.conversion;
        let segmenter = TranscriptSegmenter::new(conversion.clip_duration)
            .with_trailing_window(conversion.transcript_trailing_window);
        let flattener =
            TreeFlattener::new(conversion.clip_duration).with_not_applicable(conversion.not_applicable.clone());
        let assembler =
            SampleAssembler::new(segmenter, flattener).with_source_url_prefix(config.media.source_url_prefix.clone());

        Self {
            video_processor: VideoProcessor::new(config.media.extension.clone()),
            probe,
            assembler,
            worker_semaphore: Arc::new(Semaphore::new(max_workers)),
            max_concurrent: max_workers,
        }
    }

    /// Convert every record of `shards` whose clip exists in `videos_dir`
    pub async fn process(&self, shards: &[PathBuf], videos_dir: &Path) -> Result<ProcessingResult> {
        let start_time = Instant::now();

        info!("🚀 Starting conversion...");
        info!("📁 Videos: {}", videos_dir.display());

        let available = self.video_processor.available_uids(videos_dir)?;
        let available_count = available.len();
        if available.is_empty() {
            warn!("No .{} files found in {}", self.video_processor.extension(), videos_dir.display());
        }
        let videos_dir = videos_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", videos_dir.display()))?;

        info!("📦 Loading {} shards...", shards.len());
        let loaded = self.load_matching_records(shards, Arc::new(available)).await?;
        let records = dedupe_by_uid(loaded.records);
        info!(
            "Found {} videos on disk (of {} available, {} records read)",
            records.len(),
            available_count,
            loaded.records_seen
        );

        let samples = self.build_samples(&records, &videos_dir).await?;

        Ok(ProcessingResult {
            available: available_count,
            records_seen: loaded.records_seen,
            matched: records.len(),
            samples,
            total_time: start_time.elapsed(),
        })
    }

    /// Read and filter every shard in parallel; output keeps shard order then row order
    async fn load_matching_records(
        &self,
        shards: &[PathBuf],
        available: Arc<BTreeSet<String>>,
    ) -> Result<ShardRecords> {
        let total_shards = shards.len();
        let mut handles = Vec::with_capacity(total_shards);

        for (index, shard) in shards.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&self.worker_semaphore);
            let available = Arc::clone(&available);
            handles.push(tokio::spawn(load_shard(semaphore, shard, available, index, total_shards)));
        }

        let mut loaded = ShardRecords::default();
        for handle in handles {
            let shard = handle.await??;
            loaded.records_seen += shard.records_seen;
            loaded.records.extend(shard.records);
        }
        Ok(loaded)
    }

    /// Probe each clip and assemble its sample, in record order
    pub async fn build_samples(&self, records: &[VideoRecord], videos_dir: &Path) -> Result<Vec<Sample>> {
        let total = records.len();
        let mut samples = Vec::with_capacity(total);

        for (index, record) in records.iter().enumerate() {
            let video_path = self.video_processor.video_path(videos_dir, &record.video_uid);
            debug!("📹 Processing video {}/{}: {}", index + 1, total, video_path.display());

            let media = self.probe.probe(&video_path).await?;
            let sample = self
                .assembler
                .assemble(record, video_path, media)
                .with_context(|| format!("Failed to convert {}", record.video_uid))?;
            samples.push(sample);

            if (index + 1) % PROGRESS_INTERVAL == 0 || index + 1 == total {
                info!("  Converted {}/{} videos", index + 1, total);
            }
        }

        Ok(samples)
    }

    /// Get processing statistics
    pub fn get_stats(&self) -> ProcessingStats {
        ProcessingStats {
            max_workers: self.max_concurrent,
            available_permits: self.worker_semaphore.available_permits(),
        }
    }
}

async fn load_shard(
    semaphore: Arc<Semaphore>,
    shard: PathBuf,
    available: Arc<BTreeSet<String>>,
    index: usize,
    total: usize,
) -> Result<ShardRecords> {
    let _permit = semaphore.acquire_owned().await?;
    debug!("📦 Loading shard {}/{}: {}", index + 1, total, shard.display());

    tokio::task::spawn_blocking(move || filter_shard(&shard, &available)).await?
}

fn filter_shard(path: &Path, available: &BTreeSet<String>) -> Result<ShardRecords> {
    let rows = columnar::read_records(path)?;
    let records_seen = rows.len();

    let mut records = Vec::new();
    for row in rows {
        if !is_available(&row, available) {
            continue;
        }
        let record = VideoRecord::from_value(row).with_context(|| format!("Invalid record in {}", path.display()))?;
        records.push(record);
    }

    debug!("  {}: kept {} of {} records", path.display(), records.len(), records_seen);
    Ok(ShardRecords { records_seen, records })
}

/// Whether the row's `video_uid` names a local clip
pub fn is_available(row: &Value, available: &BTreeSet<String>) -> bool {
    row.get("video_uid")
        .and_then(Value::as_str)
        .map(|uid| available.contains(uid))
        .unwrap_or(false)
}

/// Keep the first record of each uid
fn dedupe_by_uid(records: Vec<VideoRecord>) -> Vec<VideoRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let first = seen.insert(record.video_uid.clone());
            if !first {
                warn!("Duplicate record for {}, keeping the first", record.video_uid);
            }
            first
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ProcessingStats {
    pub max_workers: usize,
    pub available_permits: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columnar::test_support::{cooking_record, write_minimal_records, write_nested_records, write_uid_and_level};
    use crate::config::ConfigBuilder;
    use action_core::MediaInfo;
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    struct FixedProbe {
        frame_rate: f64,
    }

    #[async_trait]
    impl MediaProbe for FixedProbe {
        async fn probe(&self, path: &Path) -> Result<MediaInfo> {
            Ok(MediaInfo {
                size_bytes: std::fs::metadata(path)?.len(),
                mime_type: "video/mp4".to_string(),
                frame_width: 640,
                frame_height: 360,
                frame_rate: self.frame_rate,
                total_frame_count: (90.0 * self.frame_rate) as u64,
                duration: 90.0,
                encoding_str: Some("h264".to_string()),
            })
        }
    }

    fn processor(workers: usize) -> BatchProcessor {
        let config = ConfigBuilder::new().with_workers(workers).build();
        BatchProcessor::new(&config, Arc::new(FixedProbe { frame_rate: 30.0 }))
    }

    fn touch_videos(dir: &Path, uids: &[&str]) {
        std::fs::create_dir_all(dir).unwrap();
        for uid in uids {
            std::fs::write(dir.join(format!("{}.mp4", uid)), b"").unwrap();
        }
    }

    #[tokio::test]
    async fn test_batch_processor_creation() {
        let processor = processor(4);

        let stats = processor.get_stats();
        assert_eq!(stats.max_workers, 4);
        assert_eq!(stats.available_permits, 4);
    }

    #[test]
    fn test_membership_predicate() {
        let available: BTreeSet<String> = ["a".to_string()].into_iter().collect();
        assert!(is_available(&json!({"video_uid": "a"}), &available));
        assert!(!is_available(&json!({"video_uid": "b"}), &available));
        assert!(!is_available(&json!({"video_uid": 1}), &available));
        assert!(!is_available(&json!({}), &available));
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let records: Vec<VideoRecord> = ["a", "b", "a"]
            .iter()
            .enumerate()
            .map(|(i, uid)| {
                VideoRecord::from_value(json!({"video_uid": uid, "metadata": {"title": format!("t{}", i)}})).unwrap()
            })
            .collect();

        let kept = dedupe_by_uid(records);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].metadata.title.as_deref(), Some("t0"));
        assert_eq!(kept[1].video_uid, "b");
    }

    #[tokio::test]
    async fn test_one_sample_per_matched_video() {
        let temp_dir = TempDir::new().unwrap();
        let videos = temp_dir.path().join("videos");
        touch_videos(&videos, &["vid_b", "vid_a", "local_only"]);

        let shards = vec![temp_dir.path().join("part-00000.parquet"), temp_dir.path().join("part-00001.parquet")];
        write_minimal_records(&shards[0], &[("vid_b", "20240105"), ("remote_only", "20240101")]);
        write_minimal_records(&shards[1], &[("vid_a", "20231231"), ("vid_b", "20240105")]);

        let result = processor(2).process(&shards, &videos).await.unwrap();

        assert_eq!(result.available, 3);
        assert_eq!(result.records_seen, 4);
        assert_eq!(result.matched, 2);
        let uids: Vec<_> = result
            .samples
            .iter()
            .map(|s| s.filepath.file_stem().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(uids, vec!["vid_b", "vid_a"]);
        assert_eq!(result.samples[0].full_video_url, "https://www.youtube.com/watch?v=vid_b");
        assert_eq!(result.samples[1].upload_date.to_string(), "2023-12-31");
        assert!(result.samples[0].filepath.is_absolute());
    }

    #[tokio::test]
    async fn test_order_is_independent_of_workers() {
        let temp_dir = TempDir::new().unwrap();
        let videos = temp_dir.path().join("videos");
        let uids: Vec<String> = (0..12).map(|i| format!("v{:02}", i)).collect();
        let uid_refs: Vec<&str> = uids.iter().map(String::as_str).collect();
        touch_videos(&videos, &uid_refs);

        let mut shards = Vec::new();
        for (index, chunk) in uid_refs.chunks(3).enumerate() {
            let path = temp_dir.path().join(format!("part-{:05}.parquet", index));
            let rows: Vec<(&str, &str)> = chunk.iter().rev().map(|uid| (*uid, "20240101")).collect();
            write_minimal_records(&path, &rows);
            shards.push(path);
        }

        let serial = processor(1).process(&shards, &videos).await.unwrap();
        let parallel = processor(8).process(&shards, &videos).await.unwrap();

        assert_eq!(serial.samples.len(), 12);
        assert_eq!(serial.samples, parallel.samples);
        assert!(serial.samples[0].filepath.ends_with("v02.mp4"));
    }

    #[tokio::test]
    async fn test_nested_shard_rows_become_labelled_samples() {
        let temp_dir = TempDir::new().unwrap();
        let videos = temp_dir.path().join("videos");
        touch_videos(&videos, &["v1"]);
        let shard = temp_dir.path().join("part-00000.parquet");
        write_nested_records(&shard, &[cooking_record("v1"), cooking_record("remote_only")]);

        let result = processor(2).process(&[shard], &videos).await.unwrap();

        assert_eq!(result.records_seen, 2);
        assert_eq!(result.samples.len(), 1);
        let sample = &result.samples[0];
        assert_eq!(sample.tree_depth, 1);
        assert_eq!(sample.transcript, "hello chop the onions");
        assert_eq!(sample.upload_date.to_string(), "2023-04-15");

        let actions = sample.gpt_action_brief.as_ref().unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions.detections[0].label, "chop onions");
        assert_eq!(actions.detections[0].support, [61, 301]);
        let attributes = actions.detections[0].attributes.as_ref().unwrap();
        assert_eq!(attributes.parent_id.as_deref(), Some("a"));
        assert_eq!(attributes.tier, action_core::Tier::Leaf);

        let segments = sample.transcript_segments.as_ref().unwrap();
        assert_eq!(segments.detections[0].support, [16, 61]);
        assert_eq!(segments.detections[1].support, [61, 151]);
        assert!(sample.gpt_summary_brief.is_none());
    }

    #[tokio::test]
    async fn test_other_extension_case_is_not_matched() {
        let temp_dir = TempDir::new().unwrap();
        let videos = temp_dir.path().join("videos");
        touch_videos(&videos, &["good"]);
        std::fs::write(videos.join("Upper.MP4"), b"").unwrap();
        let shard = temp_dir.path().join("part-00000.parquet");
        write_minimal_records(&shard, &[("good", "20240101"), ("Upper", "20240101")]);

        let result = processor(2).process(&[shard], &videos).await.unwrap();

        assert_eq!(result.available, 1);
        assert_eq!(result.samples.len(), 1);
        assert!(result.samples[0].filepath.ends_with("good.mp4"));
    }

    #[tokio::test]
    async fn test_missing_upload_date_aborts() {
        let temp_dir = TempDir::new().unwrap();
        let videos = temp_dir.path().join("videos");
        touch_videos(&videos, &["a"]);
        let shard = temp_dir.path().join("part-00000.parquet");
        write_uid_and_level(&shard, &[("a", 0)]);

        assert!(processor(2).process(&[shard], &videos).await.is_err());
    }

    #[tokio::test]
    async fn test_unreadable_shard_aborts() {
        let temp_dir = TempDir::new().unwrap();
        let videos = temp_dir.path().join("videos");
        touch_videos(&videos, &["a"]);
        let shard = temp_dir.path().join("part-00000.parquet");
        std::fs::write(&shard, b"not parquet").unwrap();

        assert!(processor(2).process(&[shard], &videos).await.is_err());
    }

    #[tokio::test]
    async fn test_no_shards_no_samples() {
        let temp_dir = TempDir::new().unwrap();
        let videos = temp_dir.path().join("videos");
        touch_videos(&videos, &["a"]);

        let result = processor(2).process(&[], &videos).await.unwrap();
        assert_eq!(result.records_seen, 0);
        assert!(result.samples.is_empty());
    }
}
