use action_core::MediaInfo;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Locates the local clips named after their video uid
#[derive(Debug, Clone)]
pub struct VideoProcessor {
    extension: String,
}

impl VideoProcessor {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Uids of the clips directly inside `dir`, i.e. file stems carrying the
    /// configured extension exactly (case-sensitive, so every uid maps back
    /// to `video_path`). Subdirectories are not searched.
    pub fn available_uids(&self, dir: &Path) -> Result<BTreeSet<String>> {
        if !dir.is_dir() {
            return Err(anyhow!("Videos directory not found: {}", dir.display()));
        }

        let mut uids = BTreeSet::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == self.extension)
                .unwrap_or(false);
            if !matches {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                uids.insert(stem.to_string());
            }
        }

        debug!("Found {} .{} files in {}", uids.len(), self.extension, dir.display());
        Ok(uids)
    }

    pub fn video_path(&self, dir: &Path, video_uid: &str) -> PathBuf {
        dir.join(format!("{}.{}", video_uid, self.extension))
    }
}

impl Default for VideoProcessor {
    fn default() -> Self {
        Self::new("mp4")
    }
}

/// Reads the media facts of a local clip
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaInfo>;
}

/// Probe backed by the `ffprobe` command line tool
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    ffprobe_path: PathBuf,
}

impl FfprobeProbe {
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let output = tokio::process::Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.ffprobe_path.display()))?;

        if !output.status.success() {
            return Err(anyhow!("ffprobe failed for {}", path.display()));
        }

        let ffprobe_data: Value = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("Invalid ffprobe output for {}", path.display()))?;
        let size_bytes = tokio::fs::metadata(path).await?.len();

        let info = parse_ffprobe_output(&ffprobe_data, size_bytes, mime_type_for(path))
            .with_context(|| format!("Failed to probe {}", path.display()))?;

        debug!(
            "📹 Probed {} ({}x{}, {:.2}fps, {:.1}s)",
            path.display(),
            info.frame_width,
            info.frame_height,
            info.frame_rate,
            info.duration
        );
        Ok(info)
    }
}

/// Build [`MediaInfo`] from `ffprobe -print_format json -show_format -show_streams`
pub fn parse_ffprobe_output(ffprobe_data: &Value, size_bytes: u64, mime_type: &str) -> Result<MediaInfo> {
    let streams = ffprobe_data["streams"]
        .as_array()
        .ok_or_else(|| anyhow!("No streams in ffprobe output"))?;
    let video_stream = streams
        .iter()
        .find(|s| s["codec_type"] == "video")
        .ok_or_else(|| anyhow!("No video stream found"))?;

    let frame_rate = parse_rate(&video_stream["r_frame_rate"])
        .or_else(|| parse_rate(&video_stream["avg_frame_rate"]))
        .ok_or_else(|| anyhow!("No usable frame rate"))?;

    let duration = number(&video_stream["duration"])
        .or_else(|| number(&ffprobe_data["format"]["duration"]))
        .unwrap_or(0.0);

    let total_frame_count = number(&video_stream["nb_frames"])
        .map(|n| n as u64)
        .unwrap_or_else(|| (duration * frame_rate).round() as u64);

    Ok(MediaInfo {
        size_bytes,
        mime_type: mime_type.to_string(),
        frame_width: video_stream["width"].as_u64().unwrap_or(0) as u32,
        frame_height: video_stream["height"].as_u64().unwrap_or(0) as u32,
        frame_rate,
        total_frame_count,
        duration,
        encoding_str: video_stream["codec_name"].as_str().map(str::to_string),
    })
}

/// ffprobe reports rates as `num/den`; `0/0` means unknown
fn parse_rate(value: &Value) -> Option<f64> {
    let s = value.as_str()?;
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => s.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// ffprobe prints most numbers as strings
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "m4v" => "video/x-m4v",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}
