//! Assembly of one output sample per video

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::labels::TemporalDetections;
use crate::record::VideoRecord;
use crate::transcript::TranscriptSegmenter;
use crate::tree::{LabelCategory, TreeFlattener};
use crate::{CoreError, Result, DEFAULT_CLIP_DURATION};

/// Canonical watch URL prefix; the video uid is appended
pub const DEFAULT_SOURCE_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

const UPLOAD_DATE_FORMAT: &str = "%Y%m%d";

/// Facts probed from the local media file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaInfo {
    pub size_bytes: u64,
    pub mime_type: String,
    pub frame_width: u32,
    pub frame_height: u32,

    /// Frames per second, drives every frame conversion for this video
    pub frame_rate: f64,

    pub total_frame_count: u64,

    /// Duration of the local clip in seconds
    pub duration: f64,

    /// Video codec name
    pub encoding_str: Option<String>,
}

/// One browsable sample: a local clip with its metadata and temporal labels
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub filepath: PathBuf,
    pub metadata: MediaInfo,

    pub title: Option<String>,
    pub description: Option<String>,
    pub full_video_url: String,
    pub upload_date: NaiveDate,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub full_video_duration: Option<f64>,

    pub transcript: String,
    pub tree_depth: u32,

    pub gpt_summary_brief: Option<TemporalDetections>,
    pub gpt_summary_detailed: Option<TemporalDetections>,
    pub gpt_action_brief: Option<TemporalDetections>,
    pub gpt_action_detailed: Option<TemporalDetections>,
    pub gpt_action_actor: Option<TemporalDetections>,

    pub transcript_segments: Option<TemporalDetections>,
}

impl Sample {
    /// Every temporal label field with its name, absent ones included
    pub fn label_fields(&self) -> [(&'static str, Option<&TemporalDetections>); 6] {
        [
            (LabelCategory::SummaryBrief.field_name(), self.gpt_summary_brief.as_ref()),
            (LabelCategory::SummaryDetailed.field_name(), self.gpt_summary_detailed.as_ref()),
            (LabelCategory::ActionBrief.field_name(), self.gpt_action_brief.as_ref()),
            (LabelCategory::ActionDetailed.field_name(), self.gpt_action_detailed.as_ref()),
            (LabelCategory::ActionActor.field_name(), self.gpt_action_actor.as_ref()),
            ("transcript_segments", self.transcript_segments.as_ref()),
        ]
    }
}

/// Parse a `YYYYMMDD` upload date
pub fn parse_upload_date(video_uid: &str, raw: Option<&str>) -> Result<NaiveDate> {
    let raw = raw.ok_or_else(|| CoreError::MissingField {
        video_uid: video_uid.to_string(),
        field: "metadata.upload_date",
    })?;

    // chrono accepts shorter fields, the format is fixed-width
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::InvalidUploadDate {
            video_uid: video_uid.to_string(),
            value: raw.to_string(),
        });
    }

    NaiveDate::parse_from_str(raw, UPLOAD_DATE_FORMAT).map_err(|_| CoreError::InvalidUploadDate {
        video_uid: video_uid.to_string(),
        value: raw.to_string(),
    })
}

/// Builds samples from records, local media paths and probed media info
#[derive(Debug, Clone)]
pub struct SampleAssembler {
    segmenter: TranscriptSegmenter,
    flattener: TreeFlattener,
    source_url_prefix: String,
}

impl Default for SampleAssembler {
    fn default() -> Self {
        Self::new(
            TranscriptSegmenter::new(DEFAULT_CLIP_DURATION),
            TreeFlattener::new(DEFAULT_CLIP_DURATION),
        )
    }
}

impl SampleAssembler {
    pub fn new(segmenter: TranscriptSegmenter, flattener: TreeFlattener) -> Self {
        Self {
            segmenter,
            flattener,
            source_url_prefix: DEFAULT_SOURCE_URL_PREFIX.to_string(),
        }
    }

    pub fn with_source_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.source_url_prefix = prefix.into();
        self
    }

    pub fn source_url(&self, video_uid: &str) -> String {
        format!("{}{}", self.source_url_prefix, video_uid)
    }

    pub fn assemble(&self, record: &VideoRecord, filepath: PathBuf, media: MediaInfo) -> Result<Sample> {
        let meta = &record.metadata;
        let upload_date = parse_upload_date(&record.video_uid, meta.upload_date.as_deref())?;
        let fps = media.frame_rate;

        let transcript = self.segmenter.segment(&meta.transcript);
        let labels = self.flattener.flatten(&record.nodes);
        let field = |category: LabelCategory| TemporalDetections::from_intervals(labels.get(category), fps);

        Ok(Sample {
            filepath,
            title: meta.title.clone(),
            description: meta.description.clone(),
            full_video_url: self.source_url(&record.video_uid),
            upload_date,
            view_count: meta.view_count,
            like_count: meta.like_count,
            full_video_duration: meta.duration,
            transcript: transcript.text,
            tree_depth: labels.max_level,
            gpt_summary_brief: field(LabelCategory::SummaryBrief),
            gpt_summary_detailed: field(LabelCategory::SummaryDetailed),
            gpt_action_brief: field(LabelCategory::ActionBrief),
            gpt_action_detailed: field(LabelCategory::ActionDetailed),
            gpt_action_actor: field(LabelCategory::ActionActor),
            transcript_segments: TemporalDetections::from_intervals(&transcript.segments, fps),
            metadata: media,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upload_date() {
        let date = parse_upload_date("v1", Some("20230415")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2023, 4, 15).unwrap());
    }

    #[test]
    fn test_malformed_upload_dates() {
        for raw in ["2023-04-15", "2023041", "20231345", "abcdefgh", "", " 20230415 ", "20230415\n"] {
            let err = parse_upload_date("v1", Some(raw)).unwrap_err();
            assert!(matches!(err, CoreError::InvalidUploadDate { .. }), "{raw}");
        }
    }

    #[test]
    fn test_missing_upload_date() {
        let err = parse_upload_date("v1", None).unwrap_err();
        assert!(matches!(err, CoreError::MissingField { field: "metadata.upload_date", .. }));
    }

    #[test]
    fn test_source_url() {
        let assembler = SampleAssembler::default();
        assert_eq!(assembler.source_url("dQw4w9WgXcQ"), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }
}
