//! Action Core - Record types and label conversion for Action100M videos

pub mod labels;
pub mod record;
pub mod sample;
pub mod transcript;
pub mod tree;

pub use labels::{time_to_frame, LabeledInterval, NodeAttributes, TemporalDetection, TemporalDetections, Tier};
pub use record::{AnnotationNode, RefinedAction, RefinedAnnotation, RefinedSummary, VideoMeta, VideoRecord};
pub use sample::{parse_upload_date, MediaInfo, Sample, SampleAssembler};
pub use transcript::{Transcript, TranscriptEntry, TranscriptSegmenter};
pub use tree::{AnnotationLabels, LabelCategory, TreeFlattener};

/// Seconds of each clip represented in the output
pub const DEFAULT_CLIP_DURATION: f64 = 90.0;

/// Placeholder the refinement stage writes for segments without an action
pub const NOT_APPLICABLE: &str = "N/A";

/// Result type for Action Core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error types for Action Core operations
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("Invalid upload date for {video_uid}: {value:?} (expected YYYYMMDD)")]
    InvalidUploadDate { video_uid: String, value: String },

    #[error("Missing field {field} for {video_uid}")]
    MissingField { video_uid: String, field: &'static str },

    #[error("Invalid video record: {0}")]
    InvalidRecord(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
