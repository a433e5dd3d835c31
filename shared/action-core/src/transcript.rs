//! Speech-to-text transcript parsing and segmentation

use serde_json::Value;

use crate::labels::LabeledInterval;
use crate::DEFAULT_CLIP_DURATION;

/// Window given to the last entry, which has no successor to bound it
pub const DEFAULT_TRAILING_WINDOW: f64 = 3.0;

/// A single timestamped transcript line
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub time: f64,
    pub text: String,
}

impl TranscriptEntry {
    /// Parse a raw entry, `None` if it is malformed.
    ///
    /// `time` may be a number or a numeric string; `text` must be a string.
    pub fn from_value(value: &Value) -> Option<Self> {
        let time = match value.get("time")? {
            Value::Number(number) => number.as_f64()?,
            Value::String(raw) => raw.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        let text = value.get("text")?.as_str()?.to_string();

        Some(Self { time, text })
    }
}

/// Transcript of the represented clip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    /// All retained entry texts, space-joined in input order
    pub text: String,

    /// One interval per retained entry that spans a non-empty range
    pub segments: Vec<LabeledInterval>,
}

/// Turns instantaneous transcript timestamps into time intervals
#[derive(Debug, Clone)]
pub struct TranscriptSegmenter {
    ceiling: f64,
    trailing_window: f64,
}

impl Default for TranscriptSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_CLIP_DURATION)
    }
}

impl TranscriptSegmenter {
    pub fn new(ceiling: f64) -> Self {
        Self {
            ceiling,
            trailing_window: DEFAULT_TRAILING_WINDOW,
        }
    }

    pub fn with_trailing_window(mut self, seconds: f64) -> Self {
        self.trailing_window = seconds;
        self
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// Segment raw transcript entries.
    ///
    /// Entries after the ceiling and malformed entries are skipped silently.
    pub fn segment(&self, raw: &[Value]) -> Transcript {
        let entries: Vec<TranscriptEntry> = raw
            .iter()
            .filter_map(TranscriptEntry::from_value)
            .filter(|entry| entry.time <= self.ceiling)
            .collect();

        let skipped = raw.len() - entries.len();
        if skipped > 0 {
            tracing::debug!("Skipped {} transcript entries (malformed or past the clip)", skipped);
        }

        self.segment_entries(&entries)
    }

    /// Segment already-parsed entries that lie within the ceiling
    pub fn segment_entries(&self, entries: &[TranscriptEntry]) -> Transcript {
        let text = entries
            .iter()
            .map(|entry| entry.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let mut segments = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let end = match entries.get(i + 1) {
                Some(next) => next.time,
                None => (entry.time + self.trailing_window).min(self.ceiling),
            };

            if entry.time < end && entry.time < self.ceiling {
                segments.push(LabeledInterval::new(entry.text.clone(), entry.time, end));
            }
        }

        Transcript { text, segments }
    }
}
