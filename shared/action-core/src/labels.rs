//! Temporal label types and second-to-frame conversion

use serde::{Deserialize, Serialize};

/// Convert a time in seconds to a 1-based frame number.
///
/// Frame `n` covers `[(n - 1) / fps, n / fps)`. Times before the start of
/// the clip map to frame 1.
pub fn time_to_frame(seconds: f64, frame_rate: f64) -> u64 {
    (seconds * frame_rate).floor().max(0.0) as u64 + 1
}

/// Position of a node relative to the deepest level of its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Level 0, spans the whole video
    Root,
    /// Any level between root and the deepest one
    Mid,
    /// The deepest level present in this video
    Leaf,
}

impl Tier {
    /// Classify a node level against the video's maximum level.
    ///
    /// Root wins over leaf for a tree that only has level 0.
    pub fn classify(level: u32, max_level: u32) -> Self {
        if level == 0 {
            Tier::Root
        } else if level == max_level {
            Tier::Leaf
        } else {
            Tier::Mid
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Root => "root",
            Tier::Mid => "mid",
            Tier::Leaf => "leaf",
        }
    }
}

/// Tree topology carried on every label derived from a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAttributes {
    pub node_id: String,
    pub parent_id: Option<String>,
    pub level: u32,
    pub tier: Tier,
}

impl NodeAttributes {
    /// Names of the attributes this bundle adds to a label
    pub const FIELD_NAMES: [&'static str; 4] = ["node_id", "parent_id", "level", "tier"];
}

/// A labeled time span in seconds, before frame conversion
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledInterval {
    pub label: String,
    pub start: f64,
    pub end: f64,
    pub attributes: Option<NodeAttributes>,
}

impl LabeledInterval {
    pub fn new(label: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            label: label.into(),
            start,
            end,
            attributes: None,
        }
    }

    pub fn with_attributes(mut self, attributes: NodeAttributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Convert to frame support using the video's own frame rate
    pub fn to_detection(&self, frame_rate: f64) -> TemporalDetection {
        TemporalDetection {
            label: self.label.clone(),
            support: [
                time_to_frame(self.start, frame_rate),
                time_to_frame(self.end, frame_rate),
            ],
            attributes: self.attributes.clone(),
        }
    }
}

/// A label over an inclusive `[first, last]` frame range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalDetection {
    pub label: String,
    pub support: [u64; 2],
    #[serde(flatten)]
    pub attributes: Option<NodeAttributes>,
}

/// Container for the detections of one label field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalDetections {
    pub detections: Vec<TemporalDetection>,
}

impl TemporalDetections {
    /// Wrap detections, or `None` when there are none.
    ///
    /// An empty field is stored as absent rather than as an empty container.
    pub fn from_detections(detections: Vec<TemporalDetection>) -> Option<Self> {
        if detections.is_empty() {
            None
        } else {
            Some(Self { detections })
        }
    }

    /// Convert intervals at the given frame rate, `None` when empty
    pub fn from_intervals(intervals: &[LabeledInterval], frame_rate: f64) -> Option<Self> {
        Self::from_detections(
            intervals
                .iter()
                .map(|interval| interval.to_detection(frame_rate))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_to_frame() {
        assert_eq!(time_to_frame(2.0, 30.0), 61);
        assert_eq!(time_to_frame(0.0, 30.0), 1);
        assert_eq!(time_to_frame(0.999, 25.0), 25);
        assert_eq!(time_to_frame(1.0, 29.97), 30);
    }

    #[test]
    fn test_negative_time_is_first_frame() {
        assert_eq!(time_to_frame(-0.5, 30.0), 1);
        assert_eq!(time_to_frame(-0.01, 30.0), 1);
    }

    #[test]
    fn test_tier_classification() {
        assert_eq!(Tier::classify(0, 3), Tier::Root);
        assert_eq!(Tier::classify(1, 3), Tier::Mid);
        assert_eq!(Tier::classify(2, 3), Tier::Mid);
        assert_eq!(Tier::classify(3, 3), Tier::Leaf);
        assert_eq!(Tier::classify(0, 0), Tier::Root);
    }

    #[test]
    fn test_detection_serializes_flat_attributes() {
        let detection = LabeledInterval::new("stir the sauce", 2.0, 4.0)
            .with_attributes(NodeAttributes {
                node_id: "n7".to_string(),
                parent_id: Some("n3".to_string()),
                level: 2,
                tier: Tier::Leaf,
            })
            .to_detection(30.0);

        let value = serde_json::to_value(&detection).unwrap();
        assert_eq!(value["label"], "stir the sauce");
        assert_eq!(value["support"], serde_json::json!([61, 121]));
        assert_eq!(value["node_id"], "n7");
        assert_eq!(value["parent_id"], "n3");
        assert_eq!(value["level"], 2);
        assert_eq!(value["tier"], "leaf");
    }

    #[test]
    fn test_transcript_detection_has_no_attributes() {
        let detection = LabeledInterval::new("hello", 0.5, 2.0).to_detection(30.0);
        let value = serde_json::to_value(&detection).unwrap();

        assert_eq!(value["support"], serde_json::json!([16, 61]));
        assert!(value.get("node_id").is_none());
        assert!(value.get("tier").is_none());
    }

    #[test]
    fn test_empty_detections_are_absent() {
        assert!(TemporalDetections::from_detections(Vec::new()).is_none());
        assert!(TemporalDetections::from_intervals(&[], 30.0).is_none());

        let detections =
            TemporalDetections::from_intervals(&[LabeledInterval::new("a", 0.0, 1.0)], 10.0).unwrap();
        assert_eq!(detections.len(), 1);
    }
}
