//! Raw per-video records as published in the dataset shards

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{CoreError, Result};

/// One row of the dataset: a video, its metadata and its annotation tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoRecord {
    /// YouTube video identifier
    pub video_uid: String,

    /// Video metadata block (title, counts, transcript, ...)
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: VideoMeta,

    /// Annotation tree, stored as a flat node list
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<AnnotationNode>,
}

impl VideoRecord {
    /// Deserialize a record from a decoded shard row
    pub fn from_value(value: Value) -> Result<Self> {
        if value.get("video_uid").and_then(Value::as_str).is_none() {
            return Err(CoreError::InvalidRecord("row has no string video_uid".to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Deepest annotation level present, 0 for an empty tree
    pub fn max_level(&self) -> u32 {
        self.nodes.iter().map(|n| n.level).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VideoMeta {
    pub title: Option<String>,
    pub description: Option<String>,

    /// Upload date as published, `YYYYMMDD`
    pub upload_date: Option<String>,

    pub view_count: Option<i64>,
    pub like_count: Option<i64>,

    /// Duration of the full source video in seconds
    pub duration: Option<f64>,

    /// Speech-to-text entries, kept raw so malformed ones can be skipped later
    #[serde(default, deserialize_with = "null_as_default")]
    pub transcript: Vec<Value>,
}

/// A node of the annotation tree.
///
/// `node_id` and `parent_id` are opaque; the tree is never walked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnnotationNode {
    pub node_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub level: u32,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub gpt: Option<RefinedAnnotation>,
}

/// GPT-refined captions attached to a node
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RefinedAnnotation {
    #[serde(default)]
    pub summary: Option<RefinedSummary>,
    #[serde(default)]
    pub action: Option<RefinedAction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RefinedSummary {
    pub brief: Option<String>,
    pub detailed: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RefinedAction {
    pub brief: Option<String>,
    pub detailed: Option<String>,
    pub actor: Option<String>,
}

impl AnnotationNode {
    fn summary(&self) -> Option<&RefinedSummary> {
        self.gpt.as_ref()?.summary.as_ref()
    }

    fn action(&self) -> Option<&RefinedAction> {
        self.gpt.as_ref()?.action.as_ref()
    }

    pub fn summary_brief(&self) -> Option<&str> {
        self.summary()?.brief.as_deref()
    }

    pub fn summary_detailed(&self) -> Option<&str> {
        self.summary()?.detailed.as_deref()
    }

    pub fn action_brief(&self) -> Option<&str> {
        self.action()?.brief.as_deref()
    }

    pub fn action_detailed(&self) -> Option<&str> {
        self.action()?.detailed.as_deref()
    }

    pub fn action_actor(&self) -> Option<&str> {
        self.action()?.actor.as_deref()
    }
}

/// Shard rows carry explicit nulls for absent groups and lists
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_with_null_groups() {
        let record = VideoRecord::from_value(json!({
            "video_uid": "abc123",
            "metadata": null,
            "nodes": null,
        }))
        .unwrap();

        assert_eq!(record.video_uid, "abc123");
        assert!(record.metadata.transcript.is_empty());
        assert!(record.nodes.is_empty());
        assert_eq!(record.max_level(), 0);
    }

    #[test]
    fn test_record_without_uid_is_rejected() {
        let err = VideoRecord::from_value(json!({ "metadata": {} })).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecord(_)));
    }

    #[test]
    fn test_refined_field_accessors() {
        let node: AnnotationNode = serde_json::from_value(json!({
            "node_id": "n1",
            "parent_id": null,
            "level": 2,
            "start": 1.0,
            "end": 4.5,
            "gpt": {
                "summary": { "brief": "A cook plates pasta", "detailed": null },
                "action": { "brief": "plate pasta", "actor": "cook" }
            }
        }))
        .unwrap();

        assert_eq!(node.summary_brief(), Some("A cook plates pasta"));
        assert_eq!(node.summary_detailed(), None);
        assert_eq!(node.action_brief(), Some("plate pasta"));
        assert_eq!(node.action_detailed(), None);
        assert_eq!(node.action_actor(), Some("cook"));
        assert_eq!(node.parent_id, None);
    }

    #[test]
    fn test_node_without_gpt_block() {
        let node: AnnotationNode = serde_json::from_value(json!({
            "node_id": "n2",
            "parent_id": "n1",
            "level": 1,
            "start": 0.0,
            "end": 2.0
        }))
        .unwrap();

        assert!(node.gpt.is_none());
        assert_eq!(node.summary_brief(), None);
        assert_eq!(node.action_actor(), None);
    }
}
