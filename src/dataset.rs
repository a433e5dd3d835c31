//! Named, persistent sample collections on disk
//!
//! A dataset lives in `<root>/<name>/` as two JSON documents:
//! `metadata.json` (name, flags, field schema) and `samples.json`
//! (`{"samples": [...]}`).

use action_core::{NodeAttributes, Sample};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

pub const METADATA_FILE: &str = "metadata.json";
pub const SAMPLES_FILE: &str = "samples.json";

/// Value kinds a sample field can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Path,
    String,
    Integer,
    Float,
    Date,
    VideoMetadata,
    TemporalDetections,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Path => "path",
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Date => "date",
            FieldKind::VideoMetadata => "video_metadata",
            FieldKind::TemporalDetections => "temporal_detections",
        }
    }
}

/// Declared type of one sample field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub kind: FieldKind,

    /// Extra per-label attributes observed on the stored labels
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub attributes: BTreeSet<String>,
}

impl FieldSchema {
    fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            attributes: BTreeSet::new(),
        }
    }
}

/// Contents of `metadata.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub name: String,
    pub persistent: bool,
    pub created_at: DateTime<Utc>,
    pub sample_count: usize,
    pub fields: BTreeMap<String, FieldSchema>,
}

#[derive(Serialize)]
struct SamplesRef<'a> {
    samples: &'a [Sample],
}

#[derive(Deserialize)]
struct SamplesOwned {
    samples: Vec<Sample>,
}

/// Fields every sample carries
fn static_fields() -> BTreeMap<String, FieldSchema> {
    let mut fields = BTreeMap::new();
    for (name, kind) in [
        ("filepath", FieldKind::Path),
        ("metadata", FieldKind::VideoMetadata),
        ("title", FieldKind::String),
        ("description", FieldKind::String),
        ("full_video_url", FieldKind::String),
        ("upload_date", FieldKind::Date),
        ("view_count", FieldKind::Integer),
        ("like_count", FieldKind::Integer),
        ("full_video_duration", FieldKind::Float),
        ("transcript", FieldKind::String),
        ("tree_depth", FieldKind::Integer),
    ] {
        fields.insert(name.to_string(), FieldSchema::new(kind));
    }
    fields
}

/// A dataset being written
#[derive(Debug)]
pub struct DatasetStore {
    dir: PathBuf,
    metadata: DatasetMetadata,
    samples: Vec<Sample>,
}

impl DatasetStore {
    /// Create the named dataset under `root`.
    ///
    /// An existing dataset of the same name is deleted when `overwrite` is
    /// set and is an error otherwise.
    pub async fn create(root: &Path, name: &str, overwrite: bool, persistent: bool) -> Result<Self> {
        let dir = root.join(name);

        if fs::try_exists(&dir).await? {
            if !overwrite {
                return Err(anyhow!(
                    "Dataset {} already exists at {} and overwrite is disabled",
                    name,
                    dir.display()
                ));
            }
            info!("🗑️  Replacing existing dataset {}", name);
            fs::remove_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to remove {}", dir.display()))?;
        }

        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        Ok(Self {
            dir,
            metadata: DatasetMetadata {
                name: name.to_string(),
                persistent,
                created_at: Utc::now(),
                sample_count: 0,
                fields: static_fields(),
            },
            samples: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldSchema> {
        &self.metadata.fields
    }

    /// Append samples, returning how many were added
    pub fn add_samples(&mut self, samples: impl IntoIterator<Item = Sample>) -> usize {
        let before = self.samples.len();
        self.samples.extend(samples);
        self.metadata.sample_count = self.samples.len();
        self.samples.len() - before
    }

    /// Declare every label field and the attributes found on its labels.
    ///
    /// Returns the number of label fields that carry extra attributes.
    pub fn add_dynamic_sample_fields(&mut self) -> usize {
        let mut discovered: BTreeMap<&'static str, BTreeSet<String>> = BTreeMap::new();

        for sample in &self.samples {
            for (name, detections) in sample.label_fields() {
                let attributes = discovered.entry(name).or_default();
                let has_node_attributes = detections
                    .map(|d| d.detections.iter().any(|det| det.attributes.is_some()))
                    .unwrap_or(false);
                if has_node_attributes {
                    attributes.extend(NodeAttributes::FIELD_NAMES.iter().map(|a| a.to_string()));
                }
            }
        }

        let mut with_attributes = 0;
        for (name, attributes) in discovered {
            if !attributes.is_empty() {
                with_attributes += 1;
            }
            debug!("Field {}: {} dynamic attributes", name, attributes.len());
            let schema = self
                .metadata
                .fields
                .entry(name.to_string())
                .or_insert_with(|| FieldSchema::new(FieldKind::TemporalDetections));
            schema.attributes.extend(attributes);
        }

        with_attributes
    }

    /// Write `metadata.json` and `samples.json`
    pub async fn save(&self) -> Result<()> {
        let metadata_path = self.dir.join(METADATA_FILE);
        let samples_path = self.dir.join(SAMPLES_FILE);

        let metadata_json = serde_json::to_string_pretty(&self.metadata)?;
        fs::write(&metadata_path, metadata_json)
            .await
            .with_context(|| format!("Failed to write {}", metadata_path.display()))?;

        let samples_json = serde_json::to_string_pretty(&SamplesRef { samples: &self.samples })?;
        fs::write(&samples_path, samples_json)
            .await
            .with_context(|| format!("Failed to write {}", samples_path.display()))?;

        info!("💾 Saved {} samples to {}", self.samples.len(), self.dir.display());
        Ok(())
    }

    pub fn summary(&self) -> String {
        render_summary(&self.metadata)
    }
}

/// A saved dataset read back from disk
#[derive(Debug, Clone)]
pub struct Dataset {
    pub metadata: DatasetMetadata,
    pub samples: Vec<Sample>,
}

impl Dataset {
    pub async fn load(root: &Path, name: &str) -> Result<Self> {
        let dir = root.join(name);
        let metadata_path = dir.join(METADATA_FILE);
        let samples_path = dir.join(SAMPLES_FILE);

        let metadata_str = fs::read_to_string(&metadata_path)
            .await
            .with_context(|| format!("Dataset {} not found in {}", name, root.display()))?;
        let metadata: DatasetMetadata = serde_json::from_str(&metadata_str)
            .with_context(|| format!("Invalid {}", metadata_path.display()))?;

        let samples_str = fs::read_to_string(&samples_path)
            .await
            .with_context(|| format!("Failed to read {}", samples_path.display()))?;
        let samples: SamplesOwned = serde_json::from_str(&samples_str)
            .with_context(|| format!("Invalid {}", samples_path.display()))?;

        Ok(Self {
            metadata,
            samples: samples.samples,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn summary(&self) -> String {
        render_summary(&self.metadata)
    }
}

fn render_summary(metadata: &DatasetMetadata) -> String {
    let width = metadata.fields.keys().map(String::len).max().unwrap_or(0) + 1;

    let fields: String = metadata
        .fields
        .iter()
        .map(|(name, schema)| {
            let label = format!("{}:", name);
            let attributes = if schema.attributes.is_empty() {
                String::new()
            } else {
                let attributes: Vec<&str> = schema.attributes.iter().map(String::as_str).collect();
                format!(" ({})", attributes.join(", "))
            };
            format!(
                "    {:<width$} {}{}\n",
                label,
                schema.kind.as_str(),
                attributes,
                width = width
            )
        })
        .collect();

    format!(
        "Name:        {}\n\
         Persistent:  {}\n\
         Created:     {}\n\
         Num samples: {}\n\
         Sample fields:\n{}",
        metadata.name,
        metadata.persistent,
        metadata.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        metadata.sample_count,
        fields
    )
}
