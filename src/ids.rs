//! Unique video identifier extraction

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::columnar;

/// Accumulates the distinct values of one identifier column across shards
#[derive(Debug, Clone)]
pub struct IdExtractor {
    column: String,
    ids: BTreeSet<String>,
    files_read: usize,
}

impl IdExtractor {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ids: BTreeSet::new(),
            files_read: 0,
        }
    }

    /// Read the identifier column of one shard, returning its row count.
    ///
    /// Any read failure aborts; there is no partial success.
    pub fn add_file(&mut self, path: &Path) -> Result<usize> {
        let column = columnar::read_string_column(path, &self.column)
            .with_context(|| format!("Failed to extract {} from {}", self.column, path.display()))?;
        self.extend(column.values);
        self.files_read += 1;

        info!(
            "  {}: {} rows, running unique total: {}",
            path.display(),
            column.rows,
            self.ids.len()
        );
        Ok(column.rows)
    }

    /// Add identifiers directly; empty strings are ignored
    pub fn extend<I: IntoIterator<Item = String>>(&mut self, ids: I) {
        self.ids.extend(ids.into_iter().filter(|id| !id.is_empty()));
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn files_read(&self) -> usize {
        self.files_read
    }

    /// Identifiers in lexicographic order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// One identifier per line, each newline-terminated
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.ids.iter().map(|id| id.len() + 1).sum());
        for id in &self.ids {
            out.push_str(id);
            out.push('\n');
        }
        out
    }

    /// Write the sorted identifier list, replacing any existing file
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render()).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

/// Extract the unique identifiers of `shards` and write them to `output`
pub fn extract_ids(shards: &[PathBuf], column: &str, output: &Path) -> Result<IdExtractor> {
    info!("Found {} parquet files", shards.len());

    let mut extractor = IdExtractor::new(column);
    for shard in shards {
        extractor.add_file(shard)?;
    }
    extractor.write(output)?;

    info!("📝 Wrote {} unique video IDs to {}", extractor.len(), output.display());
    Ok(extractor)
}
