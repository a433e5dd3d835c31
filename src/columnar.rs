//! Reading the dataset's parquet shards

use anyhow::{anyhow, Context, Result};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use parquet::schema::types::Type;
use serde_json::Value;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// List shard files matching `pattern` (relative to `root`), sorted by path.
///
/// The pattern's file name may hold a single `*` wildcard, e.g.
/// `data/part-*.parquet`. A missing shard directory yields no files.
pub fn list_shards(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern_path = Path::new(pattern);
    let dir = root.join(pattern_path.parent().unwrap_or_else(|| Path::new("")));
    let file_pattern = pattern_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid shard pattern: {}", pattern))?;

    if !dir.is_dir() {
        debug!("Shard directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let mut shards = Vec::new();
    for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if matches_pattern(file_pattern, name) {
                shards.push(entry.into_path());
            }
        }
    }

    shards.sort();
    Ok(shards)
}

fn matches_pattern(pattern: &str, name: &str) -> bool {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            name.len() >= prefix.len() + suffix.len() && name.starts_with(prefix) && name.ends_with(suffix)
        }
        None => pattern == name,
    }
}

fn open(path: &Path) -> Result<SerializedFileReader<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    SerializedFileReader::new(file).with_context(|| format!("Failed to read parquet footer of {}", path.display()))
}

/// Values of one top-level string column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnValues {
    /// Rows in the file, nulls included
    pub rows: usize,

    /// Non-null values in row order
    pub values: Vec<String>,
}

/// Read a single top-level string column, projecting away every other column
pub fn read_string_column(path: &Path, column: &str) -> Result<ColumnValues> {
    let reader = open(path)?;
    let schema = reader.metadata().file_metadata().schema();
    let field = schema
        .get_fields()
        .iter()
        .find(|f| f.name() == column)
        .cloned()
        .ok_or_else(|| anyhow!("Column {} not found in {}", column, path.display()))?;
    let projection = Type::group_type_builder(schema.name())
        .with_fields(vec![field])
        .build()?;

    let mut result = ColumnValues::default();
    let rows = reader
        .get_row_iter(Some(projection))
        .with_context(|| format!("Failed to read {}", path.display()))?;
    for row in rows {
        let row = row.with_context(|| format!("Corrupt row in {}", path.display()))?;
        result.rows += 1;
        for (_, value) in row.get_column_iter() {
            match value {
                Field::Str(s) => result.values.push(s.clone()),
                Field::Null => {}
                other => {
                    return Err(anyhow!(
                        "Column {} in {} is not a string column (found {})",
                        column,
                        path.display(),
                        other
                    ))
                }
            }
        }
    }

    debug!("Read {} rows of {} from {}", result.rows, column, path.display());
    Ok(result)
}

/// Read every row as JSON: groups become objects, lists become arrays
pub fn read_records(path: &Path) -> Result<Vec<Value>> {
    let reader = open(path)?;
    let rows = reader
        .get_row_iter(None)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut records = Vec::new();
    for row in rows {
        let row = row.with_context(|| format!("Corrupt row in {}", path.display()))?;
        records.push(row.to_json_value());
    }

    debug!("Read {} records from {}", records.len(), path.display());
    Ok(records)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pattern_matching() {
        assert!(matches_pattern("part-*.parquet", "part-00000.parquet"));
        assert!(matches_pattern("part-*.parquet", "part-.parquet"));
        assert!(!matches_pattern("part-*.parquet", "part-00000.parquet.incomplete"));
        assert!(!matches_pattern("part-*.parquet", "other-00000.parquet"));
        assert!(matches_pattern("train.parquet", "train.parquet"));
    }

    #[test]
    fn test_list_shards_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let data = temp_dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        for name in ["part-00002.parquet", "part-00000.parquet", "README.md", "part-00001.parquet.incomplete"] {
            std::fs::write(data.join(name), b"x").unwrap();
        }

        let shards = list_shards(temp_dir.path(), "data/part-*.parquet").unwrap();
        let names: Vec<String> = shards
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["part-00000.parquet", "part-00002.parquet"]);
    }

    #[test]
    fn test_missing_shard_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let shards = list_shards(temp_dir.path(), "data/part-*.parquet").unwrap();
        assert!(shards.is_empty());
    }

    #[test]
    fn test_read_string_column_projects() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("part-00000.parquet");
        write_uid_and_level(&path, &[("a", 0), ("b", 1), ("a", 2)]);

        let column = read_string_column(&path, "video_uid").unwrap();
        assert_eq!(column.rows, 3);
        assert_eq!(column.values, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_non_string_column_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("part-00000.parquet");
        write_uid_and_level(&path, &[("a", 0)]);

        assert!(read_string_column(&path, "level").is_err());
        assert!(read_string_column(&path, "missing").is_err());
    }

    #[test]
    fn test_read_records_as_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("part-00000.parquet");
        write_uid_and_level(&path, &[("vid1", 3)]);

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["video_uid"], "vid1");
        assert_eq!(records[0]["level"], 3);
    }

    #[test]
    fn test_nested_lists_decode_into_records() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("part-00000.parquet");
        let mut empty = cooking_record("v2");
        empty.transcript.clear();
        empty.nodes.clear();
        write_nested_records(&path, &[cooking_record("v1"), empty]);

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["metadata"]["transcript"][1]["text"], "chop the onions");
        assert_eq!(records[0]["nodes"][1]["parent_id"], "a");
        assert!(records[0]["nodes"][0]["parent_id"].is_null());
        assert_eq!(records[0]["nodes"][1]["gpt"]["action"]["brief"], "chop onions");

        let record = action_core::VideoRecord::from_value(records[0].clone()).unwrap();
        assert_eq!(record.video_uid, "v1");
        assert_eq!(record.metadata.upload_date.as_deref(), Some("20230415"));
        assert_eq!(record.metadata.transcript.len(), 2);
        assert_eq!(record.nodes.len(), 3);
        assert_eq!(record.nodes[1].level, 1);
        assert_eq!(record.nodes[1].start, 2.0);
        assert_eq!(record.nodes[1].action_brief(), Some("chop onions"));
        assert_eq!(record.max_level(), 1);

        let empty = action_core::VideoRecord::from_value(records[1].clone()).unwrap();
        assert!(empty.nodes.is_empty());
        assert!(empty.metadata.transcript.is_empty());
    }

    #[test]
    fn test_garbage_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("part-00000.parquet");
        std::fs::write(&path, b"definitely not parquet").unwrap();

        assert!(read_string_column(&path, "video_uid").is_err());
        assert!(read_records(&path).is_err());
    }
}
