//! Tabular persistence
//!
//! Thin wrappers over the csv crate that attach the file path to errors.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::error::{PipelineError, Result};

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
    }
    Ok(())
}

/// Append rows, writing the header only when the file is new or empty
pub fn append_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| PipelineError::io(path, e))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file);
    for row in rows {
        writer.serialize(row).map_err(|e| PipelineError::csv(path, e))?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))
}

/// Replace the file with the given rows and a header
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path).map_err(|e| PipelineError::csv(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| PipelineError::csv(path, e))?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))
}

/// Read every row of a headered file
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| PipelineError::csv(path, e))?;
    reader
        .deserialize()
        .map(|row| row.map_err(|e| PipelineError::csv(path, e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawReview;

    fn review(text: &str) -> RawReview {
        RawReview {
            app_id: "com.example".into(),
            text: text.into(),
            rating: 4,
            date: "2024-01-01".into(),
        }
    }

    #[test]
    fn test_append_writes_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("reviews.csv");

        append_rows(&path, &[review("first, with comma")]).unwrap();
        append_rows(&path, &[review("second")]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("app_id").count(), 1);

        let rows: Vec<RawReview> = read_rows(&path).unwrap();
        assert_eq!(rows, vec![review("first, with comma"), review("second")]);
    }

    #[test]
    fn test_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        write_rows(&path, &[review("a"), review("b")]).unwrap();
        write_rows(&path, &[review("c")]).unwrap();

        let rows: Vec<RawReview> = read_rows(&path).unwrap();
        assert_eq!(rows, vec![review("c")]);
    }

    #[test]
    fn test_read_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<Vec<RawReview>> = read_rows(&dir.path().join("nope.csv"));
        assert!(matches!(result, Err(PipelineError::Csv { .. })));
    }
}
