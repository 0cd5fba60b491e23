//! Append-only feedback queue
//!
//! One record per line, no header, fields in fixed order:
//! `comment_id, language_type, toxic_word, context_text, category`.
//! Unset optional fields are written as the `NULL` placeholder.

use commentguard_core::{types::normalize_optional, Error, FeedbackRecord, Result, NULL_PLACEHOLDER};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const FIELDS: usize = 5;

/// Delimited-text log of labelled training examples
#[derive(Debug, Clone)]
pub struct FeedbackQueue {
    path: PathBuf,
}

impl FeedbackQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the queue file exists at all
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Append one record, creating the file if needed
    pub fn append(&self, record: &FeedbackRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer
            .write_record([
                record.comment_id.as_str(),
                record.language_type.as_deref().unwrap_or(NULL_PLACEHOLDER),
                record.toxic_word.as_deref().unwrap_or(NULL_PLACEHOLDER),
                record.context_text.as_str(),
                record.category.as_str(),
            ])
            .map_err(csv_error)?;
        writer.flush()?;

        debug!(
            comment_id = %record.comment_id,
            category = %record.category,
            "Appended feedback record"
        );
        Ok(())
    }

    /// Read every record in insertion order.
    ///
    /// A missing file reads as empty. Rows with too few fields are skipped
    /// with a warning.
    pub fn read_all(&self) -> Result<Vec<FeedbackRecord>> {
        if !self.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
            .map_err(csv_error)?;

        let mut records = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row.map_err(csv_error)?;
            if row.len() < FIELDS {
                warn!(
                    path = %self.path.display(),
                    line = line + 1,
                    fields = row.len(),
                    "Skipping malformed feedback row"
                );
                continue;
            }
            records.push(FeedbackRecord {
                comment_id: row[0].to_string(),
                language_type: normalize_optional(Some(row[1].to_string())),
                toxic_word: normalize_optional(Some(row[2].to_string())),
                context_text: row[3].to_string(),
                category: row[4].trim().to_string(),
            });
        }
        Ok(records)
    }

    /// Number of readable records
    pub fn len(&self) -> Result<usize> {
        Ok(self.read_all()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn csv_error(e: csv::Error) -> Error {
    if e.is_io_error() {
        match e.into_kind() {
            csv::ErrorKind::Io(io) => Error::Io(io),
            other => Error::storage(format!("feedback queue: {:?}", other)),
        }
    } else {
        Error::storage(format!("feedback queue: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_queue_reads_empty() {
        let dir = TempDir::new().unwrap();
        let queue = FeedbackQueue::new(dir.path().join("retrain_queue.csv"));
        assert!(!queue.exists());
        assert_eq!(queue.len().unwrap(), 0);
    }

    #[test]
    fn test_append_writes_placeholders_without_header() {
        let dir = TempDir::new().unwrap();
        let queue = FeedbackQueue::new(dir.path().join("retrain_queue.csv"));

        queue
            .append(&FeedbackRecord::new("c1", "you, \"friend\"", "Neutral"))
            .unwrap();
        queue
            .append(
                &FeedbackRecord::new("c2", "awful", "Insult")
                    .with_language("en")
                    .with_toxic_word("awful"),
            )
            .unwrap();

        let raw = std::fs::read_to_string(queue.path()).unwrap();
        let first_line = raw.lines().next().unwrap();
        assert!(first_line.starts_with("c1,NULL,NULL,"));
        assert!(first_line.ends_with(",Neutral"));

        let records = queue.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].context_text, "you, \"friend\"");
        assert_eq!(records[0].language_type, None);
        assert_eq!(records[1].language_type.as_deref(), Some("en"));
        assert_eq!(records[1].category, "Insult");
    }

    #[test]
    fn test_short_rows_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.csv");
        std::fs::write(&path, "c1,NULL,NULL,hello,Neutral\nbroken,row\n").unwrap();

        let queue = FeedbackQueue::new(path);
        assert_eq!(queue.len().unwrap(), 1);
    }
}
