//! Feedback-queue high-water mark
//!
//! A single integer in plain text: the number of queue records consumed by
//! the last successful retrain.

use commentguard_core::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct HighWaterMark {
    path: PathBuf,
}

impl HighWaterMark {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current mark; a missing or unreadable file counts as zero
    pub fn read(&self) -> Result<usize> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        match raw.trim().parse::<usize>() {
            Ok(mark) => Ok(mark),
            Err(_) => {
                warn!(
                    path = %self.path.display(),
                    contents = %raw.trim(),
                    "Unparseable high-water mark, treating as 0"
                );
                Ok(0)
            }
        }
    }

    /// Replace the mark atomically
    pub fn write(&self, mark: usize) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        write!(tmp, "{}", mark)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_is_zero() {
        let dir = TempDir::new().unwrap();
        let mark = HighWaterMark::new(dir.path().join("retrain_flag.txt"));
        assert_eq!(mark.read().unwrap(), 0);
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let mark = HighWaterMark::new(dir.path().join("state").join("retrain_flag.txt"));
        mark.write(42).unwrap();
        assert_eq!(mark.read().unwrap(), 42);
        mark.write(7).unwrap();
        assert_eq!(mark.read().unwrap(), 7);
    }

    #[test]
    fn test_garbage_is_zero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flag.txt");
        std::fs::write(&path, "not a number").unwrap();
        assert_eq!(HighWaterMark::new(path).read().unwrap(), 0);
    }
}
