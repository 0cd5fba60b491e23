//! Hash-chained moderation audit log
//!
//! Every status change is appended as one JSON line whose hash covers the
//! event fields and the previous event's hash, so an edited or removed line
//! breaks the chain.

use chrono::{DateTime, Utc};
use commentguard_core::{ModerationStatus, RemoteOutcome, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const AUDIT_FILE: &str = "moderation-audit.jsonl";

/// One recorded moderation transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationEvent {
    /// Unique event id
    pub id: String,

    pub comment_id: String,

    pub video_id: String,

    /// Status before the transition
    pub from: ModerationStatus,

    /// Status after the transition
    pub to: ModerationStatus,

    /// Who drove the transition (ingestion, reclassification, human)
    pub actor: String,

    /// Outcome of the remote removal action
    pub remote: RemoteOutcome,

    /// Toxicity score behind the decision, if any
    pub score: Option<f32>,

    pub timestamp: DateTime<Utc>,

    /// Hash of the previous event in the log
    pub previous_hash: Option<String>,

    /// Hash of this event
    pub hash: Option<String>,
}

impl ModerationEvent {
    pub fn new(
        comment_id: impl Into<String>,
        video_id: impl Into<String>,
        from: ModerationStatus,
        to: ModerationStatus,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("evt_{}", uuid::Uuid::new_v4()),
            comment_id: comment_id.into(),
            video_id: video_id.into(),
            from,
            to,
            actor: actor.into(),
            remote: RemoteOutcome::NotAttempted,
            score: None,
            timestamp: Utc::now(),
            previous_hash: None,
            hash: None,
        }
    }

    pub fn with_remote(mut self, remote: RemoteOutcome) -> Self {
        self.remote = remote;
        self
    }

    pub fn with_score(mut self, score: Option<f32>) -> Self {
        self.score = score;
        self
    }

    fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.id.as_bytes());
        hasher.update(self.comment_id.as_bytes());
        hasher.update(self.video_id.as_bytes());
        hasher.update(self.from.as_str().as_bytes());
        hasher.update(self.to.as_str().as_bytes());
        hasher.update(self.actor.as_bytes());
        hasher.update(self.remote.as_str().as_bytes());
        if let Some(score) = self.score {
            hasher.update(score.to_le_bytes());
        }
        hasher.update(self.timestamp.to_rfc3339().as_bytes());
        if let Some(ref prev) = self.previous_hash {
            hasher.update(prev.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Outcome of [`AuditLog::verify`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditVerification {
    /// Events checked
    pub events: usize,

    /// One-based line number of the first broken event
    pub first_invalid: Option<usize>,
}

impl AuditVerification {
    pub fn is_valid(&self) -> bool {
        self.first_invalid.is_none()
    }
}

/// Append-only JSONL audit log
pub struct AuditLog {
    path: PathBuf,
    chain_hash: Mutex<Option<String>>,
}

impl AuditLog {
    /// Open the log in `dir`, resuming the chain from its last event
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(AUDIT_FILE);

        let mut last = None;
        if path.exists() {
            for line in BufReader::new(File::open(&path)?).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ModerationEvent>(&line) {
                    Ok(event) => last = event.hash,
                    Err(e) => warn!(error = %e, "Unreadable audit line"),
                }
            }
        }

        Ok(Self {
            path,
            chain_hash: Mutex::new(last),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Chain and append one event, returning it with hashes filled in
    pub fn record(&self, event: ModerationEvent) -> Result<ModerationEvent> {
        let mut chain = self.chain_hash.lock();

        let mut event = event;
        event.previous_hash = chain.clone();
        event.hash = Some(event.compute_hash());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = format!("{}\n", serde_json::to_string(&event)?);
        file.write_all(line.as_bytes())?;
        file.flush()?;

        *chain = event.hash.clone();
        debug!(
            comment_id = %event.comment_id,
            from = %event.from,
            to = %event.to,
            actor = %event.actor,
            "Audited moderation transition"
        );
        Ok(event)
    }

    /// Read every event in order
    pub fn events(&self) -> Result<Vec<ModerationEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut events = Vec::new();
        for line in BufReader::new(File::open(&self.path)?).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }
        Ok(events)
    }

    /// Recompute the chain and report the first broken link
    pub fn verify(&self) -> Result<AuditVerification> {
        let mut prev: Option<String> = None;
        let mut checked = 0;

        if self.path.exists() {
            for (index, line) in BufReader::new(File::open(&self.path)?).lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                checked += 1;

                let broken = match serde_json::from_str::<ModerationEvent>(&line) {
                    Ok(event) => {
                        let ok = event.previous_hash == prev
                            && event.hash.as_deref() == Some(event.compute_hash().as_str());
                        prev = event.hash;
                        !ok
                    }
                    Err(_) => true,
                };
                if broken {
                    return Ok(AuditVerification {
                        events: checked,
                        first_invalid: Some(index + 1),
                    });
                }
            }
        }

        Ok(AuditVerification {
            events: checked,
            first_invalid: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn event(comment: &str, to: ModerationStatus) -> ModerationEvent {
        ModerationEvent::new(comment, "v1", ModerationStatus::Unclassified, to, "ingestion")
    }

    #[test]
    fn test_chain_verifies() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::open(dir.path()).unwrap();

        let first = log.record(event("c1", ModerationStatus::Review)).unwrap();
        let second = log
            .record(
                event("c2", ModerationStatus::Deleted)
                    .with_remote(RemoteOutcome::Succeeded)
                    .with_score(Some(0.9)),
            )
            .unwrap();

        assert_eq!(second.previous_hash, first.hash);
        let report = log.verify().unwrap();
        assert_eq!(report.events, 2);
        assert!(report.is_valid());
    }

    #[test]
    fn test_chain_resumes_after_reopen() {
        let dir = TempDir::new().unwrap();
        let first = {
            let log = AuditLog::open(dir.path()).unwrap();
            log.record(event("c1", ModerationStatus::Neutral)).unwrap()
        };

        let log = AuditLog::open(dir.path()).unwrap();
        let second = log.record(event("c2", ModerationStatus::Neutral)).unwrap();
        assert_eq!(second.previous_hash, first.hash);
        assert!(log.verify().unwrap().is_valid());
        assert_eq!(log.events().unwrap().len(), 2);
    }

    #[test]
    fn test_tamper_detection() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::open(dir.path()).unwrap();
        log.record(event("c1", ModerationStatus::Review)).unwrap();
        log.record(event("c2", ModerationStatus::Review)).unwrap();

        let raw = std::fs::read_to_string(log.path()).unwrap();
        let tampered = raw.replacen("\"to\":\"review\"", "\"to\":\"neutral\"", 1);
        std::fs::write(log.path(), tampered).unwrap();

        let report = log.verify().unwrap();
        assert_eq!(report.first_invalid, Some(1));
    }
}
