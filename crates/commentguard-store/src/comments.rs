//! SQLite comment and video store
//!
//! Comments are created exactly once (first sighting wins) and never
//! physically removed. Only the moderation columns change afterwards.

use chrono::{DateTime, SecondsFormat, Utc};
use commentguard_core::{
    Comment, Error, ModerationStatus, MonitoredVideo, RemoteOutcome, Result,
};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS videos (
  video_id    TEXT PRIMARY KEY,
  link        TEXT NOT NULL DEFAULT '',
  name        TEXT NOT NULL DEFAULT '',
  created_at  TEXT NOT NULL            -- RFC3339 UTC
);

CREATE TABLE IF NOT EXISTS comments (
  comment_id         TEXT PRIMARY KEY,
  video_id           TEXT NOT NULL,
  author             TEXT NOT NULL DEFAULT '',
  text               TEXT NOT NULL DEFAULT '',
  like_count         INTEGER NOT NULL DEFAULT 0,
  published_at       TEXT,              -- RFC3339 UTC
  moderation_status  TEXT NOT NULL,
  toxicity_score     REAL,
  remote_outcome     TEXT NOT NULL DEFAULT 'not_attempted',
  created_at         TEXT NOT NULL,
  updated_at         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comments_video_status
  ON comments(video_id, moderation_status);
"#;

const COMMENT_COLUMNS: &str = "comment_id, video_id, author, text, like_count, published_at, \
     moderation_status, toxicity_score, remote_outcome";

/// Result of a get-or-create
#[derive(Debug, Clone, PartialEq)]
pub enum Insertion {
    /// The comment was new and has been stored
    Created,
    /// A comment with this id already existed; the stored row is returned
    /// untouched
    Existing(Comment),
}

/// Filter for comment listings
#[derive(Debug, Clone, Default)]
pub struct CommentFilter {
    pub video_id: Option<String>,
    pub status: Option<ModerationStatus>,
    pub limit: Option<usize>,
}

impl CommentFilter {
    pub fn video(mut self, video_id: impl Into<String>) -> Self {
        self.video_id = Some(video_id.into());
        self
    }

    pub fn status(mut self, status: ModerationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Per-status comment counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModerationStats {
    pub total: usize,
    pub unclassified: usize,
    pub neutral: usize,
    pub review: usize,
    pub deleted: usize,
}

impl ModerationStats {
    /// Toxic comments are those removed remotely; `toxic` is never stored.
    pub fn toxic(&self) -> usize {
        self.deleted
    }
}

impl std::fmt::Display for ModerationStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "total:        {}", self.total)?;
        writeln!(f, "unclassified: {}", self.unclassified)?;
        writeln!(f, "neutral:      {}", self.neutral)?;
        writeln!(f, "review:       {}", self.review)?;
        writeln!(f, "deleted:      {}", self.deleted)?;
        write!(f, "toxic:        {}", self.toxic())
    }
}

/// Single-writer SQLite store for comments and monitored videos
pub struct CommentStore {
    db: Mutex<Connection>,
}

impl CommentStore {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Connection::open(path).map_err(storage)?;
        info!(path = %path.display(), "Opened comment store");
        Self::init(db)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().map_err(storage)?)
    }

    fn init(db: Connection) -> Result<Self> {
        db.execute_batch(SCHEMA).map_err(storage)?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// Store `comment` unless its id is already known.
    ///
    /// First write wins: an existing row is never updated, so repeated
    /// sightings cannot change text or author.
    pub fn get_or_create(&self, comment: &Comment) -> Result<Insertion> {
        let db = self.db.lock();
        let now = now();
        let inserted = db
            .execute(
                r#"
                INSERT OR IGNORE INTO comments(
                  comment_id, video_id, author, text, like_count, published_at,
                  moderation_status, toxicity_score, remote_outcome, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
                "#,
                params![
                    comment.comment_id,
                    comment.video_id,
                    comment.author,
                    comment.text,
                    comment.like_count,
                    comment.published_at.map(format_time),
                    comment.moderation_status.as_str(),
                    comment.toxicity_score.map(f64::from),
                    comment.remote_outcome.as_str(),
                    now,
                ],
            )
            .map_err(storage)?;

        if inserted == 1 {
            debug!(comment_id = %comment.comment_id, video_id = %comment.video_id, "Stored new comment");
            return Ok(Insertion::Created);
        }

        let existing = query_comment(&db, &comment.comment_id)?.ok_or_else(|| {
            Error::storage(format!(
                "comment {} neither inserted nor found",
                comment.comment_id
            ))
        })?;
        Ok(Insertion::Existing(existing))
    }

    /// Fetch one comment
    pub fn get(&self, comment_id: &str) -> Result<Option<Comment>> {
        query_comment(&self.db.lock(), comment_id)
    }

    /// Fetch one comment, failing with `NotFound` if absent
    pub fn require(&self, comment_id: &str) -> Result<Comment> {
        self.get(comment_id)?
            .ok_or_else(|| Error::not_found(format!("comment {}", comment_id)))
    }

    /// Record a moderation outcome for an existing comment
    pub fn update_status(
        &self,
        comment_id: &str,
        status: ModerationStatus,
        score: Option<f32>,
        remote: RemoteOutcome,
    ) -> Result<()> {
        let changed = self
            .db
            .lock()
            .execute(
                r#"
                UPDATE comments
                SET moderation_status = ?2,
                    toxicity_score = COALESCE(?3, toxicity_score),
                    remote_outcome = ?4,
                    updated_at = ?5
                WHERE comment_id = ?1
                "#,
                params![
                    comment_id,
                    status.as_str(),
                    score.map(f64::from),
                    remote.as_str(),
                    now()
                ],
            )
            .map_err(storage)?;

        if changed == 0 {
            return Err(Error::not_found(format!("comment {}", comment_id)));
        }
        Ok(())
    }

    /// List comments, newest publication first
    pub fn list(&self, filter: &CommentFilter) -> Result<Vec<Comment>> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();
        if let Some(video_id) = &filter.video_id {
            values.push(video_id.clone());
            clauses.push(format!("video_id = ?{}", values.len()));
        }
        if let Some(status) = filter.status {
            values.push(status.as_str().to_string());
            clauses.push(format!("moderation_status = ?{}", values.len()));
        }

        let mut sql = format!("SELECT {} FROM comments", COMMENT_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY published_at DESC, rowid DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let db = self.db.lock();
        let mut stmt = db.prepare(&sql).map_err(storage)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), row_to_comment)
            .map_err(storage)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage)
    }

    /// Count comments per status for one video, or all videos
    pub fn stats(&self, video_id: Option<&str>) -> Result<ModerationStats> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(
                r#"
                SELECT moderation_status, COUNT(*) FROM comments
                WHERE ?1 IS NULL OR video_id = ?1
                GROUP BY moderation_status
                "#,
            )
            .map_err(storage)?;
        let rows = stmt
            .query_map(params![video_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(storage)?;

        let mut stats = ModerationStats::default();
        for row in rows {
            let (status, count) = row.map_err(storage)?;
            let count = count.max(0) as usize;
            stats.total += count;
            match status.parse::<ModerationStatus>()? {
                ModerationStatus::Unclassified => stats.unclassified += count,
                ModerationStatus::Neutral => stats.neutral += count,
                ModerationStatus::Review => stats.review += count,
                ModerationStatus::Deleted => stats.deleted += count,
                // Never stored by the pipeline; count it with the removals
                // so totals stay consistent.
                ModerationStatus::Toxic => stats.deleted += count,
            }
        }
        Ok(stats)
    }

    /// Register a video, or update the link and name of a known one
    pub fn add_video(
        &self,
        video_id: &str,
        link: Option<&str>,
        name: Option<&str>,
    ) -> Result<MonitoredVideo> {
        let db = self.db.lock();
        db.execute(
            "INSERT OR IGNORE INTO videos(video_id, link, name, created_at) VALUES (?1, '', '', ?2)",
            params![video_id, now()],
        )
        .map_err(storage)?;
        db.execute(
            r#"
            UPDATE videos
            SET link = COALESCE(?2, link),
                name = COALESCE(?3, name)
            WHERE video_id = ?1
            "#,
            params![video_id, link, name],
        )
        .map_err(storage)?;

        db.query_row(
            "SELECT video_id, link, name, created_at FROM videos WHERE video_id = ?1",
            params![video_id],
            row_to_video,
        )
        .map_err(storage)
    }

    /// Registered videos, most recently registered first
    pub fn list_videos(&self) -> Result<Vec<MonitoredVideo>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(
                "SELECT video_id, link, name, created_at FROM videos \
                 ORDER BY created_at DESC, rowid DESC",
            )
            .map_err(storage)?;
        let rows = stmt.query_map([], row_to_video).map_err(storage)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage)
    }

    /// The most recently registered video
    pub fn latest_video(&self) -> Result<Option<MonitoredVideo>> {
        Ok(self.list_videos()?.into_iter().next())
    }
}

fn query_comment(db: &Connection, comment_id: &str) -> Result<Option<Comment>> {
    db.query_row(
        &format!("SELECT {} FROM comments WHERE comment_id = ?1", COMMENT_COLUMNS),
        params![comment_id],
        row_to_comment,
    )
    .optional()
    .map_err(storage)
}

fn row_to_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
    let published: Option<String> = row.get(5)?;
    let status: String = row.get(6)?;
    let remote: String = row.get(8)?;

    Ok(Comment {
        comment_id: row.get(0)?,
        video_id: row.get(1)?,
        author: row.get(2)?,
        text: row.get(3)?,
        like_count: row.get(4)?,
        published_at: published.as_deref().and_then(parse_time),
        moderation_status: status
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?,
        toxicity_score: row.get::<_, Option<f64>>(7)?.map(|s| s as f32),
        remote_outcome: remote
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?,
    })
}

fn row_to_video(row: &Row<'_>) -> rusqlite::Result<MonitoredVideo> {
    let created: String = row.get(3)?;
    Ok(MonitoredVideo {
        video_id: row.get(0)?,
        link: row.get(1)?,
        name: row.get(2)?,
        created_at: parse_time(&created).unwrap_or_default(),
    })
}

fn storage(e: rusqlite::Error) -> Error {
    Error::storage(e.to_string())
}

fn now() -> String {
    format_time(Utc::now())
}

// Fixed-width so lexical order in SQL matches time order.
fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use commentguard_core::RemoteComment;
    use tempfile::TempDir;

    fn comment(id: &str, video: &str, text: &str) -> Comment {
        Comment::from_remote(video, RemoteComment::new(id, text).with_author("alice"))
    }

    #[test]
    fn test_get_or_create_first_write_wins() {
        let store = CommentStore::open_in_memory().unwrap();

        let first = comment("c1", "v1", "original text");
        assert_eq!(store.get_or_create(&first).unwrap(), Insertion::Created);

        let mut second = comment("c1", "v1", "edited text");
        second.author = "mallory".to_string();
        match store.get_or_create(&second).unwrap() {
            Insertion::Existing(stored) => {
                assert_eq!(stored.text, "original text");
                assert_eq!(stored.author, "alice");
            }
            other => panic!("expected existing, got {:?}", other),
        }
    }

    #[test]
    fn test_update_status_records_outcome() {
        let store = CommentStore::open_in_memory().unwrap();
        store.get_or_create(&comment("c1", "v1", "x")).unwrap();

        store
            .update_status("c1", ModerationStatus::Deleted, Some(0.8), RemoteOutcome::Succeeded)
            .unwrap();
        let stored = store.require("c1").unwrap();
        assert_eq!(stored.moderation_status, ModerationStatus::Deleted);
        assert_eq!(stored.remote_outcome, RemoteOutcome::Succeeded);
        assert!((stored.toxicity_score.unwrap() - 0.8).abs() < 1e-6);

        // A status-only update keeps the last score.
        store
            .update_status("c1", ModerationStatus::Neutral, None, RemoteOutcome::NotAttempted)
            .unwrap();
        assert!(store.require("c1").unwrap().toxicity_score.is_some());
    }

    #[test]
    fn test_update_unknown_is_not_found() {
        let store = CommentStore::open_in_memory().unwrap();
        let err = store
            .update_status("nope", ModerationStatus::Neutral, None, RemoteOutcome::NotAttempted)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(matches!(store.require("nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_list_and_stats() {
        let store = CommentStore::open_in_memory().unwrap();
        let base = Utc::now();
        for (i, (video, status)) in [
            ("v1", ModerationStatus::Review),
            ("v1", ModerationStatus::Neutral),
            ("v1", ModerationStatus::Deleted),
            ("v2", ModerationStatus::Review),
        ]
        .iter()
        .enumerate()
        {
            let mut c = comment(&format!("c{}", i), video, "t");
            c.published_at = Some(base + chrono::Duration::seconds(i as i64));
            store.get_or_create(&c).unwrap();
            store
                .update_status(&c.comment_id, *status, None, RemoteOutcome::NotAttempted)
                .unwrap();
        }

        let review = store
            .list(&CommentFilter::default().status(ModerationStatus::Review))
            .unwrap();
        assert_eq!(review.len(), 2);
        assert_eq!(review[0].comment_id, "c3", "newest first");

        let v1 = store.list(&CommentFilter::default().video("v1").limit(2)).unwrap();
        assert_eq!(v1.len(), 2);

        let stats = store.stats(Some("v1")).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.review, 1);
        assert_eq!(stats.toxic(), stats.deleted);

        assert_eq!(store.stats(None).unwrap().total, 4);
    }

    #[test]
    fn test_stats_report_includes_toxic() {
        let stats = ModerationStats {
            total: 5,
            unclassified: 1,
            neutral: 1,
            review: 1,
            deleted: 2,
        };
        let report = stats.to_string();
        assert_eq!(report.lines().count(), 6);
        assert!(report.contains("deleted:      2"));
        assert!(report.ends_with("toxic:        2"));
    }

    #[test]
    fn test_videos_newest_first_and_update() {
        let store = CommentStore::open_in_memory().unwrap();
        store.add_video("a", Some("https://youtu.be/a"), Some("First")).unwrap();
        store.add_video("b", None, None).unwrap();

        let updated = store.add_video("a", None, Some("Renamed")).unwrap();
        assert_eq!(updated.link, "https://youtu.be/a");
        assert_eq!(updated.name, "Renamed");

        let videos = store.list_videos().unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].video_id, "b");
        assert_eq!(store.latest_video().unwrap().unwrap().video_id, "b");
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db").join("comments.sqlite3");
        {
            let store = CommentStore::open(&path).unwrap();
            store.get_or_create(&comment("c1", "v1", "kept")).unwrap();
        }
        let store = CommentStore::open(&path).unwrap();
        assert_eq!(store.require("c1").unwrap().text, "kept");
    }
}
