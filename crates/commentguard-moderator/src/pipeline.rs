//! Ingestion, reclassification and human review
//!
//! Per comment the unit of work is: score, decide, attempt removal if
//! toxic, write the final status once. A run killed between two comments
//! leaves every comment either `unclassified` (picked up again next run) or
//! in a durable resolved status.

use commentguard_classifiers::ScorerAdapter;
use commentguard_core::{
    Comment, CommentSource, Error, FeedbackRecord, ModerationStatus, MonitoredVideo,
    RemoteModerationStatus, RemoteModerator, RemoteOutcome, Result,
};
use commentguard_policy::{Actor, Decision, DecisionPolicy, ModerationMachine, Resolution};
use commentguard_store::{
    AuditLog, CommentFilter, CommentStore, FeedbackQueue, Insertion, ModerationEvent,
    ModerationStats,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::retrain::{RetrainOutcome, RetrainTrigger};

/// Counts for one video's ingestion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub video_id: String,
    /// Comments returned by the source
    pub fetched: usize,
    /// Comments stored for the first time
    pub created: usize,
    /// Known comments left untouched
    pub skipped: usize,
    pub neutral: usize,
    pub review: usize,
    pub deleted: usize,
    /// Comments that could not be stored or scored
    pub failed: usize,
    /// Removal was unavailable for at least part of the run
    pub degraded: bool,
}

impl IngestReport {
    fn new(video_id: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            ..Default::default()
        }
    }

    fn count(&mut self, status: ModerationStatus) {
        match status {
            ModerationStatus::Neutral => self.neutral += 1,
            ModerationStatus::Review => self.review += 1,
            ModerationStatus::Deleted => self.deleted += 1,
            ModerationStatus::Unclassified | ModerationStatus::Toxic => {}
        }
    }
}

/// Result of a run over every monitored video
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub retrain: Option<RetrainOutcome>,
    pub videos: Vec<IngestReport>,
    /// Videos whose fetch failed, with the error message
    pub failed_videos: Vec<(String, String)>,
}

impl RunReport {
    pub fn created(&self) -> usize {
        self.videos.iter().map(|v| v.created).sum()
    }
}

/// Counts for one reclassification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclassifyReport {
    pub video_id: String,
    /// Comments considered
    pub total: usize,
    /// Comments whose status changed
    pub changed: usize,
    /// Deleted comments left alone
    pub skipped_deleted: usize,
    /// Deleted comments whose removal was re-attempted
    pub removal_retried: usize,
    pub failed: usize,
}

/// Per-run removal state
#[derive(Debug, Default)]
struct RunState {
    /// Set once the platform is known to be unreachable; no further
    /// removals are attempted in this run
    degraded: bool,
}

/// The moderation pipeline
pub struct Moderator {
    store: Arc<CommentStore>,
    queue: FeedbackQueue,
    audit: Arc<AuditLog>,
    scorer: Arc<ScorerAdapter>,
    policy: DecisionPolicy,
    source: Arc<dyn CommentSource>,
    remote: Option<Arc<dyn RemoteModerator>>,
    retrain: Option<RetrainTrigger>,
    placeholder_category: String,
    page_size: usize,
    fallback_videos: Vec<String>,
}

impl Moderator {
    pub fn new(
        store: Arc<CommentStore>,
        queue: FeedbackQueue,
        audit: Arc<AuditLog>,
        scorer: Arc<ScorerAdapter>,
        policy: DecisionPolicy,
        source: Arc<dyn CommentSource>,
    ) -> Self {
        Self {
            store,
            queue,
            audit,
            scorer,
            policy,
            source,
            remote: None,
            retrain: None,
            placeholder_category: "Neutral".to_string(),
            page_size: 100,
            fallback_videos: Vec::new(),
        }
    }

    /// Enable remote removal
    pub fn with_remote(mut self, remote: Arc<dyn RemoteModerator>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Check the retrain trigger before every run
    pub fn with_retrain(mut self, trigger: RetrainTrigger) -> Self {
        self.retrain = Some(trigger);
        self
    }

    /// Category written for auto-enqueued review comments
    pub fn with_placeholder_category(mut self, category: impl Into<String>) -> Self {
        self.placeholder_category = category.into();
        self
    }

    /// Default number of comments fetched per video
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Videos polled when none are registered
    pub fn with_fallback_videos(mut self, videos: Vec<String>) -> Self {
        self.fallback_videos = videos;
        self
    }

    pub fn store(&self) -> &CommentStore {
        &self.store
    }

    pub fn queue(&self) -> &FeedbackQueue {
        &self.queue
    }

    pub fn retrain_trigger(&self) -> Option<&RetrainTrigger> {
        self.retrain.as_ref()
    }

    // ---- ingestion -------------------------------------------------------

    /// Ingest one video, or the most recently registered one when `video_id`
    /// is `None`
    pub async fn ingest_video(
        &self,
        video_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<(Option<RetrainOutcome>, IngestReport)> {
        let video_id = match video_id {
            Some(id) => id.to_string(),
            None => self
                .monitored_videos()?
                .into_iter()
                .next()
                .ok_or_else(|| Error::not_found("no monitored videos"))?,
        };

        let retrain = self.maybe_retrain();
        let mut state = RunState::default();
        let report = self.ingest_one(&video_id, limit, &mut state).await?;
        Ok((retrain, report))
    }

    /// Ingest every monitored video, most recently registered first.
    ///
    /// Fetch failures are isolated per video; only a missing scorer aborts.
    pub async fn ingest_all(&self, limit: Option<usize>) -> Result<RunReport> {
        let videos = self.monitored_videos()?;
        let mut report = RunReport {
            retrain: self.maybe_retrain(),
            ..Default::default()
        };
        let mut state = RunState::default();

        info!(videos = videos.len(), "Starting ingestion run");
        for video_id in videos {
            match self.ingest_one(&video_id, limit, &mut state).await {
                Ok(video_report) => report.videos.push(video_report),
                Err(e) if e.is_fatal_to_run() => {
                    error!(video_id = %video_id, error = %e, "Aborting ingestion run");
                    return Err(e);
                }
                Err(e) => {
                    error!(video_id = %video_id, error = %e, "Failed to ingest video");
                    report.failed_videos.push((video_id, e.to_string()));
                }
            }
        }

        info!(
            videos = report.videos.len(),
            failed_videos = report.failed_videos.len(),
            created = report.created(),
            "Ingestion run complete"
        );
        Ok(report)
    }

    /// Video ids to poll, newest registration first
    pub fn monitored_videos(&self) -> Result<Vec<String>> {
        let registered = self.store.list_videos()?;
        if registered.is_empty() {
            return Ok(self.fallback_videos.clone());
        }
        Ok(registered.into_iter().map(|v| v.video_id).collect())
    }

    fn maybe_retrain(&self) -> Option<RetrainOutcome> {
        let trigger = self.retrain.as_ref()?;
        match trigger.check_and_run() {
            Ok(outcome) => {
                if let RetrainOutcome::Retrained { version, .. } = &outcome {
                    self.scorer.artifacts_published();
                    info!(version = %version, "Scoring this run with the retrained classifier");
                }
                Some(outcome)
            }
            Err(e) => {
                // Keep ingesting with the current model.
                error!(error = %e, "Retrain failed");
                None
            }
        }
    }

    async fn ingest_one(
        &self,
        video_id: &str,
        limit: Option<usize>,
        state: &mut RunState,
    ) -> Result<IngestReport> {
        let mut report = IngestReport::new(video_id);
        let page_size = limit.unwrap_or(self.page_size).max(1);

        let remote_comments = self.source.list_comments(video_id, page_size).await?;
        report.fetched = remote_comments.len();

        // Store first so that an aborted run leaves `unclassified` rows
        // behind for the next run to pick up.
        let mut to_classify = Vec::new();
        for remote in remote_comments {
            let comment = Comment::from_remote(video_id, remote);
            match self.store.get_or_create(&comment) {
                Ok(Insertion::Created) => {
                    report.created += 1;
                    to_classify.push(comment);
                }
                Ok(Insertion::Existing(stored))
                    if stored.moderation_status == ModerationStatus::Unclassified =>
                {
                    debug!(comment_id = %stored.comment_id, "Retrying unclassified comment");
                    to_classify.push(stored);
                }
                Ok(Insertion::Existing(_)) => report.skipped += 1,
                Err(e) => {
                    warn!(comment_id = %comment.comment_id, video_id = %video_id, error = %e, "Failed to store comment");
                    report.failed += 1;
                }
            }
        }

        let scores = self.score_comments(&to_classify).await?;
        let machine = ModerationMachine::ingestion();

        for (comment, score) in to_classify.iter().zip(scores) {
            let Some(score) = score else {
                report.failed += 1;
                continue;
            };
            match self.classify(&machine, comment, score, true, state).await {
                Ok(resolution) => report.count(resolution.status),
                Err(e) => {
                    warn!(comment_id = %comment.comment_id, video_id = %video_id, error = %e, "Failed to classify comment");
                    report.failed += 1;
                }
            }
        }

        report.degraded = state.degraded;
        info!(
            video_id = %video_id,
            fetched = report.fetched,
            created = report.created,
            neutral = report.neutral,
            review = report.review,
            deleted = report.deleted,
            failed = report.failed,
            degraded = report.degraded,
            "Ingested video"
        );
        Ok(report)
    }

    /// Score a batch, falling back to one-by-one scoring when the batch
    /// fails. `None` marks a comment whose scoring failed.
    async fn score_comments(&self, comments: &[Comment]) -> Result<Vec<Option<f32>>> {
        if comments.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = comments.iter().map(|c| c.text.clone()).collect();

        match self.scorer.score(&texts).await {
            Ok(scores) => Ok(scores.into_iter().map(Some).collect()),
            Err(e) if e.is_fatal_to_run() => Err(e),
            Err(e) => {
                warn!(error = %e, batch = texts.len(), "Batch scoring failed; scoring individually");
                let mut scores = Vec::with_capacity(comments.len());
                for comment in comments {
                    match self.scorer.score_one(&comment.text).await {
                        Ok(score) => scores.push(Some(score)),
                        Err(e) if e.is_fatal_to_run() => return Err(e),
                        Err(e) => {
                            warn!(
                                comment_id = %comment.comment_id,
                                video_id = %comment.video_id,
                                error = %e,
                                "Failed to score comment"
                            );
                            scores.push(None);
                        }
                    }
                }
                Ok(scores)
            }
        }
    }

    /// Decide, attempt removal when toxic, and persist the resolution
    async fn classify(
        &self,
        machine: &ModerationMachine,
        comment: &Comment,
        score: f32,
        apply_remote: bool,
        state: &mut RunState,
    ) -> Result<Resolution> {
        let decision = self.policy.decide(score);

        let remote = if apply_remote && ModerationMachine::requires_removal(decision) {
            self.remove_remote(comment, state).await
        } else {
            RemoteOutcome::NotAttempted
        };

        let resolution = machine.resolve(comment.moderation_status, decision, remote)?;
        self.persist(comment, resolution, Some(score), machine.actor())?;

        if resolution.needs_review() && comment.moderation_status != ModerationStatus::Review {
            self.enqueue_for_review(comment);
        }

        debug!(
            comment_id = %comment.comment_id,
            score,
            decision = decision.as_str(),
            status = %resolution.status,
            "Classified comment"
        );
        Ok(resolution)
    }

    /// Attempt remote removal, degrading the run when the platform is down
    async fn remove_remote(&self, comment: &Comment, state: &mut RunState) -> RemoteOutcome {
        let outcome = if state.degraded {
            RemoteOutcome::Unavailable
        } else if let Some(remote) = &self.remote {
            match remote
                .set_moderation_status(&comment.comment_id, RemoteModerationStatus::Rejected)
                .await
            {
                Ok(()) => RemoteOutcome::Succeeded,
                Err(Error::RemoteServiceUnavailable(message)) => {
                    warn!(
                        comment_id = %comment.comment_id,
                        video_id = %comment.video_id,
                        error = %message,
                        "Remote moderation unavailable; continuing without removals"
                    );
                    state.degraded = true;
                    RemoteOutcome::Unavailable
                }
                Err(e) => {
                    warn!(
                        comment_id = %comment.comment_id,
                        video_id = %comment.video_id,
                        error = %e,
                        "Remote removal failed; sending to review"
                    );
                    RemoteOutcome::Failed
                }
            }
        } else {
            if !state.degraded {
                warn!("No remote moderator configured; toxic comments go to review");
            }
            state.degraded = true;
            RemoteOutcome::Unavailable
        };

        metrics::counter!("commentguard_remote_actions_total", "outcome" => outcome.as_str())
            .increment(1);
        outcome
    }

    fn persist(
        &self,
        comment: &Comment,
        resolution: Resolution,
        score: Option<f32>,
        actor: Actor,
    ) -> Result<()> {
        self.store.update_status(
            &comment.comment_id,
            resolution.status,
            score,
            resolution.remote,
        )?;
        metrics::counter!(
            "commentguard_moderation_transitions_total",
            "status" => resolution.status.as_str(),
            "actor" => actor.as_str()
        )
        .increment(1);

        let event = ModerationEvent::new(
            &comment.comment_id,
            &comment.video_id,
            comment.moderation_status,
            resolution.status,
            actor.as_str(),
        )
        .with_remote(resolution.remote)
        .with_score(score);
        if let Err(e) = self.audit.record(event) {
            warn!(comment_id = %comment.comment_id, error = %e, "Failed to write audit event");
        }
        Ok(())
    }

    fn enqueue_for_review(&self, comment: &Comment) {
        let record = FeedbackRecord::new(
            &comment.comment_id,
            &comment.text,
            &self.placeholder_category,
        );
        if let Err(e) = self.queue.append(&record) {
            warn!(
                comment_id = %comment.comment_id,
                video_id = %comment.video_id,
                error = %e,
                "Failed to enqueue review comment"
            );
        }
    }

    // ---- reclassification ------------------------------------------------

    /// Re-score every stored comment of a video.
    ///
    /// Deleted comments are left alone unless `force` is set, in which case
    /// removal is attempted again (with `apply_remote`) and they stay
    /// deleted. Without `apply_remote`, comments that now score toxic go to
    /// review instead of being removed.
    pub async fn reclassify_video(
        &self,
        video_id: &str,
        apply_remote: bool,
        force: bool,
    ) -> Result<ReclassifyReport> {
        let comments = self.store.list(&CommentFilter::default().video(video_id))?;
        let mut report = ReclassifyReport {
            video_id: video_id.to_string(),
            total: comments.len(),
            ..Default::default()
        };
        let machine = ModerationMachine::reclassification();
        let mut state = RunState::default();

        let (deleted, live): (Vec<Comment>, Vec<Comment>) = comments
            .into_iter()
            .partition(|c| c.moderation_status == ModerationStatus::Deleted);

        for comment in &deleted {
            if !(force && apply_remote) {
                report.skipped_deleted += 1;
                continue;
            }
            let outcome = self.remove_remote(comment, &mut state).await;
            match machine
                .resolve_forced_removal(outcome)
                .and_then(|r| self.persist(comment, r, None, machine.actor()))
            {
                Ok(()) => report.removal_retried += 1,
                Err(e) => {
                    warn!(comment_id = %comment.comment_id, error = %e, "Forced removal failed");
                    report.failed += 1;
                }
            }
        }

        let scores = self.score_comments(&live).await?;
        for (comment, score) in live.iter().zip(scores) {
            let Some(score) = score else {
                report.failed += 1;
                continue;
            };
            match self
                .classify(&machine, comment, score, apply_remote, &mut state)
                .await
            {
                Ok(resolution) if resolution.status != comment.moderation_status => {
                    report.changed += 1
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(comment_id = %comment.comment_id, video_id = %video_id, error = %e, "Failed to reclassify comment");
                    report.failed += 1;
                }
            }
        }

        info!(
            video_id = %video_id,
            total = report.total,
            changed = report.changed,
            skipped_deleted = report.skipped_deleted,
            "Reclassified video"
        );
        Ok(report)
    }

    // ---- human review ----------------------------------------------------

    /// Remove a comment on the platform, then mark it deleted.
    ///
    /// The local status only changes when the removal succeeds.
    pub async fn delete_comment(&self, comment_id: &str) -> Result<Comment> {
        let comment = self.store.require(comment_id)?;
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| Error::remote_unavailable("no remote moderator configured"))?;

        let result = remote
            .set_moderation_status(comment_id, RemoteModerationStatus::Rejected)
            .await;
        metrics::counter!(
            "commentguard_remote_actions_total",
            "outcome" => if result.is_ok() { "succeeded" } else { "failed" }
        )
        .increment(1);
        result?;

        let resolution = ModerationMachine::human().resolve_override(
            comment.moderation_status,
            ModerationStatus::Deleted,
            RemoteOutcome::Succeeded,
        )?;
        self.persist(&comment, resolution, None, Actor::Human)?;
        info!(comment_id = %comment_id, "Comment deleted by moderator");
        self.store.require(comment_id)
    }

    /// Record a human label for a comment and mark it neutral
    pub fn approve(
        &self,
        comment_id: &str,
        category: &str,
        language: Option<&str>,
        toxic_word: Option<&str>,
    ) -> Result<Comment> {
        let comment = self.store.require(comment_id)?;
        let resolution = ModerationMachine::human().resolve_override(
            comment.moderation_status,
            ModerationStatus::Neutral,
            comment.remote_outcome,
        )?;

        let mut record = FeedbackRecord::new(&comment.comment_id, &comment.text, category);
        if let Some(language) = language {
            record = record.with_language(language);
        }
        if let Some(word) = toxic_word {
            record = record.with_toxic_word(word);
        }
        self.queue.append(&record)?;

        self.persist(&comment, resolution, None, Actor::Human)?;
        info!(comment_id = %comment_id, category = %category, "Comment approved");
        self.store.require(comment_id)
    }

    /// Mark a comment neutral without recording a label
    pub fn move_to_neutral(&self, comment_id: &str) -> Result<Comment> {
        let comment = self.store.require(comment_id)?;
        let resolution = ModerationMachine::human().resolve_override(
            comment.moderation_status,
            ModerationStatus::Neutral,
            comment.remote_outcome,
        )?;
        self.persist(&comment, resolution, None, Actor::Human)?;
        info!(comment_id = %comment_id, "Comment moved to neutral");
        self.store.require(comment_id)
    }

    // ---- registry and listings -------------------------------------------

    pub fn add_video(
        &self,
        video_id: &str,
        link: Option<&str>,
        name: Option<&str>,
    ) -> Result<MonitoredVideo> {
        let video = self.store.add_video(video_id, link, name)?;
        info!(video_id = %video_id, name = %video.display_name(), "Video registered");
        Ok(video)
    }

    pub fn list_videos(&self) -> Result<Vec<MonitoredVideo>> {
        self.store.list_videos()
    }

    pub fn stats(&self, video_id: Option<&str>) -> Result<ModerationStats> {
        self.store.stats(video_id)
    }

    pub fn list_comments(
        &self,
        status: ModerationStatus,
        video_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Comment>> {
        let mut filter = CommentFilter::default().status(status);
        if let Some(video_id) = video_id {
            filter = filter.video(video_id);
        }
        if let Some(limit) = limit {
            filter = filter.limit(limit);
        }
        self.store.list(&filter)
    }

    /// Decision for a probability under the configured thresholds
    pub fn decide(&self, probability: f32) -> Decision {
        self.policy.decide(probability)
    }
}
