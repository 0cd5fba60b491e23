//! Wiring from settings to a running pipeline

use commentguard_classifiers::{ArtifactStore, ScorerAdapter, Trainer};
use commentguard_core::{CommentSource, RemoteModerator, Result};
use commentguard_store::{AuditLog, CommentStore, FeedbackQueue, HighWaterMark};
use std::sync::Arc;
use tracing::{info, warn};

use crate::pipeline::Moderator;
use crate::retrain::RetrainTrigger;
use crate::settings::Settings;
use crate::youtube::YoutubeClient;

/// Local state opened from settings, shared by the pipeline and the
/// operator commands that bypass it
pub struct App {
    pub settings: Settings,
    pub moderator: Moderator,
    pub audit: Arc<AuditLog>,
    pub artifacts: Arc<ArtifactStore>,
}

impl App {
    /// Open every store and build the pipeline against the YouTube API
    pub fn open(settings: Settings) -> Result<Self> {
        let youtube = Arc::new(YoutubeClient::new(&settings.youtube)?);
        let remote = youtube.can_moderate().then(|| Arc::clone(&youtube));
        if remote.is_none() {
            warn!("No YouTube access token configured; toxic comments will go to review");
        }
        Self::with_source(settings, youtube, remote)
    }

    /// Build the pipeline against an arbitrary comment platform
    pub fn with_source<S>(
        settings: Settings,
        source: Arc<S>,
        remote: Option<Arc<S>>,
    ) -> Result<Self>
    where
        S: CommentSource + RemoteModerator + 'static,
    {
        let store = Arc::new(CommentStore::open(&settings.store.database)?);
        let audit = Arc::new(AuditLog::open(&settings.store.audit_dir)?);
        let queue = FeedbackQueue::new(&settings.feedback.queue_path);
        let mark = HighWaterMark::new(&settings.feedback.high_water_mark_path);

        let artifacts = Arc::new(ArtifactStore::new(
            &settings.scorer.models_dir,
            settings.retrain.versions_retained,
        ));
        let scorer = Arc::new(ScorerAdapter::from_config(
            &settings.scorer,
            Arc::clone(&artifacts),
        ));
        let policy = settings.policy.build()?;

        let trigger = RetrainTrigger::new(
            queue.clone(),
            mark,
            Trainer::new(settings.retrain.trainer_config()),
            Arc::clone(&artifacts),
            settings.retrain.threshold,
        );

        let mut moderator = Moderator::new(
            store,
            queue,
            Arc::clone(&audit),
            scorer,
            policy,
            source,
        )
        .with_retrain(trigger)
        .with_placeholder_category(settings.feedback.placeholder_category.clone())
        .with_page_size(settings.youtube.page_size)
        .with_fallback_videos(settings.videos.clone());

        if let Some(remote) = remote {
            moderator = moderator.with_remote(remote);
        }

        info!(
            database = %settings.store.database.display(),
            backend = ?settings.scorer.backend,
            retrain_threshold = settings.retrain.threshold,
            "Moderator ready"
        );

        Ok(Self {
            settings,
            moderator,
            audit,
            artifacts,
        })
    }
}

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    metrics::describe_counter!(
        "commentguard_moderation_transitions_total",
        "Persisted moderation transitions by resulting status and actor"
    );
    metrics::describe_counter!(
        "commentguard_remote_actions_total",
        "Remote removal attempts by outcome"
    );
    metrics::describe_counter!(
        "commentguard_retrains_total",
        "Completed classifier retrains"
    );
    metrics::describe_histogram!(
        "commentguard_scoring_latency_us",
        "Scoring latency per batch in microseconds"
    );
}
