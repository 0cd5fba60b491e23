//! Moderation state machine
//!
//! ```text
//! unclassified ──policy──> neutral
//!              ├─policy──> review ──human──> neutral | deleted
//!              └─policy──> toxic ──remote ok──> deleted
//!                                └─remote failed/unavailable──> review
//! any ──human override──> neutral
//! ```
//!
//! `toxic` is never persisted: it only exists between the decision and the
//! removal attempt, so one store write records the final status.

use commentguard_core::{Error, ModerationStatus, RemoteOutcome, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decision::Decision;

use ModerationStatus::{Deleted, Neutral, Review, Toxic, Unclassified};

/// Who is driving a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// First-sighting classification during ingestion
    Ingestion,
    /// Explicitly invoked re-scoring of stored comments
    Reclassification,
    /// A human moderator
    Human,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingestion => "ingestion",
            Self::Reclassification => "reclassification",
            Self::Human => "human",
        }
    }
}

/// Check whether `actor` may move a comment from `from` to `to`
pub fn check_transition(from: ModerationStatus, to: ModerationStatus, actor: Actor) -> Result<()> {
    let allowed = match actor {
        Actor::Ingestion => matches!(
            (from, to),
            (Unclassified, Neutral | Review | Toxic) | (Toxic, Deleted | Review)
        ),
        Actor::Reclassification => match (from, to) {
            (Deleted, Deleted) => true,
            (Deleted, _) | (_, Unclassified) => false,
            (Toxic, Deleted) => true,
            (_, Deleted) => false,
            _ => true,
        },
        Actor::Human => match (from, to) {
            (_, Neutral) => true,
            (Deleted, Deleted) => true,
            (Deleted, _) => false,
            (_, Deleted) => true,
            _ => false,
        },
    };

    if allowed {
        Ok(())
    } else {
        Err(Error::InvalidTransition { from, to })
    }
}

/// Final status and remote outcome for one comment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Status to persist
    pub status: ModerationStatus,

    /// What happened to the removal action
    pub remote: RemoteOutcome,
}

impl Resolution {
    /// Whether this comment should be seeded into the feedback queue
    pub fn needs_review(&self) -> bool {
        self.status == Review
    }
}

/// Drives a comment from its current status to a durable one
#[derive(Debug, Clone, Copy)]
pub struct ModerationMachine {
    actor: Actor,
}

impl ModerationMachine {
    /// Machine for first-sighting classification
    pub fn ingestion() -> Self {
        Self {
            actor: Actor::Ingestion,
        }
    }

    /// Machine for explicit reclassification
    pub fn reclassification() -> Self {
        Self {
            actor: Actor::Reclassification,
        }
    }

    /// Machine for human actions
    pub fn human() -> Self {
        Self { actor: Actor::Human }
    }

    pub fn actor(&self) -> Actor {
        self.actor
    }

    /// Whether a decision requires the remote removal action
    pub fn requires_removal(decision: Decision) -> bool {
        decision == Decision::Toxic
    }

    /// Resolve a decision given the outcome of the removal attempt.
    ///
    /// `remote` is ignored for non-toxic decisions. A toxic decision only
    /// becomes `deleted` when the removal succeeded; every other outcome
    /// fails open to `review`.
    pub fn resolve(
        &self,
        current: ModerationStatus,
        decision: Decision,
        remote: RemoteOutcome,
    ) -> Result<Resolution> {
        let intermediate = decision.status();
        check_transition(current, intermediate, self.actor)?;

        let resolution = match decision {
            Decision::Toxic => {
                let status = if remote == RemoteOutcome::Succeeded {
                    Deleted
                } else {
                    Review
                };
                check_transition(Toxic, status, self.actor)?;
                Resolution { status, remote }
            }
            Decision::Review | Decision::Neutral => Resolution {
                status: intermediate,
                remote: RemoteOutcome::NotAttempted,
            },
        };

        debug!(
            actor = self.actor.as_str(),
            from = %current,
            decision = decision.as_str(),
            to = %resolution.status,
            remote = %resolution.remote,
            "Resolved moderation transition"
        );

        Ok(resolution)
    }

    /// Resolve a forced re-removal of an already deleted comment.
    ///
    /// The comment stays `deleted` whatever the remote outcome; only the
    /// outcome is recorded.
    pub fn resolve_forced_removal(&self, remote: RemoteOutcome) -> Result<Resolution> {
        check_transition(Deleted, Deleted, self.actor)?;
        Ok(Resolution {
            status: Deleted,
            remote,
        })
    }

    /// Resolve a human override to a target status
    pub fn resolve_override(
        &self,
        current: ModerationStatus,
        target: ModerationStatus,
        remote: RemoteOutcome,
    ) -> Result<Resolution> {
        check_transition(current, target, self.actor)?;
        if target == Deleted && current != Deleted && remote != RemoteOutcome::Succeeded {
            return Err(Error::InvalidTransition {
                from: current,
                to: target,
            });
        }
        Ok(Resolution {
            status: target,
            remote,
        })
    }
}
