//! CommentGuard Policy
//!
//! Turns a toxicity probability into a moderation decision and governs
//! which status transitions are legal for which actor.
//!
//! - `decision`: fixed-threshold mapping from probability to
//!   `neutral` / `review` / `toxic`
//! - `machine`: the per-comment state machine, including the fail-open rule
//!   that sends a failed removal to human review
//! - `config`: YAML loading for tunable thresholds

pub mod config;
pub mod decision;
pub mod machine;

pub use config::PolicyConfig;
pub use decision::{decide, Decision, DecisionPolicy, Thresholds};
pub use machine::{check_transition, Actor, ModerationMachine, Resolution};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::decision::{decide, Decision, DecisionPolicy, Thresholds};
    pub use crate::machine::{Actor, ModerationMachine, Resolution};
}
