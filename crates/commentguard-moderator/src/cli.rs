use clap::{Parser, Subcommand};
use commentguard_core::ModerationStatus;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "commentguard")]
#[command(
    author,
    version,
    about = "Toxic comment moderation for YouTube channels"
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file (defaults to ./commentguard.yaml when present)
    #[arg(short, long, global = true, env = "COMMENTGUARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch and classify comments for one video
    Fetch {
        /// Video id (defaults to the most recently registered video)
        #[arg(long)]
        video: Option<String>,

        /// Maximum comments to fetch
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Fetch and classify comments for every monitored video
    FetchAll {
        /// Maximum comments to fetch per video
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Re-score every stored comment of a video
    Reclassify {
        /// Video id
        video: String,

        /// Remove comments that now score toxic
        #[arg(long)]
        apply_remote: bool,

        /// Re-attempt removal of comments already deleted
        #[arg(long)]
        force: bool,
    },

    /// Remove a comment on the platform and mark it deleted
    Delete {
        /// Comment id
        comment: String,
    },

    /// Label a comment for retraining and mark it neutral
    Approve {
        /// Comment id
        comment: String,

        /// Label category, e.g. Neutral, Insult, Threat
        #[arg(long)]
        category: String,

        /// Language tag
        #[arg(long)]
        language: Option<String>,

        /// Flagged term within the comment
        #[arg(long)]
        toxic_word: Option<String>,
    },

    /// Mark a comment neutral without labelling it
    Neutral {
        /// Comment id
        comment: String,
    },

    /// Retrain the classifier from the feedback queue
    Retrain {
        /// Retrain even below the threshold
        #[arg(long)]
        force: bool,
    },

    /// Register a video for monitoring
    AddVideo {
        /// Video id
        id: String,

        /// Video link
        #[arg(long)]
        link: Option<String>,

        /// Display name
        #[arg(long)]
        name: Option<String>,
    },

    /// List monitored videos
    Videos,

    /// Show moderation counts
    Stats {
        /// Restrict to one video
        #[arg(long)]
        video: Option<String>,
    },

    /// List comments by moderation status
    List {
        /// Status: unclassified, neutral, review or deleted
        #[arg(short, long, value_parser = parse_status)]
        status: ModerationStatus,

        /// Restrict to one video
        #[arg(long)]
        video: Option<String>,

        /// Maximum comments to list
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Check the moderation audit log hash chain
    VerifyAudit,
}

fn parse_status(s: &str) -> Result<ModerationStatus, String> {
    s.parse().map_err(|e: commentguard_core::Error| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_approve() {
        let cli = Cli::parse_from([
            "commentguard",
            "approve",
            "c1",
            "--category",
            "Insult",
            "--toxic-word",
            "idiot",
        ]);
        match cli.command {
            Commands::Approve {
                comment,
                category,
                language,
                toxic_word,
            } => {
                assert_eq!(comment, "c1");
                assert_eq!(category, "Insult");
                assert!(language.is_none());
                assert_eq!(toxic_word.as_deref(), Some("idiot"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_list_status() {
        let cli = Cli::parse_from(["commentguard", "list", "--status", "review", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::List {
                status: ModerationStatus::Review,
                ..
            }
        ));
        assert!(Cli::try_parse_from(["commentguard", "list", "--status", "spam"]).is_err());
    }
}
