//! CommentGuard command line
//!
//! Each invocation opens the local stores, runs one command, and exits.
//! Scheduling periodic fetches is left to cron or a systemd timer.

use anyhow::{bail, Result};
use clap::Parser;
use commentguard_core::Comment;
use commentguard_moderator::{
    describe_metrics, App, Cli, Commands, IngestReport, RetrainOutcome, Settings, SkipReason,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json_logs);
    describe_metrics();

    let settings = Settings::load(cli.config.as_deref())?;
    let app = App::open(settings)?;
    let moderator = &app.moderator;

    match cli.command {
        Commands::Fetch { video, limit } => {
            let (retrain, report) = moderator.ingest_video(video.as_deref(), limit).await?;
            if let Some(outcome) = retrain {
                print_retrain(&outcome);
            }
            print_ingest(&report);
        }

        Commands::FetchAll { limit } => {
            let report = moderator.ingest_all(limit).await?;
            if let Some(outcome) = &report.retrain {
                print_retrain(outcome);
            }
            for video in &report.videos {
                print_ingest(video);
            }
            for (video_id, error) in &report.failed_videos {
                println!("{}: failed: {}", video_id, error);
            }
        }

        Commands::Reclassify {
            video,
            apply_remote,
            force,
        } => {
            let report = moderator
                .reclassify_video(&video, apply_remote, force)
                .await?;
            println!(
                "{}: {} comments, {} changed, {} deleted skipped, {} removals retried, {} failed",
                report.video_id,
                report.total,
                report.changed,
                report.skipped_deleted,
                report.removal_retried,
                report.failed
            );
        }

        Commands::Delete { comment } => {
            let comment = moderator.delete_comment(&comment).await?;
            print_comment(&comment);
        }

        Commands::Approve {
            comment,
            category,
            language,
            toxic_word,
        } => {
            let comment = moderator.approve(
                &comment,
                &category,
                language.as_deref(),
                toxic_word.as_deref(),
            )?;
            print_comment(&comment);
        }

        Commands::Neutral { comment } => {
            let comment = moderator.move_to_neutral(&comment)?;
            print_comment(&comment);
        }

        Commands::Retrain { force } => {
            let Some(trigger) = moderator.retrain_trigger() else {
                bail!("retraining is not configured");
            };
            let pending = trigger.pending()?;
            info!(
                queue_len = pending.queue_len,
                high_water_mark = pending.high_water_mark,
                "Checking feedback queue"
            );
            print_retrain(&trigger.retrain(force)?);
        }

        Commands::AddVideo { id, link, name } => {
            let video = moderator.add_video(&id, link.as_deref(), name.as_deref())?;
            println!("{}  {}  {}", video.video_id, video.display_name(), video.link);
        }

        Commands::Videos => {
            for video in moderator.list_videos()? {
                println!(
                    "{}  {}  {}  {}",
                    video.video_id,
                    video.display_name(),
                    video.link,
                    video.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }

        Commands::Stats { video } => {
            println!("{}", moderator.stats(video.as_deref())?);
        }

        Commands::List {
            status,
            video,
            limit,
        } => {
            for comment in moderator.list_comments(status, video.as_deref(), limit)? {
                print_comment(&comment);
            }
        }

        Commands::VerifyAudit => {
            let verification = app.audit.verify()?;
            match verification.first_invalid {
                None => println!("audit log intact: {} events", verification.events),
                Some(line) => bail!(
                    "audit log broken at line {} of {} events",
                    line,
                    verification.events
                ),
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("commentguard=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("commentguard=info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_ingest(report: &IngestReport) {
    println!(
        "{}: fetched {}, new {}, skipped {}, neutral {}, review {}, deleted {}, failed {}{}",
        report.video_id,
        report.fetched,
        report.created,
        report.skipped,
        report.neutral,
        report.review,
        report.deleted,
        report.failed,
        if report.degraded { " (removal unavailable)" } else { "" }
    );
}

fn print_retrain(outcome: &RetrainOutcome) {
    match outcome {
        RetrainOutcome::Retrained {
            version,
            samples,
            metrics,
        } => println!(
            "retrained {} on {} samples: accuracy {:.3}, f1 {:.3}",
            version, samples, metrics.accuracy, metrics.f1
        ),
        RetrainOutcome::Skipped(SkipReason::MissingQueue) => println!("retrain skipped: no feedback queue"),
        RetrainOutcome::Skipped(SkipReason::EmptyQueue) => println!("retrain skipped: feedback queue is empty"),
        RetrainOutcome::Skipped(SkipReason::BelowThreshold { pending, threshold }) => {
            println!("retrain skipped: {} of {} new records", pending, threshold)
        }
    }
}

fn print_comment(comment: &Comment) {
    let score = comment
        .toxicity_score
        .map(|s| format!("{:.3}", s))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}  {}  {:<12}  {:>5}  {}: {}",
        comment.comment_id,
        comment.video_id,
        comment.moderation_status.as_str(),
        score,
        comment.author,
        comment.text.replace('\n', " ")
    );
}
