//! `ripple publish`

use crate::config::AppConfig;
use anyhow::{Context, Result};
use clap::Subcommand;
use ripple_core::{ContentKind, UpdateKind};
use ripple_bus::{Channel, Publisher};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Subcommand, Debug)]
pub enum PublishCommand {
    /// Content was created, changed or removed
    DataChange {
        /// Publisher identification
        #[arg(long, default_value = "")]
        sender: String,
        /// Content kind, e.g. photo, point-detail, generation-log
        #[arg(long, value_parser = parse_content_kind)]
        content_kind: ContentKind,
        /// new, update, delete or local-content
        #[arg(long, value_parser = parse_update_kind)]
        update_kind: UpdateKind,
        /// Affected content ids
        #[arg(long = "id", num_args = 1..)]
        ids: Vec<Uuid>,
    },
    /// A job definition changed
    JobChange {
        #[arg(long)]
        database_id: Uuid,
        #[arg(long)]
        job_id: Uuid,
        #[arg(long, value_parser = parse_update_kind)]
        update_kind: UpdateKind,
    },
    /// A job run changed
    RunChange {
        #[arg(long)]
        database_id: Uuid,
        #[arg(long)]
        job_id: Uuid,
        #[arg(long)]
        run_id: Uuid,
        #[arg(long, value_parser = parse_update_kind)]
        update_kind: UpdateKind,
    },
    /// Progress of a job run
    Progress {
        #[arg(long)]
        database_id: Uuid,
        #[arg(long)]
        job_id: Uuid,
        #[arg(long)]
        run_id: Uuid,
        #[arg(long, default_value = "")]
        sender: String,
        #[arg(long)]
        message: String,
    },
    /// Pipeline state transition of a job run
    StateChange {
        #[arg(long)]
        database_id: Uuid,
        #[arg(long)]
        job_id: Uuid,
        #[arg(long)]
        run_id: Uuid,
        #[arg(long, default_value = "")]
        sender: String,
        #[arg(long, default_value = "")]
        message: String,
        #[arg(long)]
        pipeline_state: String,
    },
    /// Error report
    Error {
        #[arg(long)]
        message: String,
    },
}

pub async fn run(config: &AppConfig, command: PublishCommand) -> Result<()> {
    let publisher = Publisher::new(Channel::new(&config.channel));

    let sent = match command {
        PublishCommand::DataChange {
            sender,
            content_kind,
            update_kind,
            ids,
        } => publisher
            .publish_data_change(&sender, content_kind, update_kind, ids)
            .context("Notification rejected")?,
        PublishCommand::JobChange {
            database_id,
            job_id,
            update_kind,
        } => publisher.publish_job_change(database_id, job_id, update_kind),
        PublishCommand::RunChange {
            database_id,
            job_id,
            run_id,
            update_kind,
        } => publisher.publish_run_change(database_id, job_id, run_id, update_kind),
        PublishCommand::Progress {
            database_id,
            job_id,
            run_id,
            sender,
            message,
        } => publisher.publish_progress(database_id, job_id, run_id, &sender, &message),
        PublishCommand::StateChange {
            database_id,
            job_id,
            run_id,
            sender,
            message,
            pipeline_state,
        } => publisher.publish_state_change(
            database_id,
            job_id,
            run_id,
            &sender,
            &message,
            &pipeline_state,
        ),
        PublishCommand::Error { message } => publisher.publish_error(&message),
    };

    // The process exits right after, so wait for the queue to hand it over
    publisher.flush().await;

    if sent {
        info!(channel = %publisher.channel().name(), "Notification published");
    } else {
        warn!(channel = %publisher.channel().name(), "Notifications are suppressed, nothing sent");
    }
    Ok(())
}

fn parse_content_kind(s: &str) -> Result<ContentKind, String> {
    match ContentKind::from_producer_tag(s) {
        ContentKind::Unknown => {
            let known: Vec<String> = ContentKind::ALL
                .iter()
                .filter(|k| **k != ContentKind::Unknown)
                .map(|k| k.to_string())
                .collect();
            Err(format!("unknown content kind '{s}', expected one of: {}", known.join(", ")))
        }
        kind => Ok(kind),
    }
}

fn parse_update_kind(s: &str) -> Result<UpdateKind, String> {
    let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
    UpdateKind::ALL
        .into_iter()
        .find(|k| k.to_string() == wanted)
        .ok_or_else(|| format!("unknown update kind '{s}', expected new, update, delete or local-content"))
}
