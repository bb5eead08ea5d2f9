//! `ripple listen`

use crate::config::AppConfig;
use anyhow::{Context, Result};
use ripple_core::{Dispatcher, Notification};
use ripple_bus::{Channel, Subscriber};
use std::future::{ready, Ready};
use tracing::info;

pub async fn run(config: &AppConfig, json: bool) -> Result<()> {
    let channel = Channel::new(&config.channel);
    let dispatcher = Dispatcher::new()
        .on_data_change(printer(json))
        .on_job_change(printer(json))
        .on_run_change(printer(json))
        .on_progress(printer(json))
        .on_state_change(printer(json))
        .on_error(printer(json));

    let subscriber = Subscriber::spawn(&channel, dispatcher, config.queue.clone());
    info!(channel = %channel.name(), hub = %channel.hub_id(), "Listening, Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for Ctrl-C")?;

    subscriber.flush().await;
    let stats = subscriber.stats();
    info!(
        received = stats.enqueued,
        failed = stats.failed,
        "Stopped listening"
    );
    Ok(())
}

fn printer<N>(json: bool) -> impl Fn(N) -> Ready<Result<()>> + Send + Sync + 'static
where
    N: Into<Notification> + 'static,
{
    move |n| ready(print_notification(&n.into(), json))
}

fn print_notification(notification: &Notification, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(notification)?);
    } else {
        println!("{}", describe(notification));
    }
    Ok(())
}

/// One-line human readable form.
pub fn describe(notification: &Notification) -> String {
    match notification {
        Notification::DataChange(n) => {
            let ids: Vec<String> = n.content_ids.iter().map(|id| id.to_string()).collect();
            format!(
                "[data_change] {} {} {} ({} ids) {}",
                n.sender,
                n.content_kind,
                n.update_kind,
                ids.len(),
                ids.join(",")
            )
        }
        Notification::JobChange(n) => {
            format!("[job_change] job={} db={} {}", n.job_id, n.database_id, n.update_kind)
        }
        Notification::RunChange(n) => format!(
            "[run_change] job={} run={} db={} {}",
            n.job_id, n.run_id, n.database_id, n.update_kind
        ),
        Notification::Progress(n) => format!(
            "[progress] job={} run={} {}: {}",
            n.job_id, n.run_id, n.sender, n.message
        ),
        Notification::StateChange(n) => format!(
            "[state_change] job={} run={} {} -> {}: {}",
            n.job_id, n.run_id, n.sender, n.pipeline_state, n.message
        ),
        Notification::Error(n) => format!("[error] {}", n.message),
    }
}
