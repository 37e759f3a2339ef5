//! # Assembly Availability Notifier
//!
//! Scheduled entry point. Takes no arguments: everything comes from
//! `config/notifier*.toml` and `ASSEMBLY_NOTIFIER__*` variables. Runs one batch
//! against the item database and queues the alert in the notification outbox.
//!
//! Exits non-zero only when the run could not start or the source was
//! unavailable; row and page failures are reported in the logs.

use anyhow::Context;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

use assembly_notifier::config::ConfigManager;
use assembly_notifier::database::{self, PgEntityStore, PgItemSource, PgNotificationOutbox};
use assembly_notifier::logging;
use assembly_notifier::orchestration::{AssemblyNotificationJob, NotificationStatus};

#[tokio::main]
async fn main() {
    logging::init_tracing();

    match run().await {
        Ok(()) => {}
        Err(err) => {
            error!(error = %format!("{err:#}"), "Assembly notifier run failed");
            process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let manager = ConfigManager::load().context("loading notifier configuration")?;
    let config = manager.config();
    info!(
        environment = manager.environment(),
        config_directory = %manager.config_directory().display(),
        config = %manager.debug_config(),
        "Assembly notifier starting"
    );

    let pool = database::connect(&config.database)
        .await
        .context("connecting to the item database")?;
    if !database::health_check(&pool).await? {
        anyhow::bail!("item database health check failed");
    }

    let source = Arc::new(PgItemSource::new(pool.clone()));
    let store = Arc::new(PgEntityStore::new(
        pool.clone(),
        [config.source.marker_field.clone()],
    ));
    let outbox = Arc::new(PgNotificationOutbox::new(pool.clone()));

    let job = AssemblyNotificationJob::new(config, source, store, outbox);
    let outcome = job.run().await.context("running availability batch")?;

    info!(
        run_id = %outcome.run_id,
        pages = outcome.stats.pages_total,
        rows_scanned = outcome.stats.rows_scanned,
        rows_mutated = outcome.stats.rows_mutated,
        failures = outcome.report.failures.len(),
        elapsed_ms = outcome.stats.elapsed.as_millis() as u64,
        "{outcome}"
    );
    if let NotificationStatus::Failed { reason } = &outcome.notification {
        error!(reason = %reason, "Alert was not queued; stamped items will not be re-reported");
    }

    pool.close().await;
    Ok(())
}
