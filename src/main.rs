//! Application entry point for exam-watch.
//!
//! Wires the store, upstream client, probe and notifiers together and runs the scheduler
//! until interrupted.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use anyhow::Result;
use dotenv::dotenv;
use exam_watch::config::Config;
use exam_watch::logging::setup_logging;
use exam_watch::notifier::ChannelDispatcher;
use exam_watch::repository::JsonFileStore;
use exam_watch::repository::PostgresStore;
use exam_watch::repository::SubscriberStore;
use exam_watch::service::AvailabilityProbe;
use exam_watch::task::monitor_scheduler::CheckOutcome;
use exam_watch::task::monitor_scheduler::MonitorScheduler;
use exam_watch::upstream::exam_api::HttpExamApi;
use exam_watch::upstream::throttled_client::ThrottledClient;
use log::debug;
use log::info;
use log::warn;
use tracing_appender::non_blocking::WorkerGuard;

const SHUTDOWN_SLACK: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let init_start = Instant::now();
    let (config, _log_guard) = load_config().await?;

    let store = setup_store(&config, init_start).await?;
    let probe = setup_probe(&config)?;
    let dispatcher = Arc::new(ChannelDispatcher::from_config(&config)?);

    let scheduler = MonitorScheduler::new(store, probe, dispatcher, config.per_subscriber_delay);
    scheduler.start(&config.check_schedule, config.initial_delay)?;

    // Long enough for the in-flight subscriber to get its throttle slot and finish its call.
    let grace = config.min_interval + config.upstream_timeout + SHUTDOWN_SLACK;
    run(scheduler, grace, init_start).await
}

async fn load_config() -> Result<(Arc<Config>, WorkerGuard)> {
    debug!("Loading configuration...");
    let mut config = Config::new();
    config.load()?;
    let config = Arc::new(config);
    let log_guard = setup_logging(&config)?;
    info!("Starting exam-watch...");
    info!(
        "Checking every {} minute(s) (`{}`), {:?} between upstream calls.",
        config.check_interval_minutes, config.check_schedule, config.min_interval
    );
    Ok((config, log_guard))
}

async fn setup_store(config: &Config, init_start: Instant) -> Result<Arc<dyn SubscriberStore>> {
    debug!("Setting up subscriber store...");
    if let Some(url) = &config.database_url {
        let store = PostgresStore::connect(url, config.database_pool_size).await?;
        info!(
            "PostgreSQL subscriber store ready ({:.2}s).",
            init_start.elapsed().as_secs_f64()
        );
        return Ok(Arc::new(store));
    }
    let store = JsonFileStore::open(config.store_path.clone()).await?;
    info!(
        "Subscriber store at '{}' ready ({:.2}s).",
        store.path().to_string_lossy(),
        init_start.elapsed().as_secs_f64()
    );
    Ok(Arc::new(store))
}

fn setup_probe(config: &Config) -> Result<Arc<AvailabilityProbe>> {
    debug!("Setting up upstream client...");
    let client = Arc::new(ThrottledClient::new(
        &config.upstream_base_url,
        config.min_interval,
        config.upstream_timeout,
    )?);
    let api = Arc::new(HttpExamApi::new(client));
    Ok(Arc::new(AvailabilityProbe::new(api, config.label_cache_ttl)))
}

async fn run(
    scheduler: Arc<MonitorScheduler>,
    grace: Duration,
    init_start: Instant,
) -> Result<()> {
    info!(
        "exam-watch is up in {:.2}s. Press Ctrl+C to stop.",
        init_start.elapsed().as_secs_f64()
    );

    wait_for_shutdown(&scheduler).await?;
    info!("Ctrl+C received, shutting down.");

    if tokio::time::timeout(grace, scheduler.stop())
        .await
        .is_err()
    {
        warn!("Scheduler did not stop within {grace:?}. Exiting anyway.");
    }
    Ok(())
}

/// Waits for Ctrl+C, serving manual check requests (SIGUSR1) meanwhile.
#[cfg(unix)]
async fn wait_for_shutdown(scheduler: &Arc<MonitorScheduler>) -> Result<()> {
    use tokio::signal::unix::SignalKind;
    use tokio::signal::unix::signal;

    let mut manual = signal(SignalKind::user_defined1())?;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => return Ok(result?),
            _ = manual.recv() => {
                let scheduler = scheduler.clone();
                tokio::spawn(async move {
                    match scheduler.trigger_manual_check().await {
                        CheckOutcome::Completed(report) => {
                            info!("Manual check finished: {} notified.", report.notified)
                        }
                        CheckOutcome::AlreadyRunning => {
                            info!("Check already in progress, manual request ignored.")
                        }
                    }
                });
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_scheduler: &Arc<MonitorScheduler>) -> Result<()> {
    Ok(tokio::signal::ctrl_c().await?)
}
