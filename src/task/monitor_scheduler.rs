//! Recurring availability check over every subscriber.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use chrono::Utc;
use cron::Schedule;
use futures::FutureExt;
use log::debug;
use log::error;
use log::info;
use log::warn;
use tokio::sync::Notify;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::entity::Subscriber;
use crate::entity::SubscriberPatch;
use crate::notifier::NotificationDispatcher;
use crate::repository::SubscriberStore;
use crate::repository::error::StoreError;
use crate::service::AvailabilityProbe;
use crate::service::AvailabilityResult;
use crate::service::notification_state::Transition;
use crate::service::notification_state::next_transition;
use crate::task::schedule::next_delay;
use crate::task::schedule::parse_schedule;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MonitorError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid check schedule `{expr}`: {reason}")]
    InvalidSchedule { expr: String, reason: String },

    #[error("Scheduler is already started.")]
    AlreadyStarted,
}

/// Result of asking for a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    Completed(RunReport),
    /// Another run was in progress; nothing was done.
    AlreadyRunning,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub checked: usize,
    pub available: usize,
    pub notified: usize,
    pub reset: usize,
    pub failed: usize,
    /// The run stopped early because of shutdown.
    pub interrupted: bool,
}

/// Clears the running flag and wakes [`MonitorScheduler::stop`] when a run ends, however
/// it ends.
struct RunGuard<'a> {
    running: &'a AtomicBool,
    finished: &'a Notify,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.finished.notify_waiters();
    }
}

/// Resolves once shutdown has been requested.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Drives checks one run at a time.
///
/// The delayed first run, the cron timer and manual triggers all enter through
/// [`MonitorScheduler::run_once`], which lets at most one run proceed.
pub struct MonitorScheduler {
    store: Arc<dyn SubscriberStore>,
    probe: Arc<AvailabilityProbe>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    per_subscriber_delay: Duration,
    running: AtomicBool,
    run_finished: Notify,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MonitorScheduler {
    pub fn new(
        store: Arc<dyn SubscriberStore>,
        probe: Arc<AvailabilityProbe>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        per_subscriber_delay: Duration,
    ) -> Arc<Self> {
        info!("Initializing MonitorScheduler with per-subscriber delay {per_subscriber_delay:?}");
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            store,
            probe,
            dispatcher,
            per_subscriber_delay,
            running: AtomicBool::new(false),
            run_finished: Notify::new(),
            shutdown,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Starts the recurring timer and the delayed first run.
    pub fn start(
        self: &Arc<Self>,
        schedule_expr: &str,
        initial_delay: Duration,
    ) -> Result<(), MonitorError> {
        let schedule =
            parse_schedule(schedule_expr).map_err(|e| MonitorError::InvalidSchedule {
                expr: schedule_expr.to_string(),
                reason: e.to_string(),
            })?;

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if !tasks.is_empty() {
            return Err(MonitorError::AlreadyStarted);
        }
        info!("Starting scheduler: `{schedule_expr}`, first run in {initial_delay:?}.");
        tasks.push(tokio::spawn(self.clone().initial_run(initial_delay)));
        tasks.push(tokio::spawn(self.clone().schedule_loop(schedule)));
        Ok(())
    }

    /// Cancels the timers and waits for an in-flight run to finish its current subscriber.
    pub async fn stop(&self) {
        info!("Stopping scheduler.");
        self.shutdown.send_replace(true);
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                error!("Scheduler task ended abnormally: {e}");
            }
        }
        // Manual runs are not tracked as tasks.
        loop {
            let finished = self.run_finished.notified();
            if !self.is_running() {
                break;
            }
            debug!("Waiting for the in-flight check to finish.");
            finished.await;
        }
        info!("Scheduler stopped.");
    }

    async fn initial_run(self: Arc<Self>, delay: Duration) {
        let mut shutdown = self.shutdown.subscribe();
        tokio::select! {
            _ = sleep(delay) => {}
            _ = cancelled(&mut shutdown) => return,
        }
        self.run_logged("initial").await;
    }

    async fn schedule_loop(self: Arc<Self>, schedule: Schedule) {
        let mut shutdown = self.shutdown.subscribe();
        loop {
            let Some(delay) = next_delay(&schedule, Utc::now()) else {
                warn!("Check schedule has no upcoming fire time. Stopping timer.");
                break;
            };
            debug!("Next scheduled check in {delay:?}.");
            tokio::select! {
                _ = sleep(delay) => {}
                _ = cancelled(&mut shutdown) => break,
            }
            self.run_logged("scheduled").await;
        }
    }

    async fn run_logged(&self, trigger: &str) {
        match self.run_once().await {
            CheckOutcome::Completed(report) => debug!("{trigger} check finished: {report:?}"),
            CheckOutcome::AlreadyRunning => {
                info!("Previous check still running, skipping {trigger} check.")
            }
        }
    }

    /// Administrative entry point. Never queues behind a running check.
    pub async fn trigger_manual_check(&self) -> CheckOutcome {
        info!("Manual check requested.");
        self.run_once().await
    }

    /// Runs one pass over all subscribers unless a pass is already in progress.
    pub async fn run_once(&self) -> CheckOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return CheckOutcome::AlreadyRunning;
        }
        let _guard = RunGuard {
            running: &self.running,
            finished: &self.run_finished,
        };
        CheckOutcome::Completed(self.check_all().await)
    }

    async fn check_all(&self) -> RunReport {
        let mut report = RunReport::default();
        let subscribers = match self.store.list().await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                error!("Failed to load subscribers: {e}");
                return report;
            }
        };
        if subscribers.is_empty() {
            info!("No subscribers to check.");
            return report;
        }

        let start = Instant::now();
        info!("Checking {} subscriber(s) for exam availability...", subscribers.len());

        for subscriber in &subscribers {
            if self.is_shutting_down() {
                info!("Shutdown requested, stopping check early.");
                report.interrupted = true;
                break;
            }

            let id = subscriber.id.as_str();
            match AssertUnwindSafe(self.check_subscriber(subscriber))
                .catch_unwind()
                .await
            {
                Ok(Ok((result, transition))) => {
                    report.checked += 1;
                    if result.is_available() {
                        report.available += 1;
                    }
                    match transition {
                        Transition::Notify { .. } => report.notified += 1,
                        Transition::Reset => report.reset += 1,
                        Transition::AlreadyNotified | Transition::Unchanged => {}
                    }
                }
                Ok(Err(e)) => {
                    report.failed += 1;
                    error!("Error checking subscriber `{id}`: {e}");
                }
                Err(_) => {
                    report.failed += 1;
                    error!("Check for subscriber `{id}` panicked.");
                }
            }

            self.pause_between_subscribers().await;
        }

        info!(
            "Check complete in {:.2}s: {} checked, {} notified, {} reset, {} failed.",
            start.elapsed().as_secs_f64(),
            report.checked,
            report.notified,
            report.reset,
            report.failed
        );
        report
    }

    async fn pause_between_subscribers(&self) {
        if self.per_subscriber_delay.is_zero() {
            return;
        }
        let mut shutdown = self.shutdown.subscribe();
        tokio::select! {
            _ = sleep(self.per_subscriber_delay) => {}
            _ = cancelled(&mut shutdown) => {}
        }
    }

    /// Probes one subscriber and advances its notification state.
    async fn check_subscriber(
        &self,
        subscriber: &Subscriber,
    ) -> Result<(AvailabilityResult, Transition), MonitorError> {
        let id = subscriber.id.as_str();
        let result = self.probe.probe(subscriber).await;
        debug!("Subscriber `{id}`: {result}");

        // Never move the timestamp backwards if the clock did.
        let now = Utc::now();
        let checked_at = subscriber.last_checked_at.map_or(now, |prev| prev.max(now));
        if !self
            .store
            .update(id, &SubscriberPatch::checked_at(checked_at))
            .await?
        {
            debug!("Subscriber `{id}` was removed during the check, skipping.");
            return Ok((result, Transition::Unchanged));
        }

        let transition = next_transition(subscriber, &result);
        match (&transition, &result) {
            (Transition::Notify { occurrence }, AvailabilityResult::Available(slot)) => {
                info!("Exam found for subscriber `{id}` on {occurrence}. Sending notification...");
                let outcomes = self
                    .dispatcher
                    .deliver(&subscriber.contact_methods(), slot)
                    .await;
                let delivered = outcomes.iter().filter(|o| o.success).count();
                if delivered == 0 {
                    warn!("No channel delivered the notification for subscriber `{id}`.");
                } else {
                    info!(
                        "Notification sent to subscriber `{id}` on {delivered}/{} channel(s).",
                        outcomes.len()
                    );
                }
            }
            (Transition::AlreadyNotified, _) => {
                debug!("Already notified subscriber `{id}`, skipping.")
            }
            (Transition::Reset, _) => {
                info!("Notified slot for subscriber `{id}` disappeared. Resetting.")
            }
            _ => {}
        }

        if let Some(patch) = transition.patch() {
            self.store.update(id, &patch).await?;
        }
        Ok((result, transition))
    }
}
