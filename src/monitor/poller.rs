//! Availability poller.
//!
//! Once per interval, fetches every registered permit/division, reconciles
//! it against the availability store, and announces what changed. A failure
//! on one target is logged and leaves that target's stored state alone, so
//! its new dates are retried on the next cycle.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::common::error::{FetchError, StoreError};
use crate::common::types::{AvailableDates, PollTarget};
use crate::monitor::notifier::{Notification, Notifier};
use crate::monitor::store::DiffResult;
use crate::monitor::{SharedRegistry, SharedStore};
use crate::recreation::AvailabilitySource;
use crate::telegram::Messenger;

/// Why a single target could not be polled.
#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to one target in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOutcome {
    /// First observation; a summary was sent.
    Summarized,
    /// New dates were announced.
    Announced(usize),
    /// Nothing new.
    Unchanged,
    /// The target was unregistered while the cycle ran.
    Skipped,
}

/// Totals for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub targets: usize,
    pub failed: usize,
    pub notifications: usize,
}

pub struct AvailabilityPoller<S, M> {
    source: Arc<S>,
    registry: SharedRegistry,
    store: SharedStore,
    notifier: Arc<Notifier<M>>,
    interval: Duration,
}

impl<S: AvailabilitySource, M: Messenger> AvailabilityPoller<S, M> {
    pub fn new(
        source: Arc<S>,
        registry: SharedRegistry,
        store: SharedStore,
        notifier: Arc<Notifier<M>>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            registry,
            store,
            notifier,
            interval,
        }
    }

    /// Poll forever. The first cycle runs immediately.
    pub async fn run(self) {
        info!("Availability poller running every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let report = self.run_cycle().await;
            info!(
                "Check complete: {} target(s), {} failed, {} notification(s). Next check in {}s",
                report.targets,
                report.failed,
                report.notifications,
                self.interval.as_secs()
            );
        }
    }

    /// Poll every registered target once.
    pub async fn run_cycle(&self) -> CycleReport {
        let targets: Vec<PollTarget> = {
            let registry = self.registry.read().await;
            registry.list().iter().flat_map(|permit| permit.targets()).collect()
        };
        info!("Checking availability for {} target(s)...", targets.len());

        let mut report = CycleReport {
            targets: targets.len(),
            ..CycleReport::default()
        };

        for target in &targets {
            match self.poll_target(target).await {
                Ok(TargetOutcome::Summarized) | Ok(TargetOutcome::Announced(_)) => {
                    report.notifications += 1;
                }
                Ok(TargetOutcome::Unchanged) | Ok(TargetOutcome::Skipped) => {}
                Err(e) => {
                    report.failed += 1;
                    error!("Error checking {}: {}", target.label(), e);
                }
            }
        }

        report
    }

    /// Fetch, reconcile and announce a single target.
    pub async fn poll_target(&self, target: &PollTarget) -> Result<TargetOutcome, PollError> {
        let payload = self
            .source
            .fetch(&target.permit_id, target.division_id())
            .await?;
        let fresh = payload.available_dates()?;
        debug!("{}: {} available date(s)", target.label(), fresh.len());

        let Some(diff) = self.reconcile(target, fresh).await? else {
            debug!("{} was removed during the cycle; skipping", target.label());
            return Ok(TargetOutcome::Skipped);
        };

        if !diff.removed_dates.is_empty() {
            info!(
                "{} date(s) no longer available for {}",
                diff.removed_dates.len(),
                target.label()
            );
        }

        if diff.is_first_observation {
            info!(
                "First observation of {}: {} date(s) available",
                target.label(),
                diff.total_available
            );
            self.announce(Notification::Summary {
                target: target.clone(),
                available: diff.total_available,
            })
            .await;
            return Ok(TargetOutcome::Summarized);
        }

        if diff.new_dates.is_empty() {
            return Ok(TargetOutcome::Unchanged);
        }

        let count = diff.new_dates.len();
        info!("Found {} new date(s) for {}", count, target.label());
        self.announce(Notification::NewDates {
            target: target.clone(),
            dates: diff.new_dates,
        })
        .await;
        Ok(TargetOutcome::Announced(count))
    }

    /// Reconcile under both locks, or return `None` if the target is no
    /// longer registered.
    async fn reconcile(
        &self,
        target: &PollTarget,
        fresh: AvailableDates,
    ) -> Result<Option<DiffResult>, StoreError> {
        let registry = self.registry.read().await;
        if !registry.contains_target(target) {
            return Ok(None);
        }
        let mut store = self.store.lock().await;
        store
            .reconcile(&target.permit_id, target.store_key(), fresh)
            .await
            .map(Some)
    }

    async fn announce(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(&notification).await {
            warn!("Notification lost: {}", e);
        }
    }
}
