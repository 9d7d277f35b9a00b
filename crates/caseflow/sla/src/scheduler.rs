//! Scan scheduling: a fixed-interval loop, one active runner at a time
//!
//! Every redundant runner hosts a `ScanScheduler`, but the named job
//! lock lets only one of them execute a given tick. A tick that cannot
//! take the lock is skipped, not queued; a tick that overruns the
//! interval keeps its lease and the next tick skips.

use crate::{JobLock, ScanReport, SlaConfig, SlaScanner};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// What happened on one scheduler tick
#[derive(Debug)]
pub enum TickOutcome {
    /// This runner held the lock and ran the scan
    Completed(ScanReport),
    /// Another runner holds the lock; the tick was skipped
    Skipped,
}

/// Periodic driver for the SLA scanner
pub struct ScanScheduler {
    config: SlaConfig,
    scanner: Arc<SlaScanner>,
    lock: Arc<dyn JobLock>,
    /// Identifies this runner in the lock table
    holder: String,
    running: Arc<RwLock<bool>>,
    trigger_tx: mpsc::Sender<()>,
}

impl ScanScheduler {
    /// Create a new scheduler. The returned receiver must be passed to
    /// `start`.
    pub fn new(
        config: SlaConfig,
        scanner: Arc<SlaScanner>,
        lock: Arc<dyn JobLock>,
    ) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (trigger_tx, trigger_rx) = mpsc::channel(4);

        let scheduler = Arc::new(Self {
            config,
            scanner,
            lock,
            holder: uuid::Uuid::new_v4().to_string(),
            running: Arc::new(RwLock::new(false)),
            trigger_tx,
        });

        (scheduler, trigger_rx)
    }

    /// This runner's identity in the lock table
    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Request an immediate scan tick outside the fixed interval
    pub async fn trigger(&self) {
        let _ = self.trigger_tx.send(()).await;
    }

    /// Run the scheduling loop until `stop` is called
    pub async fn start(self: Arc<Self>, mut trigger_rx: mpsc::Receiver<()>) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        tracing::info!(
            job = %self.config.job_name,
            interval_secs = self.config.scan_interval_secs,
            "SLA scan scheduler started"
        );

        let mut ticks = interval(self.config.scan_interval());

        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    self.run_once().await;
                }
                Some(_) = trigger_rx.recv() => {
                    self.run_once().await;
                }
                else => break,
            }

            let running = self.running.read().await;
            if !*running {
                break;
            }
        }

        tracing::info!(job = %self.config.job_name, "SLA scan scheduler stopped");
    }

    /// Stop the scheduling loop after the current tick
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
    }

    /// Execute one tick: take the lock, scan, release.
    pub async fn run_once(&self) -> TickOutcome {
        if !self
            .lock
            .try_acquire(&self.config.job_name, &self.holder, self.config.lock_ttl())
            .await
        {
            tracing::debug!(
                job = %self.config.job_name,
                "Scan lock held by another runner, skipping tick"
            );
            return TickOutcome::Skipped;
        }

        let report = self.scanner.scan(Utc::now()).await;
        tracing::info!(
            job = %self.config.job_name,
            checked = report.tickets_checked,
            breaches = report.breaches.len(),
            errors = report.errors,
            "SLA scan tick complete"
        );

        self.lock.release(&self.config.job_name, &self.holder).await;
        TickOutcome::Completed(report)
    }
}
