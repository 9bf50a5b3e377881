//! Periodic task runner shared by the strategy scheduler and the order
//! fulfilment loop.
//!
//! Each `Ticker` drives one job on its own tokio task. Ticks of the same job
//! never overlap: the loop awaits each tick before taking the next one, and
//! missed ticks are skipped rather than bunched up. Stopping only prevents
//! future ticks; a tick already running finishes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Job run on every tick
#[async_trait]
pub trait Periodic: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run_tick(&self);
}

/// Single-flight guard. Held for the duration of one tick.
#[derive(Debug, Default)]
pub struct TickGuard {
    in_progress: AtomicBool,
}

pub struct TickPermit<'a> {
    guard: &'a TickGuard,
}

impl TickGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another tick holds the guard
    pub fn try_enter(&self) -> Option<TickPermit<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TickPermit { guard: self })
    }

    pub fn is_busy(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }
}

impl Drop for TickPermit<'_> {
    fn drop(&mut self) {
        self.guard.in_progress.store(false, Ordering::Release);
    }
}

struct Running {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct Ticker {
    period: Duration,
    running: Mutex<Option<Running>>,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            running: Mutex::new(None),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Start ticking `job`. Returns false, with a warning, when already running.
    pub async fn start(&self, job: Arc<dyn Periodic>) -> bool {
        let mut running = self.running.lock().await;
        if running.is_some() {
            tracing::warn!("{} already running, ignoring start", job.name());
            return false;
        }

        let (stop, mut stop_rx) = watch::channel(false);
        let period = self.period;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!("{} started (every {:?})", job.name(), period);

            loop {
                tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        job.run_tick().await;
                    }
                }
            }

            tracing::info!("{} stopped", job.name());
        });

        *running = Some(Running { stop, handle });
        true
    }

    /// Stop future ticks and wait for a tick in progress to finish. Safe to
    /// call when not running.
    pub async fn stop(&self) {
        let Some(Running { stop, handle }) = self.running.lock().await.take() else {
            return;
        };
        let _ = stop.send(true);
        if let Err(e) = handle.await {
            tracing::error!("Ticker task ended abnormally: {}", e);
        }
    }
}
