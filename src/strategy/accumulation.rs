//! Accumulation (DCA) Strategy
//!
//! Buys a fixed ADA amount at a fixed interval until an optional run cap.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{positive, resolve, Effect, InFlight, OrderSlot, Tick};
use crate::domain::OrderIntent;

/// Longest accepted interval: one year
pub const MAX_INTERVAL_MINUTES: u64 = 365 * 24 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulationStrategy {
    /// ADA spent per run
    pub amount_per_run: f64,
    pub interval_minutes: u64,
    /// Stop after this many runs; unbounded when absent
    #[serde(default)]
    pub max_runs: Option<u32>,
    #[serde(default)]
    pub runs_executed: u32,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub order_id: Option<String>,
}

impl AccumulationStrategy {
    pub fn new(amount_per_run: f64, interval_minutes: u64, max_runs: Option<u32>) -> Self {
        Self {
            amount_per_run,
            interval_minutes,
            max_runs,
            runs_executed: 0,
            last_run_at: None,
            order_id: None,
        }
    }

    pub fn validate(&self) -> bool {
        positive(self.amount_per_run)
            && (1..=MAX_INTERVAL_MINUTES).contains(&self.interval_minutes)
            && self.max_runs != Some(0)
    }

    fn cap(&self, execute_once: bool) -> Option<u32> {
        match (self.max_runs, execute_once) {
            (Some(max), _) => Some(max),
            (None, true) => Some(1),
            (None, false) => None,
        }
    }

    /// When the next run becomes due. An interval past the calendar's end
    /// is never due.
    pub fn next_run_at(&self) -> Option<DateTime<Utc>> {
        self.last_run_at.map(|last| {
            i64::try_from(self.interval_minutes)
                .ok()
                .and_then(Duration::try_minutes)
                .and_then(|interval| last.checked_add_signed(interval))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        })
    }

    pub(crate) fn evaluate(&mut self, tick: &Tick, execute_once: bool) -> Vec<Effect> {
        if let Some(order_id) = self.order_id.clone() {
            if matches!(resolve(tick, &order_id), InFlight::Waiting) {
                return Vec::new();
            }
            self.order_id = None;
        }

        if let Some(cap) = self.cap(execute_once) {
            if self.runs_executed >= cap {
                return vec![Effect::Deactivate {
                    reason: format!("run cap of {} reached", cap),
                }];
            }
        }

        if let Some(due) = self.next_run_at() {
            if tick.now < due {
                return Vec::new();
            }
        }

        vec![Effect::PlaceOrder {
            slot: OrderSlot::Primary,
            intent: OrderIntent::market_buy(self.amount_per_run),
        }]
    }

    pub(crate) fn on_order_placed(&mut self, order_id: &str, now: DateTime<Utc>) {
        self.order_id = Some(order_id.to_string());
        self.runs_executed += 1;
        self.last_run_at = Some(now);
    }
}
