//! Notification Adapters
//!
//! - `BroadcastNotifier`: in-process channel for the dashboard socket layer
//! - `WebhookNotifier`: JSON POST per event to an alert endpoint
//! - `FanoutNotifier`: forwards each event to several sinks

mod broadcast;
mod webhook;

pub use broadcast::BroadcastNotifier;
pub use webhook::WebhookNotifier;

use std::sync::Arc;

use crate::ports::{EngineEvent, Notifier};

/// Forwards every event to each inner notifier in order
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn Notifier>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, event: EngineEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.notify(event.clone());
            }
            last.notify(event);
        }
    }
}
