use tokio::sync::broadcast;

use crate::ports::{EngineEvent, Notifier};

pub const DEFAULT_CAPACITY: usize = 256;

/// In-process event channel. Slow subscribers lag and miss events rather
/// than holding up the engine.
#[derive(Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<EngineEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, event: EngineEvent) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deactivated(reason: &str) -> EngineEvent {
        EngineEvent::StrategyDeactivated {
            strategy_id: "s1".into(),
            strategy_name: "grid".into(),
            reason: reason.into(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let notifier = BroadcastNotifier::default();
        let mut rx = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 1);

        notifier.notify(deactivated("run cap of 3 reached"));

        assert_eq!(rx.recv().await.unwrap(), deactivated("run cap of 3 reached"));
    }

    #[test]
    fn test_notify_without_subscribers() {
        let notifier = BroadcastNotifier::new(4);
        notifier.notify(deactivated("target order completed"));
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_ahead() {
        let notifier = BroadcastNotifier::new(2);
        let mut rx = notifier.subscribe();
        for i in 0..4 {
            notifier.notify(deactivated(&i.to_string()));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert_eq!(rx.recv().await.unwrap(), deactivated("2"));
    }
}
