//! Post-commit notifications.
//!
//! The chain manager publishes an event after every committed block and
//! every newly registered mint. Subscribers (gossip rebroadcast, webhook
//! delivery, tests) attach with their own receivers and their own lag/retry
//! policy; a slow subscriber never blocks the chain.

use tokio::sync::broadcast;

/// Events published after a block commits.
#[derive(Debug, Clone)]
pub enum ChainEvent {
    /// A block was validated, persisted, and applied.
    BlockCommitted { height: u64, hash: String },
    /// A mint transaction registered a new token.
    MintCreated {
        token: String,
        mining_reward: u64,
        airdrop: u64,
    },
}

/// Broadcast bus for [`ChainEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Attach a new subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChainEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(ChainEvent::BlockCommitted {
            height: 3,
            hash: "abc".into(),
        });

        match rx.recv().await.unwrap() {
            ChainEvent::BlockCommitted { height, hash } => {
                assert_eq!(height, 3);
                assert_eq!(hash, "abc");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let bus = EventBus::default();
        bus.publish(ChainEvent::MintCreated {
            token: "FOO".into(),
            mining_reward: 5,
            airdrop: 100,
        });
    }
}
