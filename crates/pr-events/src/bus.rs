use crate::types::EventRecord;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// In-process publish/subscribe keyed by review id.
///
/// Each review gets its own broadcast channel, so subscribers of one review
/// never observe another review's traffic and a slow or dropped receiver
/// cannot stall its peers. Dropping the returned receiver unsubscribes;
/// topics with no live receivers are pruned lazily on publish.
#[derive(Clone, Default)]
pub struct ReviewBus {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<EventRecord>>>>,
}

impl ReviewBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, review_id: &str) -> broadcast::Receiver<EventRecord> {
        let mut topics = self.lock_topics();
        topics
            .entry(review_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Dispatch to every current subscriber of the record's review.
    /// Returns the number of receivers the event reached.
    pub fn publish(&self, record: EventRecord) -> usize {
        let mut topics = self.lock_topics();
        let Some(sender) = topics.get(&record.review_id) else {
            return 0;
        };
        match sender.send(record.clone()) {
            Ok(count) => count,
            Err(_) => {
                topics.remove(&record.review_id);
                0
            }
        }
    }

    pub fn subscriber_count(&self, review_id: &str) -> usize {
        self.lock_topics()
            .get(review_id)
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }

    fn lock_topics(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, broadcast::Sender<EventRecord>>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn record(review_id: &str, event: &str) -> EventRecord {
        EventRecord {
            review_id: review_id.to_string(),
            event: event.to_string(),
            at: Utc::now(),
            data: json!({}),
        }
    }

    #[tokio::test]
    async fn delivers_in_publication_order() {
        let bus = ReviewBus::new();
        let mut rx = bus.subscribe("rev_a");

        assert_eq!(bus.publish(record("rev_a", "first")), 1);
        assert_eq!(bus.publish(record("rev_a", "second")), 1);

        assert_eq!(rx.recv().await.unwrap().event, "first");
        assert_eq!(rx.recv().await.unwrap().event, "second");
    }

    #[tokio::test]
    async fn topics_are_isolated_per_review() {
        let bus = ReviewBus::new();
        let mut rx_a = bus.subscribe("rev_a");
        let mut rx_b = bus.subscribe("rev_b");

        bus.publish(record("rev_b", "only_b"));

        assert_eq!(rx_b.recv().await.unwrap().event, "only_b");
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn publish_without_subscribers_reaches_nobody() {
        let bus = ReviewBus::new();
        assert_eq!(bus.publish(record("rev_a", "lost")), 0);
    }

    #[test]
    fn dropped_receivers_are_pruned_on_publish() {
        let bus = ReviewBus::new();
        let rx = bus.subscribe("rev_a");
        drop(rx);

        assert_eq!(bus.publish(record("rev_a", "after_drop")), 0);
        assert_eq!(bus.subscriber_count("rev_a"), 0);
    }
}
