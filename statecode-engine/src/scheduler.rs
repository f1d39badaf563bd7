//! Pending delayed sends.
//!
//! Delayed sends are the only asynchronous element of execution. The
//! registry here is passive: the embedding drains due messages from its
//! own timer or tick, which keeps the engine runtime-agnostic. Each entry
//! is cancellable by send id until it is drained, and drained at most
//! once.

use crate::message::SendMessage;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// A scheduled message and its due time.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub message: SendMessage,
    pub due: Instant,
}

/// Registry of pending delayed sends, keyed by send id.
///
/// Safe to share between the executing thread and a timer thread.
#[derive(Debug, Default)]
pub struct DelayedSends {
    pending: DashMap<String, PendingSend>,
}

impl DelayedSends {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `message` for delivery after `delay`, returning the key
    /// it is cancellable under. Messages without a send id get a
    /// generated one.
    pub fn schedule(&self, message: SendMessage, delay: Duration) -> String {
        let key = match &message.send_id {
            Some(id) => id.clone(),
            None => uuid::Uuid::new_v4().to_string(),
        };
        let due = Instant::now() + delay;
        self.pending.insert(key.clone(), PendingSend { message, due });
        key
    }

    /// Cancels the pending send with `send_id`. Returns whether anything
    /// was pending; canceling an unknown or already-drained id is a no-op.
    pub fn cancel(&self, send_id: &str) -> bool {
        self.pending.remove(send_id).is_some()
    }

    /// Removes and returns every message due at `now`, ordered by due
    /// time. Each message is returned at most once.
    pub fn take_due(&self, now: Instant) -> Vec<SendMessage> {
        let due_keys: Vec<String> = self
            .pending
            .iter()
            .filter(|entry| entry.due <= now)
            .map(|entry| entry.key().clone())
            .collect();

        let mut due: Vec<PendingSend> = due_keys
            .into_iter()
            .filter_map(|key| self.pending.remove(&key).map(|(_, p)| p))
            .collect();
        due.sort_by_key(|p| p.due);
        due.into_iter().map(|p| p.message).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, send_id: &str) -> bool {
        self.pending.contains_key(send_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(event: &str, send_id: Option<&str>) -> SendMessage {
        let mut m = SendMessage::new(event);
        m.send_id = send_id.map(|s| s.to_string());
        m
    }

    #[test]
    fn test_schedule_and_cancel() {
        let sends = DelayedSends::new();
        let key = sends.schedule(message("ping", Some("s1")), Duration::from_secs(60));

        assert_eq!(key, "s1");
        assert!(sends.contains("s1"));
        assert!(sends.cancel("s1"));
        assert!(!sends.contains("s1"));
    }

    #[test]
    fn test_cancel_unknown_is_noop() {
        let sends = DelayedSends::new();
        assert!(!sends.cancel("never-scheduled"));
    }

    #[test]
    fn test_generated_key_for_anonymous_send() {
        let sends = DelayedSends::new();
        let key = sends.schedule(message("ping", None), Duration::from_secs(60));

        assert!(!key.is_empty());
        assert!(sends.contains(&key));
    }

    #[test]
    fn test_take_due_is_at_most_once() {
        let sends = DelayedSends::new();
        sends.schedule(message("a", Some("s1")), Duration::ZERO);
        sends.schedule(message("b", Some("s2")), Duration::from_secs(600));

        let now = Instant::now();
        let due = sends.take_due(now);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].event, "a");

        assert!(sends.take_due(now).is_empty());
        assert_eq!(sends.len(), 1);
    }

    #[test]
    fn test_take_due_orders_by_due_time() {
        let sends = DelayedSends::new();
        sends.schedule(message("later", Some("s2")), Duration::from_millis(2));
        sends.schedule(message("sooner", Some("s1")), Duration::from_millis(1));

        let due = sends.take_due(Instant::now() + Duration::from_secs(1));
        let events: Vec<_> = due.iter().map(|m| m.event.as_str()).collect();
        assert_eq!(events, vec!["sooner", "later"]);
    }
}
