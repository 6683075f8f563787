//! Change notification for cache partitions and progress records.
//!
//! Components register interest by subscribing; a subscription is dropped
//! to unsubscribe, so teardown cannot leak listeners. Built on a broadcast
//! channel: every live subscriber sees every event published after it
//! subscribed, and slow subscribers skip events they lagged past rather
//! than stalling publishers.

use tokio::sync::broadcast;

/// Fan-out publisher for one event type.
pub struct EventBus<T> {
  tx: broadcast::Sender<T>,
}

impl<T: Clone> EventBus<T> {
  pub fn new(capacity: usize) -> Self {
    let (tx, _rx) = broadcast::channel(capacity);
    Self { tx }
  }

  /// Publish to all current subscribers. A bus with no subscribers
  /// silently drops the event.
  pub fn publish(&self, event: T) {
    let _ = self.tx.send(event);
  }

  /// Register interest. Dropping the returned subscription unsubscribes.
  pub fn subscribe(&self) -> Subscription<T> {
    Subscription {
      rx: self.tx.subscribe(),
    }
  }

  #[cfg(test)]
  pub fn subscriber_count(&self) -> usize {
    self.tx.receiver_count()
  }
}

impl<T> Clone for EventBus<T> {
  fn clone(&self) -> Self {
    Self {
      tx: self.tx.clone(),
    }
  }
}

/// One registered listener.
pub struct Subscription<T> {
  rx: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
  /// Wait for the next event. Returns `None` once every publisher handle
  /// is gone. Events missed while lagging are skipped, not replayed.
  pub async fn next(&mut self) -> Option<T> {
    loop {
      match self.rx.recv().await {
        Ok(event) => return Some(event),
        Err(broadcast::error::RecvError::Lagged(_)) => continue,
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  }
}
