//! Public crossing notifications and their delivery to subscribers.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::{ConnId, Direction, Metric};

/// A registered threshold was crossed.
///
/// Published after the crossed value has been retired from its set and the
/// engine has been re-armed, so subscribers always observe updated state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThresholdCrossed {
    /// The connection.
    pub conn: ConnId,
    /// Counter that crossed.
    pub metric: Metric,
    /// The threshold that was reached.
    pub threshold: u64,
    /// Direction of the counter.
    pub direction: Direction,
}

impl ThresholdCrossed {
    /// Notification name: `bytes_threshold_crossed` or
    /// `packets_threshold_crossed`.
    pub fn name(&self) -> &'static str {
        match self.metric {
            Metric::Bytes => "bytes_threshold_crossed",
            Metric::Packets => "packets_threshold_crossed",
        }
    }

    pub fn is_orig(&self) -> bool {
        self.direction.is_orig()
    }
}

/// Fan-out of crossing notifications to subscriber channels.
///
/// Delivery is fire-and-continue: publishing never waits on a subscriber.
/// Subscribers whose receiver has been dropped are pruned on the next
/// publish.
#[derive(Debug, Default)]
pub struct Notifier {
    subscribers: Vec<mpsc::UnboundedSender<ThresholdCrossed>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ThresholdCrossed> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.iter().filter(|tx| !tx.is_closed()).count()
    }

    /// Hands a notification to every subscriber. Returns how many received it.
    pub fn publish(&mut self, event: ThresholdCrossed) -> usize {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
        self.subscribers.len()
    }
}
