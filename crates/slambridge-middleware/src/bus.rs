//! In-process topic bus between the router and the pub/sub client.
//!
//! Uses [`tokio::sync::broadcast`] so the router's publish call never waits
//! on the network: it hands the record over and returns. The rosbridge
//! forwarder (or any test) subscribes and drains the channel on its own task.

use slambridge_types::{BridgeError, SensorMessage, TopicMessage};
use tokio::sync::broadcast;
use tracing::debug;

/// Default channel capacity (number of buffered messages before old ones are
/// dropped for slow subscribers).
pub const DEFAULT_CAPACITY: usize = 256;

/// The hand-off from a mapped record to the pub/sub layer.
///
/// Implementations must be synchronous and keep no per-call state; the
/// router calls `publish` once for each successfully mapped frame.
pub trait Publisher: Send + Sync {
    /// Publish `message` on `topic`. Returns the number of consumers that
    /// were handed the message.
    fn publish(&self, topic: &str, message: SensorMessage) -> Result<usize, BridgeError>;
}

/// Shared topic bus. Clone it cheaply – all clones share the same channel.
#[derive(Clone, Debug)]
pub struct TopicBus {
    sender: broadcast::Sender<TopicMessage>,
}

impl TopicBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero, as [`broadcast::channel`] does.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to every message published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<TopicMessage> {
        self.sender.subscribe()
    }
}

impl Default for TopicBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Publisher for TopicBus {
    /// Broadcast `message` on the bus.
    ///
    /// Returns `Ok(0)` when nobody is subscribed; with no pub/sub client
    /// attached there is nobody to deliver to, which is not an error.
    fn publish(&self, topic: &str, message: SensorMessage) -> Result<usize, BridgeError> {
        match self.sender.send(TopicMessage::new(topic, message)) {
            Ok(n) => Ok(n),
            Err(broadcast::error::SendError(dropped)) => {
                debug!(topic = %dropped.topic, "no bus subscribers; message dropped");
                Ok(0)
            }
        }
    }
}
