//! Headless, topic-filtered publish/subscribe bus for locomotion events.
//!
//! Uses [`tokio::sync::broadcast`] under the hood so that every subscriber
//! receives every event without any single subscriber blocking the arbiter.
//! A slow subscriber loses the oldest events rather than applying
//! back-pressure.
//!
//! # Topics
//!
//! | Topic | Traffic |
//! |---|---|
//! | [`Topic::State`] | Locomotion register transitions |
//! | [`Topic::Verdicts`] | Executed, discarded and preempted intents |
//! | [`Topic::Faults`] | Motion failures |

use tipsy_types::{LocomotionEvent, LocomotionPayload};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes derived from an event's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    State,
    Verdicts,
    Faults,
}

impl Topic {
    /// The topic an event payload belongs to.
    pub fn of(payload: &LocomotionPayload) -> Self {
        match payload {
            LocomotionPayload::StateChanged { .. } => Topic::State,
            LocomotionPayload::IntentExecuted { .. }
            | LocomotionPayload::IntentDiscarded { .. }
            | LocomotionPayload::IntentPreempted { .. } => Topic::Verdicts,
            LocomotionPayload::MotionFault { .. } => Topic::Faults,
        }
    }
}

/// Shared locomotion event bus.  Clone it cheaply – all clones share the
/// same underlying broadcast channel.
#[derive(Clone, Debug)]
pub struct LocomotionBus {
    sender: broadcast::Sender<LocomotionEvent>,
}

impl LocomotionBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to every current subscriber.
    ///
    /// Returns the number of subscribers that were handed the event.  Having
    /// no subscribers is a normal condition and returns `0`.
    pub fn publish(&self, event: LocomotionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to every event.
    pub fn subscribe(&self) -> broadcast::Receiver<LocomotionEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to the events of a single [`Topic`].
    pub fn subscribe_topic(&self, topic: Topic) -> TopicSubscriber {
        TopicSubscriber {
            topic,
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for LocomotionBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A subscriber that only delivers events of one [`Topic`].
pub struct TopicSubscriber {
    topic: Topic,
    receiver: broadcast::Receiver<LocomotionEvent>,
}

impl TopicSubscriber {
    /// Wait for the next event on this subscriber's topic.
    ///
    /// Returns `None` when the bus is closed and no further events will arrive.
    pub async fn recv(&mut self) -> Option<LocomotionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if Topic::of(&event.payload) == self.topic => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "TopicSubscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}
