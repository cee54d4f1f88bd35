use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// Broadcast publisher for rollback lifecycle events
///
/// Stage transitions and the final outcome are published here so that a
/// caller embedding the orchestrator (or a test) can observe a run without
/// parsing logs.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: String,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event with the given name and context
    ///
    /// Having no subscribers is not an error.
    pub async fn publish(
        &self,
        event_name: impl Into<String>,
        context: Value,
    ) -> Result<(), PublishError> {
        let event = PublishedEvent {
            name: event_name.into(),
            context,
            published_at: chrono::Utc::now(),
        };

        // send() only fails when nobody is subscribed
        let _ = self.sender.send(event);
        Ok(())
    }

    /// Serialize `payload` and publish it under `event_name`
    pub async fn publish_serialized<T: Serialize>(
        &self,
        event_name: impl Into<String>,
        payload: &T,
    ) -> Result<(), PublishError> {
        let context = serde_json::to_value(payload)?;
        self.publish(event_name, context).await
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}
