use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Domain events emitted after a transaction commits.
///
/// Events drive best-effort side effects only (email, search sync);
/// nothing downstream of an event may influence the committed outcome.
#[derive(Debug, Clone)]
pub enum Event {
    OrderPlaced(Uuid),
    GuestAccountCreated { user_id: Uuid, email: String },
    ProductUpserted(Uuid),
    ProductRemoved(Uuid),
    ReviewSubmitted { review_id: Uuid, product_id: Uuid },
    ReviewModerated { review_id: Uuid, approved: bool },
}

/// Cloneable handle for publishing events onto the processing channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("failed to send event: {e}"))
    }

    /// Publish an event, logging instead of failing when the channel is
    /// closed. Services use this so a dead consumer can never fail a
    /// committed transaction.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("event dropped: {e}");
        }
    }
}

/// A post-commit side effect. Hooks run in registration order; each is
/// individually fenced so one failing hook cannot affect the others.
#[async_trait]
pub trait PostCommitHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

/// Consume events from the channel and fan each one out to the hooks.
///
/// Failures are logged and swallowed: side effects are at-least-effort,
/// never retried, and never escalate to the request path.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, hooks: Vec<Arc<dyn PostCommitHook>>) {
    while let Some(event) = rx.recv().await {
        debug!(?event, "processing event");
        for hook in &hooks {
            if let Err(e) = hook.handle(&event).await {
                warn!(hook = hook.name(), error = %e, "post-commit hook failed");
            }
        }
    }
    debug!("event channel closed; processor exiting");
}
