//! Single-threaded polling loop shared by the harvester and retriever daemons.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::error::{Result, TiaError};
use crate::queue::{pop_json, EventQueue};
use crate::settings::DaemonSettings;

/// Processes one decoded event to completion.
#[async_trait]
pub trait EventHandler: Send + Sync {
    type Event: DeserializeOwned + Send;

    async fn handle(&self, event: Self::Event) -> Result<()>;
}

/// Outcome of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    Empty,
    Handled,
    /// The handler or the payload decoding failed; the event is gone.
    Failed,
    QueueError,
}

pub async fn poll_once<H: EventHandler>(queue: &dyn EventQueue, handler: &H) -> Poll {
    match pop_json::<H::Event>(queue).await {
        Ok(None) => Poll::Empty,
        Ok(Some(event)) => match handler.handle(event).await {
            Ok(()) => Poll::Handled,
            Err(e) => {
                error!(queue = queue.name(), error = %e, "event processing failed");
                Poll::Failed
            }
        },
        Err(TiaError::Decode(msg)) => {
            warn!(queue = queue.name(), "dropping event: {msg}");
            Poll::Failed
        }
        Err(e) => {
            error!(queue = queue.name(), error = %e, "cannot pop event");
            Poll::QueueError
        }
    }
}

/// Pop and handle events forever.
pub async fn run_worker<H: EventHandler>(queue: &dyn EventQueue, handler: &H, settings: &DaemonSettings) {
    loop {
        match poll_once(queue, handler).await {
            Poll::Empty => {
                debug!(queue = queue.name(), "queue empty, sleeping");
                tokio::time::sleep(settings.empty_queue_sleep()).await;
            }
            Poll::QueueError => tokio::time::sleep(settings.queue_error_sleep()).await,
            Poll::Handled | Poll::Failed => {}
        }
    }
}
