//! Named event queues linking the workers.
//!
//! A queue is a multiset: `pop` removes an arbitrary member and there is no
//! acknowledge step, so a popped event that is never processed is lost.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;

use crate::error::{Result, TiaError};

#[async_trait]
pub trait EventQueue: Send + Sync {
    fn name(&self) -> &str;

    async fn push(&self, payload: &str) -> Result<()>;

    /// Non-blocking; `None` when the queue is empty.
    async fn pop(&self) -> Result<Option<String>>;

    async fn len(&self) -> Result<usize>;
}

/// Serialize `item` as JSON and push it.
pub async fn push_json<T: Serialize + ?Sized>(queue: &dyn EventQueue, item: &T) -> Result<()> {
    let payload = serde_json::to_string(item)?;
    queue.push(&payload).await
}

/// Pop one payload and decode it. Undecodable payloads surface as
/// [`TiaError::Decode`] after having been removed from the queue.
pub async fn pop_json<T: DeserializeOwned>(queue: &dyn EventQueue) -> Result<Option<T>> {
    match queue.pop().await? {
        None => Ok(None),
        Some(payload) => serde_json::from_str(&payload).map(Some).map_err(|e| {
            TiaError::Decode(format!("undecodable event on queue \"{}\": {e}", queue.name()))
        }),
    }
}

/// In-process queue.
pub struct MemoryQueue {
    name: String,
    items: Mutex<Vec<String>>,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), items: Mutex::new(Vec::new()) }
    }

    /// Snapshot of the queued payloads.
    pub async fn items(&self) -> Vec<String> {
        self.items.lock().await.clone()
    }
}

#[async_trait]
impl EventQueue for MemoryQueue {
    fn name(&self) -> &str { &self.name }

    async fn push(&self, payload: &str) -> Result<()> {
        self.items.lock().await.push(payload.to_string());
        Ok(())
    }

    async fn pop(&self) -> Result<Option<String>> {
        Ok(self.items.lock().await.pop())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.items.lock().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Event {
        id: u32,
    }

    #[tokio::test]
    async fn test_json_roundtrip_through_queue() {
        let q = MemoryQueue::new("docs");
        push_json(&q, &Event { id: 7 }).await.unwrap();
        assert_eq!(q.len().await.unwrap(), 1);

        let e: Option<Event> = pop_json(&q).await.unwrap();
        assert_eq!(e, Some(Event { id: 7 }));
        assert_eq!(pop_json::<Event>(&q).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicates_are_kept() {
        let q = MemoryQueue::new("repo");
        q.push("same").await.unwrap();
        q.push("same").await.unwrap();
        assert_eq!(q.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_bad_payload_is_consumed_and_reported() {
        let q = MemoryQueue::new("docs");
        q.push("not json").await.unwrap();
        let err = pop_json::<Event>(&q).await.unwrap_err();
        assert!(matches!(err, TiaError::Decode(_)));
        assert_eq!(q.len().await.unwrap(), 0);
    }
}
