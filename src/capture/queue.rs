//! Inbound queue between the endpoint handlers and the capture loop
//!
//! Unbounded multi-producer / single-consumer. Producers never block and
//! never fail loudly: once the consumer has closed, a push is discarded and
//! reported as `false`.

use tokio::sync::mpsc;
use tracing::debug;

use crate::record::RequestRecord;

/// Create a connected sender/receiver pair
#[must_use]
pub fn inbound_queue() -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueSender { tx }, QueueReceiver { rx })
}

/// Producer handle, cloned into every connection handler
#[derive(Debug, Clone)]
pub struct QueueSender {
    tx: mpsc::UnboundedSender<RequestRecord>,
}

impl QueueSender {
    /// Enqueue a record
    ///
    /// Returns `false` if the queue was already closed; the record is dropped.
    pub fn push(&self, record: RequestRecord) -> bool {
        match self.tx.send(record) {
            Ok(()) => true,
            Err(mpsc::error::SendError(record)) => {
                debug!(
                    "Queue closed, dropping late {} {}",
                    record.method, record.path
                );
                false
            }
        }
    }
}

/// Consumer handle, owned by the capture loop
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::UnboundedReceiver<RequestRecord>,
}

impl QueueReceiver {
    /// Wait for the next record
    ///
    /// Returns `None` once every sender is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<RequestRecord> {
        self.rx.recv().await
    }

    /// Take a record if one is ready
    pub fn try_recv(&mut self) -> Option<RequestRecord> {
        self.rx.try_recv().ok()
    }

    /// Close the queue; later pushes are discarded
    ///
    /// Records already buffered are dropped together with the receiver.
    pub fn close(mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::BTreeMap;

    fn record(body: &'static str) -> RequestRecord {
        RequestRecord::new("POST", "/", BTreeMap::new(), Bytes::from_static(body.as_bytes()))
    }

    #[tokio::test]
    async fn test_fifo_single_producer() {
        let (tx, mut rx) = inbound_queue();

        assert!(tx.push(record("one")));
        assert!(tx.push(record("two")));

        assert_eq!(rx.recv().await.unwrap().body_text(), "one");
        assert_eq!(rx.recv().await.unwrap().body_text(), "two");
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_push_after_close_is_benign() {
        let (tx, rx) = inbound_queue();
        rx.close();

        assert!(!tx.push(record("late")));
    }

    #[tokio::test]
    async fn test_many_producers_no_loss() {
        let (tx, mut rx) = inbound_queue();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    tx.push(record("x"));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        drop(tx);

        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 800);
    }
}
