//! Per-connection state
//!
//! An [`ActiveConnection`] is the integration's handle on one WebSocket
//! client: the outbound queue, the last request id seen, and the table of
//! callbacks to run when the client goes away.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bridge_core::{BridgeError, BridgeResult};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::types::OutgoingMessage;

/// Capacity of the outbound queue of a connection
pub const OUTBOUND_CAPACITY: usize = 256;

/// Callback run when the owning connection closes
pub type LostConnectionCallback = Arc<dyn Fn() + Send + Sync>;

/// Per-connection state
pub struct ActiveConnection {
    /// Connection id, for logs
    id: String,
    /// Outbound queue, drained by the transport's writer task
    tx: mpsc::Sender<OutgoingMessage>,
    /// Last message ID received
    last_id: AtomicU64,
    /// Lost-connection callbacks: message_id -> callback
    subscriptions: Mutex<HashMap<u64, LostConnectionCallback>>,
    closed: AtomicBool,
}

impl ActiveConnection {
    pub fn new(tx: mpsc::Sender<OutgoingMessage>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string().to_lowercase(),
            tx,
            last_id: AtomicU64::new(0),
            subscriptions: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Create a connection together with the receiving end of its queue
    pub fn channel() -> (Arc<Self>, mpsc::Receiver<OutgoingMessage>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        (Arc::new(Self::new(tx)), rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Validate that the message ID is increasing
    pub fn validate_id(&self, id: u64) -> Result<(), &'static str> {
        let last = self.last_id.load(Ordering::SeqCst);
        if id <= last {
            return Err("id_reuse");
        }
        self.last_id.store(id, Ordering::SeqCst);
        Ok(())
    }

    /// Queue a message for the client
    pub async fn send(&self, msg: OutgoingMessage) -> BridgeResult<()> {
        if self.is_closed() {
            return Err(BridgeError::ConnectionClosed);
        }
        self.tx
            .send(msg)
            .await
            .map_err(|_| BridgeError::ConnectionClosed)
    }

    /// Register the callback to run when this connection closes
    ///
    /// A second registration under the same message id replaces the first.
    pub fn subscribe(&self, message_id: u64, callback: LostConnectionCallback) {
        if self.is_closed() {
            warn!(connection = %self.id, message_id, "Subscribing on a closed connection");
        }
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(message_id, callback);
    }

    /// Drop the callback registered under `message_id`, if any
    pub fn unsubscribe(&self, message_id: u64) -> bool {
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&message_id)
            .is_some()
    }

    /// Number of registered lost-connection callbacks
    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Mark the connection closed and run every lost-connection callback
    ///
    /// Runs each callback once; closing twice does nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let callbacks: Vec<(u64, LostConnectionCallback)> = self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .collect();

        info!(
            connection = %self.id,
            callbacks = callbacks.len(),
            "Connection closed"
        );
        for (message_id, callback) in callbacks {
            debug!(connection = %self.id, message_id, "Running lost-connection callback");
            callback();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ActiveConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveConnection")
            .field("id", &self.id)
            .field("last_id", &self.last_id.load(Ordering::SeqCst))
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_validate_id_must_increase() {
        let (conn, _rx) = ActiveConnection::channel();
        assert_ok!(conn.validate_id(1));
        assert_ok!(conn.validate_id(5));
        assert_eq!(conn.validate_id(5), Err("id_reuse"));
        assert_eq!(conn.validate_id(2), Err("id_reuse"));
        assert_ok!(conn.validate_id(6));
    }

    #[tokio::test]
    async fn test_send_queues_message() {
        let (conn, mut rx) = ActiveConnection::channel();
        assert_ok!(conn.send(OutgoingMessage::ack(3)).await);
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.id(), 3);
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (conn, _rx) = ActiveConnection::channel();
        conn.close();
        let err = assert_err!(conn.send(OutgoingMessage::ack(1)).await);
        assert_eq!(err, BridgeError::ConnectionClosed);
    }

    #[test]
    fn test_close_runs_each_callback_once() {
        let (conn, _rx) = ActiveConnection::channel();
        let calls = Arc::new(AtomicUsize::new(0));
        for message_id in [1, 2] {
            let calls = calls.clone();
            conn.subscribe(
                message_id,
                Arc::new(move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        conn.close();
        conn.close();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(conn.subscription_count(), 0);
    }

    #[test]
    fn test_unsubscribed_callback_not_run() {
        let (conn, _rx) = ActiveConnection::channel();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        conn.subscribe(
            7,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(conn.unsubscribe(7));
        assert!(!conn.unsubscribe(7));
        conn.close();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
