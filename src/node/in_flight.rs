//! The in-flight map (spec §4.3): a concurrent mapping from a connection
//! handle to the operation currently occupying it, plus the connection
//! itself so the reactor can hand it back to `return_connection` without
//! a second lookup.
//!
//! `put` is called exactly once per dispatch; `remove` is called by
//! whichever event terminates the operation first (response, protocol
//! error, transport exception, or close). Every other event for the same
//! connection finds no entry and is a no-op — this is the test-and-remove
//! primitive spec §9 says is sufficient, no per-connection mutex needed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::node::connection::{Connection, ConnectionId};
use crate::node::operation::BoxedOperation;

#[derive(Default)]
pub struct InFlightMap {
    entries: Mutex<HashMap<ConnectionId, (Arc<Connection>, BoxedOperation)>>,
}

impl InFlightMap {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Called exactly once per dispatch (spec §4.3).
    pub fn put(&self, connection: Arc<Connection>, op: BoxedOperation) {
        self.entries.lock().insert(connection.id(), (connection, op));
    }

    /// Test-and-remove: the first event to terminate an operation wins;
    /// later events for the same connection see `None` and no-op.
    pub fn remove(&self, id: ConnectionId) -> Option<(Arc<Connection>, BoxedOperation)> {
        self.entries.lock().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;
    use crate::node::Node;
    use crate::wire::{InboundMessage, OutboundMessage};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Weak;
    use tokio::net::TcpListener;

    struct NoopOp {
        done: AtomicBool,
    }

    impl OutboundMessage for NoopOp {
        fn encode(&self) -> Vec<u8> {
            Vec::new()
        }
    }

    impl crate::node::operation::Operation for NoopOp {
        fn request(&self) -> &dyn OutboundMessage {
            self
        }
        fn set_response(&self, _msg: InboundMessage) {
            self.done.store(true, Ordering::SeqCst);
        }
        fn is_done(&self) -> bool {
            self.done.load(Ordering::SeqCst)
        }
        fn set_exception(&self, _err: NodeError) {
            self.done.store(true, Ordering::SeqCst);
        }
        fn set_last_node(&self, _node: Arc<Node>) {}
    }

    async fn loopback_connection() -> Arc<Connection> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });
        crate::node::connection::connect(
            Weak::new(),
            &addr.ip().to_string(),
            addr.port(),
            std::time::Duration::ZERO,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn second_remove_is_a_noop() {
        let map = InFlightMap::new();
        let conn = loopback_connection().await;
        let id = conn.id();
        let op: BoxedOperation = Arc::new(NoopOp {
            done: AtomicBool::new(false),
        });

        map.put(conn, op);
        assert!(map.remove(id).is_some());
        assert!(map.remove(id).is_none());
    }
}
