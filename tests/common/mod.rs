//! Shared test scaffolding: a minimal `Operation` implementation and a
//! couple of in-process TCP peers standing in for "the server" spec §8's
//! end-to-end scenarios are phrased against. No Docker, no external
//! services — everything binds `127.0.0.1:0` (SPEC_FULL §10.5).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;
use tokio::sync::Notify;

use nodepool_core::wire::{read_frame, write_frame, InboundMessage, OutboundMessage};
use nodepool_core::{Node, NodeError, Operation};

/// A non-streaming operation: completes on the first `set_response` or
/// `set_exception`, recording whichever came in for assertions.
pub struct TestOperation {
    request: Vec<u8>,
    done: AtomicBool,
    response: Mutex<Option<Vec<u8>>>,
    error: Mutex<Option<NodeError>>,
    last_node: Mutex<Option<Arc<Node>>>,
    notify: Notify,
}

impl TestOperation {
    pub fn new(request: impl Into<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            request: request.into(),
            done: AtomicBool::new(false),
            response: Mutex::new(None),
            error: Mutex::new(None),
            last_node: Mutex::new(None),
            notify: Notify::new(),
        })
    }

    pub async fn wait_done(&self) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        self.notify.notified().await;
    }

    pub fn response(&self) -> Option<Vec<u8>> {
        self.response.lock().unwrap().clone()
    }

    pub fn error(&self) -> Option<NodeError> {
        self.error.lock().unwrap().clone()
    }
}

impl OutboundMessage for TestOperation {
    fn encode(&self) -> Vec<u8> {
        self.request.clone()
    }
}

impl Operation for TestOperation {
    fn request(&self) -> &dyn OutboundMessage {
        self
    }

    fn set_response(&self, msg: InboundMessage) {
        *self.response.lock().unwrap() = Some(msg.payload);
        self.done.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn set_exception(&self, err: NodeError) {
        *self.error.lock().unwrap() = Some(err);
        self.done.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    fn set_last_node(&self, node: Arc<Node>) {
        *self.last_node.lock().unwrap() = Some(node);
    }
}

/// A server that echoes back every frame it receives, unmodified.
pub async fn spawn_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let (mut read_half, mut write_half) = stream.into_split();
                loop {
                    match read_frame(&mut read_half).await {
                        Ok(Some(payload)) => {
                            if write_frame(&mut write_half, &payload).await.is_err() {
                                break;
                            }
                        }
                        _ => break,
                    }
                }
            });
        }
    });
    addr
}

/// A server that accepts connections and closes each one immediately
/// without reading or writing anything — used to drive disconnect-count
/// scenarios (idle close, health demotion) deterministically.
pub async fn spawn_hangup_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            drop(stream);
        }
    });
    addr
}

/// A server that accepts connections and holds them open without reading
/// or writing anything, until the caller drops them through the returned
/// handle — used to simulate a mid-operation disconnect or a blackholed
/// peer at a precise point in a test.
pub async fn spawn_silent_server() -> (SocketAddr, Arc<Mutex<Vec<tokio::net::TcpStream>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let held = Arc::new(Mutex::new(Vec::new()));
    let held_clone = held.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            held_clone.lock().unwrap().push(stream);
        }
    });
    (addr, held)
}
