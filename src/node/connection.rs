//! A live TCP connection and the background task that stands in for "the
//! I/O layer" spec §1 treats as an external collaborator. Framing and
//! opcode routing belong to a real command-layer codec; this minimal
//! reader just decodes length-prefixed frames (see `crate::wire`) and
//! calls back into the node's reactor, the same three callbacks plus one
//! observable a production I/O event loop would deliver.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tracing::{trace, warn};

use crate::error::NodeError;
use crate::node::Node;
use crate::wire::{read_frame, write_frame, InboundMessage};

pub type ConnectionId = u64;

/// Which close-listener variant is currently attached to a connection
/// (spec §4.6). At most one is meaningful at a time; `getConnection` and
/// `returnConnection` swap it as the connection moves between the idle
/// pool and an in-flight dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseListener {
    /// Not yet attached to either variant (connection mid-acquisition).
    None,
    /// Fires `Node::on_idle_close` — the connection is sitting in the
    /// idle pool.
    Idle,
    /// Fires `Node::on_inprogress_close` — the connection is carrying an
    /// operation.
    InProgress,
}

struct ConnectionShared {
    closed: AtomicBool,
    close_listener: Mutex<CloseListener>,
    /// Set by the reader loop when the socket reported an actual error
    /// (as opposed to a clean EOF). Consumed once by whichever reactor
    /// handler fields the resulting close event, so it can surface the
    /// transport's own cause instead of the generic "connection closed
    /// unexpectedly" message (spec §7).
    close_cause: Mutex<Option<String>>,
}

/// One connection to the node's remote endpoint. Owned by exactly one of
/// {idle pool, in-flight map, a transient dispatcher frame, closed} at any
/// time (spec §3).
pub struct Connection {
    id: ConnectionId,
    write_half: AsyncMutex<OwnedWriteHalf>,
    shared: Arc<ConnectionShared>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        !self.shared.closed.load(Ordering::Acquire)
    }

    pub fn set_close_listener(&self, kind: CloseListener) {
        *self.shared.close_listener.lock() = kind;
    }

    /// Removes whichever close listener is attached, so an explicit
    /// `closeConnection` does not also fire the idle/in-progress handler
    /// and pollute the recent-close log (spec §4.6).
    pub fn detach_close_listener(&self) {
        *self.shared.close_listener.lock() = CloseListener::None;
    }

    /// Consumes the transport's reported close cause, if any. A clean EOF
    /// leaves this `None`, in which case callers fall back to the generic
    /// unexpected-close message (spec §7).
    pub fn take_close_cause(&self) -> Option<String> {
        self.shared.close_cause.lock().take()
    }

    pub async fn write(&self, payload: &[u8]) -> io::Result<()> {
        let mut half = self.write_half.lock().await;
        write_frame(&mut half, payload).await
    }

    /// Marks the connection closed and shuts down the write half.
    /// Idempotent — safe to call on an already-closed connection (spec
    /// §8: `returnConnection(c)` must tolerate an already-closed `c`).
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut half = self.write_half.lock().await;
        let _ = half.shutdown().await;
    }
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opens a new TCP connection to `(host, port)`, bounded by
/// `connect_timeout` (zero means wait indefinitely), and spawns its
/// background reader against `node`. Used both by `getConnection` (spec
/// §4.5) and by the health monitor's probe (spec §4.8) — the probe just
/// closes what comes back instead of handing it to a caller.
pub async fn connect(
    node: Weak<Node>,
    host: &str,
    port: u16,
    connect_timeout: Duration,
) -> Result<Arc<Connection>, NodeError> {
    let addr = format!("{host}:{port}");
    let stream = if connect_timeout.is_zero() {
        TcpStream::connect(&addr)
            .await
            .map_err(NodeError::connection_failed)?
    } else {
        timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| NodeError::ConnectionFailed(format!("connect to {addr} timed out")))?
            .map_err(NodeError::connection_failed)?
    };
    let _ = stream.set_nodelay(true);
    let (read_half, write_half) = stream.into_split();

    let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
    let shared = Arc::new(ConnectionShared {
        closed: AtomicBool::new(false),
        close_listener: Mutex::new(CloseListener::None),
        close_cause: Mutex::new(None),
    });

    let conn = Arc::new(Connection {
        id,
        write_half: AsyncMutex::new(write_half),
        shared: shared.clone(),
    });

    tokio::spawn(run_reader(node, id, read_half, shared));

    Ok(conn)
}

/// The connection's read loop. Every decoded frame is delivered as a
/// successful response (`Node::on_success`); distinguishing a
/// protocol-level error reply from a normal payload requires opcode
/// knowledge this crate deliberately does not have (spec §1), so a real
/// deployment's command-layer codec is expected to call
/// `Node::on_protocol_error` / `Node::on_transport_exception` directly
/// instead of going through this default reader.
async fn run_reader(
    node: Weak<Node>,
    id: ConnectionId,
    mut read_half: OwnedReadHalf,
    shared: Arc<ConnectionShared>,
) {
    loop {
        match read_frame(&mut read_half).await {
            Ok(Some(payload)) => {
                let Some(node) = node.upgrade() else { return };
                node.on_success(id, InboundMessage::new(payload)).await;
            }
            Ok(None) => {
                trace!(connection = id, "peer closed connection");
                break;
            }
            Err(err) => {
                warn!(connection = id, error = %err, "connection read error");
                *shared.close_cause.lock() = Some(err.to_string());
                break;
            }
        }
    }

    shared.closed.store(true, Ordering::Release);
    let Some(node) = node.upgrade() else { return };
    let listener = *shared.close_listener.lock();
    match listener {
        CloseListener::Idle => node.on_idle_close(id).await,
        CloseListener::InProgress => node.on_inprogress_close(id).await,
        CloseListener::None => {}
    }
}
