//! The node subsystem: a per-endpoint connection pool and request
//! dispatcher for a length-prefixed binary TCP protocol (spec §1).
//!
//! A `Node` owns a bounded pool of long-lived connections to one remote
//! endpoint, gates concurrent in-flight operations with a permit
//! counter, reaps idle connections, passively detects failure through a
//! sliding window of unexpected disconnects, and correlates each
//! outgoing write with the connection that carries it so the response
//! (or failure) reaches the right `Operation`.
//!
//! Wire framing, cluster-level node selection, and command-layer request
//! building are out of scope (spec §1) — this module only names the
//! interfaces it talks across (`crate::wire`, `crate::node::operation`).

pub mod config;
pub mod connection;
pub mod idle_pool;
pub mod in_flight;
pub mod operation;
pub mod permit;
pub mod recent_close;

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::error::{NodeError, NodeResult};
use crate::node::config::NodeConfig;
use crate::node::connection::{connect, CloseListener, Connection, ConnectionId};
use crate::node::idle_pool::{ConnectionRecord, IdlePool};
use crate::node::in_flight::InFlightMap;
use crate::node::operation::BoxedOperation;
use crate::node::permit::{PermitCounter, UNBOUNDED_PERMITS};
use crate::node::recent_close::RecentCloseLog;
use crate::wire::InboundMessage;

pub use config::NodeBuilder;

/// Idle reaper cadence (spec §4.7): every 5 seconds after a 1 second
/// initial delay.
const REAP_INTERVAL: Duration = Duration::from_secs(5);
const REAP_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Health monitor cadence (spec §4.8): every 500ms after a 1 second
/// initial delay.
const HEALTH_INTERVAL: Duration = Duration::from_millis(500);
const HEALTH_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Sliding window the health monitor purges the recent-close log against.
const HEALTH_WINDOW: Duration = Duration::from_secs(3);

/// Closure count within `HEALTH_WINDOW` that triggers a probe while
/// RUNNING (spec §4.8).
const HEALTH_CLOSE_THRESHOLD: usize = 5;

/// The create → running → (health-checking ↔ running) → shutting-down →
/// shutdown state machine (spec §3, §4.9). Transitions are monotonic
/// except for `Running` ↔ `HealthChecking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeState {
    Created = 0,
    Running = 1,
    HealthChecking = 2,
    ShuttingDown = 3,
    Shutdown = 4,
}

impl NodeState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => NodeState::Created,
            1 => NodeState::Running,
            2 => NodeState::HealthChecking,
            3 => NodeState::ShuttingDown,
            _ => NodeState::Shutdown,
        }
    }
}

/// Invoked synchronously on the transitioning thread whenever the node's
/// state changes (spec §6). Listeners must be non-blocking and must not
/// call back into the node — the lock held while iterating guards only
/// the listener set itself (spec §4.9, §5).
pub trait StateListener: Send + Sync {
    fn node_state_changed(&self, node: &Arc<Node>, new_state: NodeState);
}

/// A waitable handle returned by `shutdown()` (spec §6). `cancel` is
/// deliberately not exposed — shutdown is not cancellable once started
/// (spec §5).
#[derive(Clone)]
pub struct ShutdownHandle {
    notify: Arc<Notify>,
    done: Arc<std::sync::atomic::AtomicBool>,
}

impl ShutdownHandle {
    fn new() -> Self {
        Self {
            notify: Arc::new(Notify::new()),
            done: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    fn complete(&self) {
        self.done.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Blocks until shutdown completes.
    pub async fn wait(&self) {
        if self.is_done() {
            return;
        }
        self.notify.notified().await;
    }

    /// Blocks until shutdown completes or `timeout` elapses, returning
    /// whether it completed in time.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_done() {
            return true;
        }
        tokio::time::timeout(timeout, self.notify.notified())
            .await
            .is_ok()
            || self.is_done()
    }
}

/// Snapshot of the node's counters, purely additive over spec §3–§9
/// (SPEC_FULL §10.4) — nothing in the core state machine depends on it.
#[derive(Debug, Clone, Default)]
pub struct NodeStats {
    pub connections_created: u64,
    pub connections_closed: u64,
    pub idle_count: usize,
    pub in_flight_count: usize,
    pub available_permits: usize,
    pub health_demotions: u64,
    pub health_recoveries: u64,
    pub reap_count: u64,
}

#[derive(Default)]
struct StatCounters {
    connections_created: AtomicU64,
    connections_closed: AtomicU64,
    health_demotions: AtomicU64,
    health_recoveries: AtomicU64,
    reap_count: AtomicU64,
}

struct BackgroundTasks {
    reaper: Option<JoinHandle<()>>,
    health_monitor: Option<JoinHandle<()>>,
    drain: Option<JoinHandle<()>>,
}

/// One remote endpoint `(remote_address, remote_port)` and everything it
/// owns: the idle pool, the in-flight map, the permit counter, the
/// recent-close log, and the background reaper/health-monitor tasks
/// (spec §2).
pub struct Node {
    self_ref: Weak<Node>,
    config: SyncMutex<NodeConfig>,
    state: AtomicU8,
    permits: PermitCounter,
    idle_pool: IdlePool,
    in_flight: InFlightMap,
    recent_close: RecentCloseLog,
    listeners: SyncMutex<Vec<Arc<dyn StateListener>>>,
    stats: StatCounters,
    tasks: SyncMutex<BackgroundTasks>,
    shutdown_handle: SyncMutex<Option<ShutdownHandle>>,
}

impl Node {
    /// Constructs a node from a validated `NodeConfig`. Does not open any
    /// connections or start background tasks — call `start()` for that
    /// (spec §4.9: CREATED → RUNNING).
    pub fn new(config: NodeConfig) -> NodeResult<Arc<Node>> {
        config.validate()?;
        let max_permits = if config.is_unbounded() {
            UNBOUNDED_PERMITS
        } else {
            config.max_connections
        };
        Ok(Arc::new_cyclic(|weak| Node {
            self_ref: weak.clone(),
            permits: PermitCounter::new(max_permits),
            config: SyncMutex::new(config),
            state: AtomicU8::new(NodeState::Created as u8),
            idle_pool: IdlePool::new(),
            in_flight: InFlightMap::new(),
            recent_close: RecentCloseLog::new(),
            listeners: SyncMutex::new(Vec::new()),
            stats: StatCounters::default(),
            tasks: SyncMutex::new(BackgroundTasks {
                reaper: None,
                health_monitor: None,
                drain: None,
            }),
            shutdown_handle: SyncMutex::new(None),
        }))
    }

    fn arc(&self) -> Arc<Node> {
        self.self_ref
            .upgrade()
            .expect("Node always outlives its own Weak self-reference")
    }

    // ---- identity & state -------------------------------------------------

    pub fn remote_address(&self) -> String {
        self.config.lock().remote_address.clone()
    }

    pub fn remote_port(&self) -> u16 {
        self.config.lock().remote_port
    }

    pub fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, new_state: NodeState) {
        self.state.store(new_state as u8, Ordering::Release);
        info!(
            remote_addr = %self.remote_address(),
            port = self.remote_port(),
            ?new_state,
            "node state changed"
        );
        let node = self.arc();
        let listeners = self.listeners.lock().clone();
        for listener in listeners.iter() {
            listener.node_state_changed(&node, new_state);
        }
    }

    pub fn add_state_listener(&self, listener: Arc<dyn StateListener>) {
        self.listeners.lock().push(listener);
    }

    pub fn remove_state_listener(&self, listener: &Arc<dyn StateListener>) {
        self.listeners
            .lock()
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn stats(&self) -> NodeStats {
        NodeStats {
            connections_created: self.stats.connections_created.load(Ordering::Relaxed),
            connections_closed: self.stats.connections_closed.load(Ordering::Relaxed),
            idle_count: self.idle_pool.len(),
            in_flight_count: self.in_flight.len(),
            available_permits: self.permits.available_permits(),
            health_demotions: self.stats.health_demotions.load(Ordering::Relaxed),
            health_recoveries: self.stats.health_recoveries.load(Ordering::Relaxed),
            reap_count: self.stats.reap_count.load(Ordering::Relaxed),
        }
    }

    // ---- configuration getters/setters (spec §3, §4.9, §6) ---------------

    pub fn min_connections(&self) -> usize {
        self.config.lock().min_connections
    }

    pub fn max_connections(&self) -> usize {
        self.config.lock().max_connections
    }

    pub fn idle_timeout_millis(&self) -> u64 {
        self.config.lock().idle_timeout_millis
    }

    pub fn connection_timeout_millis(&self) -> u64 {
        self.config.lock().connection_timeout_millis
    }

    pub fn block_on_max_connections(&self) -> bool {
        self.config.lock().block_on_max_connections
    }

    fn require_mutable(&self) -> NodeResult<()> {
        match self.state() {
            NodeState::Created | NodeState::Running | NodeState::HealthChecking => Ok(()),
            other => Err(NodeError::IllegalState(format!(
                "configuration cannot change while node is {other:?}"
            ))),
        }
    }

    pub fn set_min_connections(&self, n: usize) -> NodeResult<()> {
        self.require_mutable()?;
        let mut config = self.config.lock();
        let candidate = NodeConfig {
            min_connections: n,
            ..config.clone()
        };
        candidate.validate()?;
        config.min_connections = n;
        Ok(())
    }

    pub fn set_max_connections(&self, n: usize) -> NodeResult<()> {
        self.require_mutable()?;
        let mut config = self.config.lock();
        let candidate = NodeConfig {
            max_connections: n,
            ..config.clone()
        };
        candidate.validate()?;
        config.max_connections = n;
        let new_max = if candidate.is_unbounded() {
            UNBOUNDED_PERMITS
        } else {
            n
        };
        // Shrinking never reaps or rejects in-flight operations; the
        // overage drains naturally as operations complete (spec §9(a)).
        // `PermitCounter::set_max` implements the reduce-by-|delta| fix
        // for the source's sign-confused call (spec §9(c)).
        self.permits.set_max(new_max);
        Ok(())
    }

    pub fn set_idle_timeout_millis(&self, millis: u64) -> NodeResult<()> {
        self.require_mutable()?;
        self.config.lock().idle_timeout_millis = millis;
        Ok(())
    }

    pub fn set_connection_timeout_millis(&self, millis: u64) -> NodeResult<()> {
        self.require_mutable()?;
        self.config.lock().connection_timeout_millis = millis;
        Ok(())
    }

    pub fn set_block_on_max_connections(&self, block: bool) -> NodeResult<()> {
        self.require_mutable()?;
        self.config.lock().block_on_max_connections = block;
        Ok(())
    }

    // ---- lifecycle (spec §4.9) --------------------------------------------

    /// CREATED → RUNNING: opens up to `min_connections` connections
    /// (failures tolerated), starts the reaper and health monitor, and
    /// notifies listeners.
    pub async fn start(&self) -> NodeResult<()> {
        if self.state() != NodeState::Created {
            return Err(NodeError::IllegalState(
                "start() called more than once".to_string(),
            ));
        }

        let (host, port, min_connections, connect_timeout) = {
            let config = self.config.lock();
            (
                config.remote_address.clone(),
                config.remote_port,
                config.min_connections,
                config.connect_timeout(),
            )
        };

        for _ in 0..min_connections {
            match connect(self.self_ref.clone(), &host, port, connect_timeout).await {
                Ok(conn) => {
                    self.stats
                        .connections_created
                        .fetch_add(1, Ordering::Relaxed);
                    conn.set_close_listener(CloseListener::Idle);
                    self.idle_pool.offer_first(ConnectionRecord::new(conn));
                }
                Err(err) => {
                    warn!(remote_addr = %host, port, error = %err, "failed to pre-open connection at start");
                }
            }
        }

        self.set_state(NodeState::Running);

        let reaper = tokio::spawn(Self::reap_loop(self.arc()));
        let health_monitor = tokio::spawn(Self::health_loop(self.arc()));
        let mut tasks = self.tasks.lock();
        tasks.reaper = Some(reaper);
        tasks.health_monitor = Some(health_monitor);

        Ok(())
    }

    /// {RUNNING, HEALTH_CHECKING} → SHUTTING_DOWN → SHUTDOWN (spec §4.9).
    /// Cancels the reaper and health monitor, drains and closes the idle
    /// pool, and schedules a task that waits for the in-flight map to
    /// empty before tearing down and signalling the returned handle.
    pub async fn shutdown(&self) -> NodeResult<ShutdownHandle> {
        match self.state() {
            NodeState::Running | NodeState::HealthChecking => {}
            other => {
                return Err(NodeError::IllegalState(format!(
                    "shutdown() called while node is {other:?}"
                )))
            }
        }

        {
            let mut tasks = self.tasks.lock();
            if let Some(handle) = tasks.reaper.take() {
                handle.abort();
            }
            if let Some(handle) = tasks.health_monitor.take() {
                handle.abort();
            }
        }

        self.set_state(NodeState::ShuttingDown);

        for record in self.idle_pool.drain() {
            self.close_connection(&record.connection).await;
        }

        let handle = ShutdownHandle::new();
        {
            let mut slot = self.shutdown_handle.lock();
            *slot = Some(handle.clone());
        }

        let node = self.arc();
        let drain_handle = tokio::spawn(async move {
            loop {
                if node.in_flight.is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            node.set_state(NodeState::Shutdown);
            info!(
                remote_addr = %node.remote_address(),
                port = node.remote_port(),
                "node shutdown complete"
            );
            if let Some(handle) = node.shutdown_handle.lock().clone() {
                handle.complete();
            }
        });
        self.tasks.lock().drain = Some(drain_handle);

        Ok(handle)
    }

    // ---- dispatcher (spec §4.4, §4.5) -------------------------------------

    /// `execute(op)`. Returns `Ok(true)` if the operation was accepted
    /// for dispatch (the response arrives asynchronously through the
    /// reactor), `Ok(false)` if no connection could be obtained (the
    /// caller may retry on another node, no permit is leaked), or
    /// `Err(IllegalState)` if the node is not in a state that accepts
    /// requests.
    pub async fn execute(&self, op: BoxedOperation) -> NodeResult<bool> {
        match self.state() {
            NodeState::Running | NodeState::HealthChecking => {}
            other => {
                return Err(NodeError::IllegalState(format!(
                    "execute() called while node is {other:?}"
                )))
            }
        }

        op.set_last_node(self.arc());

        // A failed connect surfaces as "absent" here, same as a
        // saturated permit counter — the caller just sees `false` and
        // may retry on another node (spec §4.4, §4.5). The underlying
        // `NodeError` never reaches `execute`'s caller.
        let conn = match self.get_connection().await {
            Ok(Some(conn)) => conn,
            Ok(None) | Err(_) => return Ok(false),
        };

        self.in_flight.put(conn.clone(), op.clone());

        // Installed before the write is awaited, while the connection is
        // still exclusively checked out: installing it only after a
        // successful write would race against a reader that already
        // delivered the response and re-idled the connection (with the
        // idle listener) before this line ran, clobbering that idle
        // listener with `InProgress` on a connection no longer in flight
        // (spec §4.5 step 4, §4.6).
        conn.set_close_listener(CloseListener::InProgress);

        let payload = op.request().encode();
        match conn.write(&payload).await {
            Ok(()) => {
                trace!(connection = conn.id(), "dispatched operation");
            }
            Err(err) => {
                self.in_flight.remove(conn.id());
                conn.close().await;
                self.return_connection(&conn).await;
                self.recent_close.record(conn.id());
                op.set_exception(NodeError::write_failed(err));
            }
        }

        Ok(true)
    }

    /// `getConnection()` (spec §4.5). On every exit path either a permit
    /// is held and a live connection is returned, or no permit is held
    /// and `Ok(None)` is returned — except when the new-connect attempt
    /// itself fails, which surfaces as `Err(ConnectionFailed)` with the
    /// permit already released.
    async fn get_connection(&self) -> NodeResult<Option<Arc<Connection>>> {
        let (host, port, connect_timeout, block) = {
            let config = self.config.lock();
            (
                config.remote_address.clone(),
                config.remote_port,
                config.connect_timeout(),
                config.block_on_max_connections,
            )
        };

        if block {
            self.permits
                .acquire()
                .await
                .map_err(|_| NodeError::connection_failed("permit counter closed"))?;
        } else if !self.permits.try_acquire() {
            return Ok(None);
        }

        // Drain the idle pool head-to-tail; closed connections pulled
        // from it are silently discarded (spec §4.5 step 2).
        while let Some(record) = self.idle_pool.poll() {
            if record.connection.is_open() {
                record.connection.detach_close_listener();
                return Ok(Some(record.connection));
            }
        }

        match connect(self.self_ref.clone(), &host, port, connect_timeout).await {
            Ok(conn) => {
                self.stats
                    .connections_created
                    .fetch_add(1, Ordering::Relaxed);
                Ok(Some(conn))
            }
            Err(err) => {
                self.permits.release();
                Err(err)
            }
        }
    }

    // ---- reactor (spec §4.6) -----------------------------------------------

    /// `onSuccess(channel, msg)`. A missing in-flight entry means the
    /// close event won the race; the message is dropped.
    pub async fn on_success(&self, connection_id: ConnectionId, msg: InboundMessage) {
        let Some((conn, op)) = self.peek_in_flight(connection_id) else {
            trace!(connection = connection_id, "message for unknown connection dropped");
            return;
        };
        op.set_response(msg);
        if op.is_done() {
            self.in_flight.remove(connection_id);
            self.return_connection(&conn).await;
        }
    }

    /// `onRiakErrorResponse(channel, err)`. The connection is still
    /// considered usable and is returned to the idle pool.
    pub async fn on_protocol_error(&self, connection_id: ConnectionId, err: NodeError) {
        if let Some((conn, op)) = self.in_flight.remove(connection_id) {
            op.set_exception(err);
            self.return_connection(&conn).await;
        }
    }

    /// `onException(channel, err)`. Handled identically to a protocol
    /// error; the connection typically closes shortly afterwards, which
    /// the in-progress-close handler then finds already removed
    /// (spec §4.6).
    pub async fn on_transport_exception(
        &self,
        connection_id: ConnectionId,
        err: NodeError,
    ) {
        if let Some((conn, op)) = self.in_flight.remove(connection_id) {
            op.set_exception(err);
            self.return_connection(&conn).await;
        }
    }

    /// Fires when a connection sitting in the idle pool closes. The
    /// closed record is not eagerly removed; the next `poll()` or reaper
    /// pass discards it (spec §4.6).
    pub async fn on_idle_close(&self, connection_id: ConnectionId) {
        debug!(connection = connection_id, "idle connection closed");
        self.recent_close.record(connection_id);
    }

    /// Fires when a connection with an active operation closes.
    pub async fn on_inprogress_close(&self, connection_id: ConnectionId) {
        let Some((conn, op)) = self.in_flight.remove(connection_id) else {
            return;
        };
        let cause = conn.take_close_cause();
        self.return_connection(&conn).await;
        self.recent_close.record(connection_id);
        let err = match cause {
            Some(cause) => NodeError::UnexpectedClose(cause),
            None => NodeError::unexpected_close_generic(),
        };
        warn!(connection = connection_id, error = %err, "connection closed with an operation in flight");
        op.set_exception(err);
    }

    fn peek_in_flight(&self, id: ConnectionId) -> Option<(Arc<Connection>, BoxedOperation)> {
        // The in-flight map only exposes put/remove (test-and-remove);
        // streaming responses need a non-removing lookup too. Implemented
        // as remove-then-reinsert rather than widening the map's public
        // surface, since every caller already holds the only reference
        // that matters.
        let entry = self.in_flight.remove(id)?;
        self.in_flight.put(entry.0.clone(), entry.1.clone());
        Some(entry)
    }

    /// Called on every terminal path for an in-flight operation (spec
    /// §4.6). Releases exactly one permit regardless of which branch is
    /// taken.
    async fn return_connection(&self, conn: &Arc<Connection>) {
        match self.state() {
            NodeState::ShuttingDown | NodeState::Shutdown => {
                conn.close().await;
                self.stats
                    .connections_closed
                    .fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                if conn.is_open() {
                    conn.set_close_listener(CloseListener::Idle);
                    self.idle_pool.offer_first(ConnectionRecord::new(conn.clone()));
                } else {
                    self.stats
                        .connections_closed
                        .fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        self.permits.release();
    }

    /// `closeConnection(c)`: removes both close listeners before closing
    /// so an explicit close does not pollute the recent-close log
    /// (spec §4.6). The single close path used by shutdown's drain and the
    /// reaper.
    async fn close_connection(&self, conn: &Arc<Connection>) {
        conn.detach_close_listener();
        conn.close().await;
        self.stats
            .connections_closed
            .fetch_add(1, Ordering::Relaxed);
    }

    // ---- idle reaper (spec §4.7) -------------------------------------------

    async fn reap_loop(self: Arc<Self>) {
        tokio::time::sleep(REAP_INITIAL_DELAY).await;
        let mut ticker = tokio::time::interval(REAP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.reap_once().await;
        }
    }

    async fn reap_once(&self) {
        let min_connections = self.config.lock().min_connections;
        let idle_timeout = self.config.lock().idle_timeout();

        let mut n = self.in_flight.len() + self.idle_pool.len();
        if n <= min_connections {
            return;
        }

        for record in self.idle_pool.oldest_first() {
            if n <= min_connections {
                break;
            }
            // LIFO ordering guarantees every record in front of this one
            // is fresher, so the first survivor ends the pass.
            if record.idle_since.elapsed() < idle_timeout {
                break;
            }
            if self.idle_pool.remove(record.connection.id()) {
                let id = record.connection.id();
                self.close_connection(&record.connection).await;
                self.stats.reap_count.fetch_add(1, Ordering::Relaxed);
                n -= 1;
                debug!(connection = id, "reaped idle connection");
            }
        }
    }

    // ---- health monitor (spec §4.8) ----------------------------------------

    async fn health_loop(self: Arc<Self>) {
        tokio::time::sleep(HEALTH_INITIAL_DELAY).await;
        let mut ticker = tokio::time::interval(HEALTH_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.health_tick().await;
        }
    }

    async fn health_tick(&self) {
        let close_count = self.recent_close.purge_and_count(HEALTH_WINDOW);
        let state = self.state();

        let should_probe = match state {
            NodeState::Running => close_count >= HEALTH_CLOSE_THRESHOLD,
            NodeState::HealthChecking => true,
            _ => false,
        };
        if !should_probe {
            return;
        }

        let (host, port, connect_timeout) = {
            let config = self.config.lock();
            (
                config.remote_address.clone(),
                config.remote_port,
                config.connect_timeout(),
            )
        };

        debug!(remote_addr = %host, port, close_count, ?state, "health probe starting");
        let probe = connect(self.self_ref.clone(), &host, port, connect_timeout).await;

        match (state, probe) {
            (NodeState::HealthChecking, Ok(conn)) => {
                conn.close().await;
                self.stats
                    .health_recoveries
                    .fetch_add(1, Ordering::Relaxed);
                self.set_state(NodeState::Running);
            }
            (NodeState::Running, Err(err)) => {
                warn!(error = %err, "health probe failed, demoting to health-checking");
                self.stats.health_demotions.fetch_add(1, Ordering::Relaxed);
                self.set_state(NodeState::HealthChecking);
            }
            (NodeState::HealthChecking, Err(err)) => {
                debug!(error = %err, "health probe failed, remaining health-checking");
            }
            (NodeState::Running, Ok(conn)) => {
                // Shouldn't be reachable (Running only probes once the
                // threshold trips) but a stray successful probe is
                // harmless either way.
                conn.close().await;
            }
            _ => {}
        }
    }
}
