//! The idle pool (spec §4.2): a thread-safe LIFO deque of connection
//! records. Repeatedly handing out the most-recently-returned connection
//! maximizes keep-alive and lets older idle entries age out predictably
//! from the tail; the reaper always looks at the tail first.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::node::connection::{Connection, ConnectionId};

/// `(connection, idle-since timestamp)`. The timestamp is set once, when
/// the record is created, and never touched while the connection sits
/// idle (spec §3).
#[derive(Clone)]
pub struct ConnectionRecord {
    pub connection: Arc<Connection>,
    pub idle_since: Instant,
}

impl ConnectionRecord {
    pub fn new(connection: Arc<Connection>) -> Self {
        Self {
            connection,
            idle_since: Instant::now(),
        }
    }
}

/// Front = most recently returned (hot). Back = oldest. Access never
/// blocks the caller.
#[derive(Default)]
pub struct IdlePool {
    records: Mutex<VecDeque<ConnectionRecord>>,
}

impl IdlePool {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
        }
    }

    /// `offerFirst` — push a freshly-returned connection to the hot end.
    pub fn offer_first(&self, record: ConnectionRecord) {
        self.records.lock().push_front(record);
    }

    /// `poll` — remove and return the hottest record, if any. Callers are
    /// responsible for discarding it if it turns out closed (spec §4.5
    /// step 2).
    pub fn poll(&self) -> Option<ConnectionRecord> {
        self.records.lock().pop_front()
    }

    /// Oldest-first snapshot for the reaper (`descendingIterator`).
    /// LIFO ordering guarantees that once one record is found still
    /// within the idle timeout, every record in front of it (fresher) is
    /// too, so the reaper can stop at the first survivor.
    pub fn oldest_first(&self) -> Vec<ConnectionRecord> {
        let records = self.records.lock();
        records.iter().rev().cloned().collect()
    }

    /// Remove a specific record by connection id, wherever it sits in the
    /// deque. Used by the reaper once it has decided to evict an entry.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let mut records = self.records.lock();
        if let Some(pos) = records.iter().position(|r| r.connection.id() == id) {
            records.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains every record, closed or not — used by shutdown's drain
    /// step. Returns the connections so the caller can close them.
    pub fn drain(&self) -> Vec<ConnectionRecord> {
        self.records.lock().drain(..).collect()
    }
}
