//! The recent-close log (spec §4.8): a thread-safe FIFO of unexpected
//! disconnects, consumed by the health monitor as a sliding window.
//! Entries older than the window are purged lazily, once per health-
//! monitor tick, rather than on every push.

use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::Mutex;

use crate::node::connection::ConnectionId;

/// `(connection, close timestamp)`.
#[derive(Clone, Copy)]
pub struct RecentCloseEntry {
    pub connection_id: ConnectionId,
    pub closed_at: Instant,
}

#[derive(Default)]
pub struct RecentCloseLog {
    entries: Mutex<VecDeque<RecentCloseEntry>>,
}

impl RecentCloseLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, connection_id: ConnectionId) {
        self.entries.lock().push_back(RecentCloseEntry {
            connection_id,
            closed_at: Instant::now(),
        });
    }

    /// Drops every entry older than `window`, then returns the count of
    /// what remains — the health monitor's sliding-window count.
    pub fn purge_and_count(&self, window: std::time::Duration) -> usize {
        let cutoff = Instant::now() - window;
        let mut entries = self.entries.lock();
        while matches!(entries.front(), Some(e) if e.closed_at < cutoff) {
            entries.pop_front();
        }
        entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
