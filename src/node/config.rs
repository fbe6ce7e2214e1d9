//! The node's builder surface (spec §6). Recognized options and their
//! defaults match the table in spec §6 exactly; `NodeConfig` is the plain
//! `Clone` struct a cluster layer can load from the same config file it
//! already loads `ProductionConfig` from (SPEC_FULL §10.3), even though
//! the node itself has no CLI or env var surface of its own.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NodeError, NodeResult};

/// Plain configuration snapshot. Mutable fields (everything but the
/// remote address/port, which are the node's identity) are re-validated
/// and applied to a running node through `Node::set_*` rather than by
/// mutating this struct directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub remote_address: String,
    pub remote_port: u16,
    pub min_connections: usize,
    /// `0` means unbounded (spec §3, §8).
    pub max_connections: usize,
    pub idle_timeout_millis: u64,
    /// `0` means infinite (spec §6).
    pub connection_timeout_millis: u64,
    pub block_on_max_connections: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            remote_address: "127.0.0.1".to_string(),
            remote_port: 8087,
            min_connections: 1,
            max_connections: 0,
            // Aggressive default, preserved from the source on purpose
            // (spec §9, final note) even though it reaps eagerly under
            // bursty traffic.
            idle_timeout_millis: 1000,
            connection_timeout_millis: 0,
            block_on_max_connections: false,
        }
    }
}

impl NodeConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_millis)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_millis)
    }

    /// `0` or negative (not representable in `usize`, so just `0`) means
    /// unbounded (spec §3, §8).
    pub fn is_unbounded(&self) -> bool {
        self.max_connections == 0
    }

    pub(crate) fn validate(&self) -> NodeResult<()> {
        if !self.is_unbounded() && self.min_connections > self.max_connections {
            return Err(NodeError::IllegalArgument(format!(
                "min_connections ({}) must be <= max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

/// Builder-then-`build()` shape, matching `PoolConfig`/`AdaptiveConfig`'s
/// construction pattern elsewhere in this crate.
#[derive(Debug, Clone, Default)]
pub struct NodeBuilder {
    config: NodeConfig,
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self {
            config: NodeConfig::default(),
        }
    }

    pub fn with_remote_address(mut self, addr: impl Into<String>) -> Self {
        self.config.remote_address = addr.into();
        self
    }

    pub fn with_remote_port(mut self, port: u16) -> Self {
        self.config.remote_port = port;
        self
    }

    pub fn with_min_connections(mut self, n: usize) -> Self {
        self.config.min_connections = n;
        self
    }

    pub fn with_max_connections(mut self, n: usize) -> Self {
        self.config.max_connections = n;
        self
    }

    pub fn with_idle_timeout_millis(mut self, millis: u64) -> Self {
        self.config.idle_timeout_millis = millis;
        self
    }

    pub fn with_connection_timeout_millis(mut self, millis: u64) -> Self {
        self.config.connection_timeout_millis = millis;
        self
    }

    pub fn with_block_on_max_connections(mut self, block: bool) -> Self {
        self.config.block_on_max_connections = block;
        self
    }

    pub fn build_config(self) -> NodeResult<NodeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
