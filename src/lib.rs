//! Per-endpoint connection pool and request dispatcher for a
//! length-prefixed binary TCP protocol to a distributed key-value
//! database.
//!
//! A [`node::Node`] owns a bounded pool of long-lived connections to one
//! remote endpoint: permit-based admission control, an idle-connection
//! reaper, a passive failure detector, and the write/response correlator
//! that binds each outgoing request to the connection carrying it. Wire
//! framing, cluster-level node selection, and command-layer request
//! building are external collaborators this crate does not own.

pub mod error;
pub mod node;
pub mod wire;

pub use error::{NodeError, NodeResult, SharedNodeError};
pub use node::config::{NodeBuilder, NodeConfig};
pub use node::operation::{BoxedOperation, Operation};
pub use node::{Node, NodeState, NodeStats, ShutdownHandle, StateListener};
