//! The operation contract.
//!
//! An `Operation` is an externally defined future-like object. The node
//! treats it opaquely through exactly these four methods; it never
//! inspects a request's opcode or a response's payload beyond handing it
//! over.

use std::sync::Arc;

use crate::error::NodeError;
use crate::node::Node;
use crate::wire::{InboundMessage, OutboundMessage};

/// Implemented by the command layer (out of scope here). `set_response`
/// may be called one or more times for streaming operations; `is_done`
/// tells the reactor when to stop routing messages to this operation and
/// return the connection to the idle pool.
pub trait Operation: Send + Sync {
    /// The pre-serialized request to write to the wire.
    fn request(&self) -> &dyn OutboundMessage;

    /// Deliver one response message. May be called more than once for a
    /// streaming operation.
    fn set_response(&self, msg: InboundMessage);

    /// Whether the operation is complete after the most recent
    /// `set_response`. Non-streaming operations return `true` after the
    /// first call.
    fn is_done(&self) -> bool;

    /// Terminate the operation with a failure. Mutually exclusive with
    /// further `set_response` calls.
    fn set_exception(&self, err: NodeError);

    /// Record which node served (or attempted to serve) this operation.
    fn set_last_node(&self, node: Arc<Node>);
}

pub type BoxedOperation = Arc<dyn Operation>;
