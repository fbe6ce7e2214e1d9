//! The wire boundary.
//!
//! Framing, request/response serialization, and opcode routing are out of
//! scope for the node subsystem (spec §1) — they belong to a codec layer
//! this crate does not own. This module only names the interfaces the node
//! talks across: a pre-serialized outbound message, a decoded inbound
//! message, and a minimal default length-prefixed codec so the node is
//! exercisable on its own in tests without a real command layer attached.

use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// A message the node receives from the server and hands to an
/// `Operation` via `set_response`. Opaque payload; opcode interpretation
/// is the command layer's job.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }
}

/// A pre-serialized message the node writes to a connection. `Operation`
/// implementations hand one of these to `execute`; the node never builds
/// or inspects the payload.
pub trait OutboundMessage: Send + Sync {
    fn encode(&self) -> Vec<u8>;
}

impl OutboundMessage for Vec<u8> {
    fn encode(&self) -> Vec<u8> {
        self.clone()
    }
}

/// Writes one length-prefixed frame. The companion half of the default
/// codec used by `read_frame`; the node calls this on every dispatch.
pub async fn write_frame(writer: &mut OwnedWriteHalf, payload: &[u8]) -> io::Result<()> {
    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

/// Reads one length-prefixed frame, or `Ok(None)` on clean EOF. This is
/// the minimal default implementation of the external I/O layer's framing
/// contract: a 4-byte big-endian length prefix followed by that many
/// payload bytes. A production deployment plugs in whatever the real
/// command-layer codec does instead; the node's reactor only needs
/// *something* upstream calling its `onSuccess`/`onException` equivalents.
pub async fn read_frame(reader: &mut OwnedReadHalf) -> io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}
