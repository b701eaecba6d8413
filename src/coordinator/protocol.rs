//! Coordination protocol
//!
//! Messages exchanged between the leader (rank 0) and the other ranks. The
//! group is a star: followers only ever talk to the leader.
//!
//! # Message Flow
//!
//! ```text
//! Leader (rank 0)                  Follower (rank r)
//!     |                              |
//!     |<------- HELLO(rank) ---------|
//!     |-------- WELCOME ------------>|
//!     |                              |
//!     |<------- ARRIVE(seq) ---------|   barrier
//!     |-------- RELEASE(seq) ------->|
//!     |                              |
//!     |-- BROADCAST(seq, payload) -->|   broadcast
//! ```
//!
//! Every collective carries a sequence number. Both sides count collectives
//! independently, so a mismatch means the ranks left lockstep.
//!
//! # Message Framing
//!
//! Each message is prefixed with a 4-byte length field (little-endian u32):
//!
//! ```text
//! [4 bytes: message length][N bytes: MessagePack-serialized message]
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version
///
/// Leader and followers must have matching protocol versions.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted message body
pub const MAX_MESSAGE_BYTES: usize = 100 * 1024 * 1024;

/// Protocol message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Follower introduces itself (Follower → Leader)
    Hello(HelloMessage),

    /// Leader accepts a follower into the group (Leader → Follower)
    Welcome(WelcomeMessage),

    /// Follower reached barrier `seq` (Follower → Leader)
    Arrive { seq: u64 },

    /// Every rank reached barrier `seq` (Leader → Follower)
    Release { seq: u64 },

    /// Leader's value for collective `seq` (Leader → Follower)
    Broadcast { seq: u64, payload: Vec<u8> },
}

impl Message {
    /// Short name for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Hello(_) => "HELLO",
            Message::Welcome(_) => "WELCOME",
            Message::Arrive { .. } => "ARRIVE",
            Message::Release { .. } => "RELEASE",
            Message::Broadcast { .. } => "BROADCAST",
        }
    }
}

/// Hello message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloMessage {
    /// Protocol version (must match)
    pub protocol_version: u32,

    /// Rank the follower was launched as
    pub rank: usize,

    /// World size the follower was launched with
    pub world_size: usize,

    /// Node identifier (hostname)
    pub node: String,
}

/// Welcome message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomeMessage {
    /// Protocol version
    pub protocol_version: u32,

    /// Group size as seen by the leader
    pub world_size: usize,
}

/// Serialize a message to bytes
///
/// Prepends a 4-byte length field for framing.
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>> {
    let msg_bytes = rmp_serde::to_vec(msg)?;

    let msg_len = msg_bytes.len() as u32;
    let mut framed = Vec::with_capacity(4 + msg_bytes.len());
    framed.extend_from_slice(&msg_len.to_le_bytes());
    framed.extend_from_slice(&msg_bytes);

    Ok(framed)
}

/// Read a complete message from a stream
///
/// Reads the length prefix, then the message body.
pub async fn read_message<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Message> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;

    let msg_len = u32::from_le_bytes(len_buf) as usize;
    if msg_len > MAX_MESSAGE_BYTES {
        return Err(Error::Coordination(format!(
            "message too large: {} bytes (max {})",
            msg_len, MAX_MESSAGE_BYTES
        )));
    }

    let mut msg_buf = vec![0u8; msg_len];
    stream.read_exact(&mut msg_buf).await?;

    Ok(rmp_serde::from_slice(&msg_buf)?)
}

/// Write a message to a stream and flush it
pub async fn write_message<W: AsyncWrite + Unpin>(stream: &mut W, msg: &Message) -> Result<()> {
    let framed = serialize_message(msg)?;
    stream.write_all(&framed).await?;
    stream.flush().await?;
    Ok(())
}
