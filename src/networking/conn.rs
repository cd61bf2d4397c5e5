// Copyright (c) 2026 Capsulenet
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! A single live connection to a remote peer.
//!
//! Each direction is serialized by its own lock, so reads and writes can
//! proceed concurrently while at most one sender and one receiver touch the
//! socket at a time. The chunk exchange holds its direction's lock across
//! both phases, which keeps descriptor frame and raw bytes contiguous on
//! the wire.

use crate::core::types::{now_nanos, PeerKey, PublicKeyBytes};
use crate::networking::message::Message;
use crate::networking::protocol::{
    read_frame, write_frame, Frame, ProtocolError, PROTOCOL_VERSION,
};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Upper bound on one chunk of bulk payload (256 KiB).
pub const CHUNK_SIZE: usize = 256 * 1024;

/// Connection errors.
#[derive(Debug, Error)]
pub enum ConnError {
    /// Socket failure.
    #[error("i/o: {0}")]
    Io(#[from] io::Error),
    /// Frame-level failure.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),
    /// Chunk payload exceeds [`CHUNK_SIZE`] or the caller's buffer.
    #[error("chunk size exceeded")]
    ChunkSizeExceeded,
    /// A chunk receive decoded something other than a chunk descriptor.
    #[error("unexpected message type")]
    UnexpectedMessageType,
}

struct WriteState {
    half: OwnedWriteHalf,
    scratch: Vec<u8>,
}

struct ReadState {
    half: OwnedReadHalf,
    scratch: Vec<u8>,
}

/// A remote peer connection, shareable between the read loop, the registry
/// and feature code.
pub struct RemotePeerConn {
    id: Uuid,
    public_key: PublicKeyBytes,
    public_key_str: PeerKey,
    write: Mutex<WriteState>,
    read: Mutex<ReadState>,
    last_write_op: AtomicU64,
    last_read_op: AtomicU64,
}

impl RemotePeerConn {
    /// Wrap an established, handshaken socket.
    pub fn new(public_key: PublicKeyBytes, stream: TcpStream) -> Self {
        let public_key_str = PeerKey::from_bytes(&public_key);
        let (read_half, write_half) = stream.into_split();
        Self {
            id: Uuid::new_v4(),
            public_key,
            public_key_str,
            write: Mutex::new(WriteState {
                half: write_half,
                scratch: Vec::new(),
            }),
            read: Mutex::new(ReadState {
                half: read_half,
                scratch: Vec::new(),
            }),
            last_write_op: AtomicU64::new(0),
            last_read_op: AtomicU64::new(0),
        }
    }

    /// Locally unique connection id, stable for the connection's lifetime.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Remote long-term public key bytes.
    pub fn public_key(&self) -> &PublicKeyBytes {
        &self.public_key
    }

    /// Remote key string; never reassigned after construction.
    pub fn public_key_str(&self) -> &PeerKey {
        &self.public_key_str
    }

    /// Write raw bytes to the socket under the write lock.
    pub async fn write(&self, buf: &[u8]) -> Result<usize, ConnError> {
        let mut st = self.write.lock().await;
        st.half.write_all(buf).await?;
        self.mark_write();
        Ok(buf.len())
    }

    /// Read raw bytes from the socket under the read lock.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize, ConnError> {
        let mut st = self.read.lock().await;
        let n = st.half.read(buf).await?;
        if n > 0 {
            self.mark_read();
        }
        Ok(n)
    }

    /// Send one message, stamped with the current protocol version.
    pub async fn send(&self, msg: Message) -> Result<(), ConnError> {
        let mut st = self.write.lock().await;
        let frame = Frame {
            version: PROTOCOL_VERSION,
            msg,
        };
        let WriteState { half, scratch } = &mut *st;
        write_frame(half, &frame, scratch).await?;
        self.mark_write();
        Ok(())
    }

    /// Send a chunk descriptor frame followed by `data` as raw bytes.
    ///
    /// Both phases happen under one hold of the write lock, so no other
    /// sender can interpose between descriptor and payload.
    pub async fn send_chunk(&self, msg: Message, data: &[u8]) -> Result<usize, ConnError> {
        if data.len() > CHUNK_SIZE {
            return Err(ConnError::ChunkSizeExceeded);
        }

        let mut st = self.write.lock().await;
        let frame = Frame {
            version: PROTOCOL_VERSION,
            msg,
        };
        let WriteState { half, scratch } = &mut *st;
        write_frame(half, &frame, scratch).await?;
        half.write_all(data).await?;
        self.mark_write();
        Ok(data.len())
    }

    /// Receive one frame under the read lock.
    pub async fn recv(&self) -> Result<Frame, ConnError> {
        let mut st = self.read.lock().await;
        let ReadState { half, scratch } = &mut *st;
        let frame = read_frame(half, scratch).await?;
        self.mark_read();
        Ok(frame)
    }

    /// Receive a chunk: one descriptor frame, then exactly `size` raw bytes
    /// into `buf`. Fails with [`ConnError::UnexpectedMessageType`] when the
    /// frame is not a chunk descriptor and [`ConnError::ChunkSizeExceeded`]
    /// when the advertised size does not fit.
    pub async fn receive_chunk(&self, buf: &mut [u8]) -> Result<(Message, usize), ConnError> {
        let mut st = self.read.lock().await;
        let ReadState { half, scratch } = &mut *st;
        let frame = read_frame(half, scratch).await?;

        let size = match &frame.msg {
            Message::CapsuleStreamChunk(desc) => desc.size,
            _ => return Err(ConnError::UnexpectedMessageType),
        };
        if size > CHUNK_SIZE as u64 || size > buf.len() as u64 {
            return Err(ConnError::ChunkSizeExceeded);
        }

        let n = size as usize;
        half.read_exact(&mut buf[..n]).await?;
        self.mark_read();
        Ok((frame.msg, n))
    }

    /// Whether the most recent operation in either direction is older than
    /// `threshold`. A connection that has never completed an operation is
    /// stale.
    pub fn is_stale(&self, threshold: Duration) -> bool {
        let w = self.last_write_op.load(Ordering::Relaxed);
        let r = self.last_read_op.load(Ordering::Relaxed);
        if w == 0 && r == 0 {
            return true;
        }
        now_nanos().saturating_sub(w.max(r)) > threshold.as_nanos() as u64
    }

    /// Shut down the write half, signalling EOF to the remote peer.
    pub async fn close(&self) -> Result<(), ConnError> {
        let mut st = self.write.lock().await;
        st.half.shutdown().await?;
        Ok(())
    }

    fn mark_write(&self) {
        self.last_write_op.fetch_max(now_nanos(), Ordering::Relaxed);
    }

    fn mark_read(&self) {
        self.last_read_op.fetch_max(now_nanos(), Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn set_last_ops(&self, write_nanos: u64, read_nanos: u64) {
        self.last_write_op.store(write_nanos, Ordering::Relaxed);
        self.last_read_op.store(read_nanos, Ordering::Relaxed);
    }
}
