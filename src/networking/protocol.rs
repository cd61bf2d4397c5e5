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

//! Wire protocol: version-tagged length-prefixed frames and the two-step
//! public-key handshake.
//!
//! Frame layout: `[version: u8][payload_len: u32 BE][payload]`.
//! Handshake record: `[key_len: u32 BE][key_bytes]`. The server receives
//! first and then sends; the client sends first and then receives. The
//! asymmetry is load-bearing: two peers performing the same role would
//! both block on the first read.

use crate::core::types::PublicKeyBytes;
use crate::networking::codec::{self, CodecError};
use crate::networking::message::Message;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Frame header size: 1 version byte + 4 length bytes.
pub const HEADER_LEN: usize = 5;

/// Upper bound on a frame payload (16 MiB).
pub const MAX_FRAME_PAYLOAD: usize = 16 << 20;

/// Upper bound on a handshake key record.
pub const MAX_HANDSHAKE_KEY_LEN: u32 = 1024;

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Underlying stream failure (including truncation).
    #[error("i/o: {0}")]
    Io(#[from] io::Error),
    /// Advertised payload length exceeds [`MAX_FRAME_PAYLOAD`].
    #[error("frame payload of {0} bytes exceeds the frame limit")]
    FrameTooLarge(u32),
    /// Handshake key length is out of range or not an Ed25519 key.
    #[error("handshake key length {0} out of range")]
    HandshakeKeyLen(u32),
    /// Payload could not be encoded or decoded.
    #[error("{0}")]
    Codec(#[from] CodecError),
}

/// One unit of the wire protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Protocol version stamped by the sender.
    pub version: u8,
    /// Decoded payload.
    pub msg: Message,
}

/// Read exactly one frame. `scratch` is reused across calls and never grows
/// beyond the advertised payload length.
pub async fn read_frame<R: AsyncRead + Unpin>(
    r: &mut R,
    scratch: &mut Vec<u8>,
) -> Result<Frame, ProtocolError> {
    let mut header = [0u8; HEADER_LEN];
    r.read_exact(&mut header).await?;

    let version = header[0];
    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    if payload_len as usize > MAX_FRAME_PAYLOAD {
        return Err(ProtocolError::FrameTooLarge(payload_len));
    }

    scratch.clear();
    scratch.resize(payload_len as usize, 0);
    r.read_exact(scratch).await?;

    let msg = codec::decode(scratch, MAX_FRAME_PAYLOAD)?;
    Ok(Frame { version, msg })
}

/// Encode and write one frame as a single contiguous write.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    w: &mut W,
    frame: &Frame,
    scratch: &mut Vec<u8>,
) -> Result<(), ProtocolError> {
    scratch.clear();
    scratch.push(frame.version);
    scratch.extend_from_slice(&[0u8; 4]);
    codec::encode_into(scratch, &frame.msg)?;

    let payload_len = scratch.len() - HEADER_LEN;
    if payload_len > MAX_FRAME_PAYLOAD {
        return Err(ProtocolError::FrameTooLarge(payload_len as u32));
    }
    scratch[1..HEADER_LEN].copy_from_slice(&(payload_len as u32).to_be_bytes());

    w.write_all(scratch).await?;
    w.flush().await?;
    Ok(())
}

/// Server side of the handshake: receive the remote key, then send ours.
pub async fn server_handshake<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    local_public_key: &PublicKeyBytes,
) -> Result<PublicKeyBytes, ProtocolError> {
    let remote = receive_public_key(stream).await?;
    send_public_key(stream, local_public_key).await?;
    Ok(remote)
}

/// Client side of the handshake: send our key, then receive the remote key.
pub async fn client_handshake<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    local_public_key: &PublicKeyBytes,
) -> Result<PublicKeyBytes, ProtocolError> {
    send_public_key(stream, local_public_key).await?;
    receive_public_key(stream).await
}

async fn send_public_key<W: AsyncWrite + Unpin>(
    w: &mut W,
    public_key: &PublicKeyBytes,
) -> Result<(), ProtocolError> {
    let mut buf = [0u8; 4 + 32];
    buf[..4].copy_from_slice(&(public_key.len() as u32).to_be_bytes());
    buf[4..].copy_from_slice(public_key);
    w.write_all(&buf).await?;
    w.flush().await?;
    Ok(())
}

async fn receive_public_key<R: AsyncRead + Unpin>(
    r: &mut R,
) -> Result<PublicKeyBytes, ProtocolError> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf).await?;

    let key_len = u32::from_be_bytes(len_buf);
    if key_len > MAX_HANDSHAKE_KEY_LEN || key_len as usize != 32 {
        return Err(ProtocolError::HandshakeKeyLen(key_len));
    }

    let mut key = [0u8; 32];
    r.read_exact(&mut key).await?;
    Ok(key)
}
