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

//! The closed message catalogue carried in frame payloads.
//!
//! The enum variant tag is the wire discriminator: adding a message type is
//! a single source change here plus a dispatcher arm, and an unknown tag
//! fails decoding instead of being silently dropped.

use crate::core::types::PublicKeyBytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Announces an incoming capsule stream to a guardian.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapsuleStream {
    /// Stream id.
    pub id: Uuid,
    /// Public keys of all guardians holding a share of the capsule.
    pub guardian_public_keys: Vec<PublicKeyBytes>,
    /// Dial addresses of the guardians.
    pub guardian_addrs: Vec<String>,
    /// Total capsule size in bytes.
    pub total_size: u64,
    /// Size of each chunk that follows.
    pub chunk_size: u32,
    /// Grace period before a missed heartbeat is acted on.
    pub heartbeat_grace: Duration,
}

/// Descriptor for one chunk of a capsule stream. On the wire it is
/// immediately followed by `size` raw payload bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapsuleStreamChunk {
    /// True for the last chunk of the stream.
    pub is_final: bool,
    /// Stream id this chunk belongs to.
    pub id: Uuid,
    /// Chunk sequence number.
    pub seq: u32,
    /// Number of raw bytes following the descriptor frame.
    pub size: u64,
}

/// Requests re-capsuling to a fresh guardian set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReCapsuleStream {
    /// Stream id.
    pub id: Uuid,
    /// Public keys of the new guardian set.
    pub guardian_public_keys: Vec<PublicKeyBytes>,
    /// Dial addresses of the new guardian set.
    pub guardian_addrs: Vec<String>,
    /// Total capsule size in bytes.
    pub total_size: u64,
    /// Grace period before a missed heartbeat is acted on.
    pub heartbeat_grace: Duration,
}

/// Resumes an interrupted capsule stream from a chunk offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinueCapsuleStream {
    /// Stream id.
    pub id: Uuid,
    /// Capsule being resumed.
    pub capsule_id: Uuid,
    /// First chunk number to resend.
    pub offset_chunk_num: u16,
}

/// Liveness probe for the owner of a capsule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatCheck {
    /// Probe id.
    pub id: Uuid,
    /// Capsule the probe concerns.
    pub capsule_id: Uuid,
    /// Public key of the user being checked.
    pub user_public_key: Vec<u8>,
}

/// One message exchanged between peers, tagged by variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Start of a capsule stream.
    CapsuleStream(CapsuleStream),
    /// Chunk descriptor, followed by raw bytes on the wire.
    CapsuleStreamChunk(CapsuleStreamChunk),
    /// Re-capsule request.
    ReCapsuleStream(ReCapsuleStream),
    /// Stream resumption request.
    ContinueCapsuleStream(ContinueCapsuleStream),
    /// Capsule deletion request.
    DeleteCapsule,
    /// Owner liveness probe.
    HeartbeatCheck(HeartbeatCheck),
    /// Start of a recovery ceremony.
    RecoveryCeremony,
}

impl Message {
    /// Short command name for logs.
    pub fn command(&self) -> &'static str {
        match self {
            Message::CapsuleStream(_) => "capsule_stream",
            Message::CapsuleStreamChunk(_) => "capsule_stream_chunk",
            Message::ReCapsuleStream(_) => "re_capsule_stream",
            Message::ContinueCapsuleStream(_) => "continue_capsule_stream",
            Message::DeleteCapsule => "delete_capsule",
            Message::HeartbeatCheck(_) => "heartbeat_check",
            Message::RecoveryCeremony => "recovery_ceremony",
        }
    }
}
