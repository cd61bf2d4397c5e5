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

//! Feature-level handlers the message dispatcher routes into.
//!
//! The transport core does not interpret capsule semantics; it hands each
//! decoded message to exactly one of these handlers. A handler that expects
//! a follow-on chunk calls `receive_chunk` on the connection itself - the
//! dispatcher never reads ahead.

use crate::networking::conn::RemotePeerConn;
use crate::networking::message::{
    CapsuleStream, CapsuleStreamChunk, ContinueCapsuleStream, HeartbeatCheck, ReCapsuleStream,
};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Capsule and heartbeat handlers.
///
/// Every method has a log-and-drop default, so an implementation only
/// overrides the variants it serves.
pub trait FeatureHandler: Send + Sync + 'static {
    /// A guardian is being offered a capsule stream.
    fn handle_capsule_stream(
        &self,
        conn: Arc<RemotePeerConn>,
        msg: CapsuleStream,
    ) -> impl Future<Output = ()> + Send {
        async move {
            debug!(peer = conn.public_key_str().short(), stream = %msg.id, "capsule stream ignored");
        }
    }

    /// A chunk descriptor arrived outside of a `receive_chunk` call.
    fn handle_capsule_stream_chunk(
        &self,
        conn: Arc<RemotePeerConn>,
        msg: CapsuleStreamChunk,
    ) -> impl Future<Output = ()> + Send {
        async move {
            debug!(
                peer = conn.public_key_str().short(),
                stream = %msg.id,
                seq = msg.seq,
                "unsolicited capsule chunk ignored"
            );
        }
    }

    /// A capsule is being re-streamed to a fresh guardian set.
    fn handle_re_capsule_stream(
        &self,
        conn: Arc<RemotePeerConn>,
        msg: ReCapsuleStream,
    ) -> impl Future<Output = ()> + Send {
        async move {
            debug!(peer = conn.public_key_str().short(), stream = %msg.id, "re-capsule stream ignored");
        }
    }

    /// An interrupted stream is being resumed.
    fn handle_continue_capsule_stream(
        &self,
        conn: Arc<RemotePeerConn>,
        msg: ContinueCapsuleStream,
    ) -> impl Future<Output = ()> + Send {
        async move {
            debug!(
                peer = conn.public_key_str().short(),
                capsule = %msg.capsule_id,
                offset = msg.offset_chunk_num,
                "continue capsule stream ignored"
            );
        }
    }

    /// The remote peer asks us to drop a capsule.
    fn handle_delete_capsule(&self, conn: Arc<RemotePeerConn>) -> impl Future<Output = ()> + Send {
        async move {
            debug!(peer = conn.public_key_str().short(), "delete capsule ignored");
        }
    }

    /// Liveness probe for a capsule owner.
    fn handle_heartbeat_check(
        &self,
        conn: Arc<RemotePeerConn>,
        msg: HeartbeatCheck,
    ) -> impl Future<Output = ()> + Send {
        async move {
            debug!(peer = conn.public_key_str().short(), capsule = %msg.capsule_id, "heartbeat check ignored");
        }
    }

    /// A recovery ceremony is starting.
    fn handle_recovery_ceremony(
        &self,
        conn: Arc<RemotePeerConn>,
    ) -> impl Future<Output = ()> + Send {
        async move {
            debug!(peer = conn.public_key_str().short(), "recovery ceremony ignored");
        }
    }
}

/// Default handler set: logs and drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogFeatures;

impl FeatureHandler for LogFeatures {}
