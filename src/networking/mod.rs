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

//! Networking stack: payload codec, wire protocol, connections, transport.

use crate::core::types::PeerKey;
use crate::networking::conn::RemotePeerConn;
use crate::networking::message::Message;
use std::future::Future;
use std::sync::Arc;

/// Payload encoding for the message catalogue.
pub mod codec;
/// Per-connection state and I/O serialization.
pub mod conn;
/// The closed message catalogue.
pub mod message;
/// Frame I/O and the public-key handshake.
pub mod protocol;
/// TCP listener, dialer and per-connection read loops.
pub mod tcp;

/// Connection lifecycle and message callbacks, implemented by the peer
/// orchestrator.
///
/// `on_connect` may reject a connection (for example a duplicate of a live
/// registry entry); the transport then closes the socket and never starts a
/// read loop for it.
pub trait PeerHandler: Send + Sync + 'static {
    /// A handshaken connection is ready. Returning an error rejects it.
    fn on_connect(
        &self,
        conn: Arc<RemotePeerConn>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// The connection for `key` is gone. Must be idempotent.
    fn on_disconnect(&self, key: &PeerKey) -> impl Future<Output = ()> + Send;

    /// One decoded inbound message from `conn`.
    fn on_message(
        &self,
        conn: Arc<RemotePeerConn>,
        msg: Message,
    ) -> impl Future<Output = ()> + Send;
}
