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
#![warn(missing_docs)]

//! Capsulenet - a peer-to-peer node with authenticated TCP connections.
//!
//! This crate provides:
//! - A password-derived Ed25519 identity, encrypted at rest in an embedded store
//! - A version-tagged, length-prefixed wire protocol with a public-key handshake
//! - A concurrent TCP transport (listener, bootstrap dialer, per-connection read loops)
//! - A registry of live remote peers keyed by long-term public identity
//! - Chunked bulk transfer layered on top of the frame protocol

/// Core primitives (key representations, time, identity keystore).
pub mod core;
/// Capsule and heartbeat feature dispatch surface.
pub mod features;
/// Observability (Prometheus metrics).
pub mod monitoring;
/// Networking stack (wire protocol, connections, TCP transport).
pub mod networking;
/// Peer orchestrator: registry, callbacks, boot sequence.
pub mod peer;
/// Embedded key-value persistence (sled).
pub mod storage;
