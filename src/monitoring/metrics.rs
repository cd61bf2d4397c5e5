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

//! Transport and registry metrics.

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Prometheus registration failure.
    #[error("prometheus")]
    Prom,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Remote peers currently in the registry.
    pub connected_peers: IntGauge,
    /// Inbound messages decoded and dispatched.
    pub inbound_messages_total: IntCounter,
    /// Handshakes that failed before a connection was established.
    pub handshake_failures_total: IntCounter,
    /// Dial attempts that failed and were retried.
    pub dial_retries_total: IntCounter,
    /// Connections dropped after EOF or a read error.
    pub disconnects_total: IntCounter,
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let connected_peers =
            IntGauge::new("capsulenet_connected_peers", "Remote peers in the registry")
                .map_err(|_| MetricsError::Prom)?;
        let inbound_messages_total = IntCounter::new(
            "capsulenet_inbound_messages_total",
            "Inbound messages dispatched",
        )
        .map_err(|_| MetricsError::Prom)?;
        let handshake_failures_total = IntCounter::new(
            "capsulenet_handshake_failures_total",
            "Failed handshakes",
        )
        .map_err(|_| MetricsError::Prom)?;
        let dial_retries_total =
            IntCounter::new("capsulenet_dial_retries_total", "Retried dial attempts")
                .map_err(|_| MetricsError::Prom)?;
        let disconnects_total =
            IntCounter::new("capsulenet_disconnects_total", "Dropped connections")
                .map_err(|_| MetricsError::Prom)?;

        registry
            .register(Box::new(connected_peers.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(inbound_messages_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(handshake_failures_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(dial_retries_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(disconnects_total.clone()))
            .map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            connected_peers,
            inbound_messages_total,
            handshake_failures_total,
            dial_retries_total,
            disconnects_total,
        })
    }
}
