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

//! The peer orchestrator.
//!
//! Owns the registry of live remote connections, provides the transport
//! callbacks, and routes inbound messages to the feature handlers. Boot
//! sequence: open the store, load or create the identity, start the
//! transport, then serve until the shutdown signal fires.

use crate::core::security::keystore::Keystore;
use crate::core::types::PeerKey;
use crate::features::FeatureHandler;
use crate::monitoring::metrics::Metrics;
use crate::networking::conn::RemotePeerConn;
use crate::networking::message::Message;
use crate::networking::tcp::{TcpTransport, TcpTransportConfig};
use crate::networking::PeerHandler;
use crate::storage::Store;
use anyhow::{bail, Context};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// A registry entry older than this may be replaced by a newer connection
/// for the same key.
pub const STALE_CONN_THRESHOLD: Duration = Duration::from_secs(35 * 60);

/// Advisory default for `min_connected_peers`.
pub const DEFAULT_MIN_CONNECTED_PEERS: usize = 50;

/// Peer configuration.
#[derive(Clone, Debug)]
pub struct PeerConfig {
    /// Local listen address (`host:port`).
    pub addr: String,
    /// Bootstrap peers dialed at startup. Must be non-empty.
    pub bootstrap_peers: Vec<String>,
    /// Store bucket holding the identity record. Must be non-empty.
    pub identity_bucket: String,
    /// Advisory lower bound on connected remote peers; not enforced.
    pub min_connected_peers: usize,
    /// Root data directory; peer state lives under `<data_dir>/<addr>`.
    pub data_dir: PathBuf,
    /// Per-attempt dial timeout.
    pub dial_timeout: Duration,
}

impl PeerConfig {
    fn validate(&self) -> anyhow::Result<()> {
        if self.addr.is_empty() {
            bail!("addr cannot be empty");
        }
        if self.bootstrap_peers.is_empty() {
            bail!("bootstrap_peers cannot be empty");
        }
        if self.identity_bucket.is_empty() {
            bail!("identity_bucket cannot be empty");
        }
        if self.dial_timeout.is_zero() {
            bail!("dial_timeout cannot be zero");
        }
        Ok(())
    }
}

/// One running node: registry, callbacks and boot sequence.
pub struct Peer<F> {
    cfg: PeerConfig,
    features: F,
    metrics: Arc<Metrics>,
    registry: RwLock<HashMap<PeerKey, Arc<RemotePeerConn>>>,
}

impl<F: FeatureHandler> Peer<F> {
    /// Validate the configuration and construct the peer.
    pub fn new(cfg: PeerConfig, features: F) -> anyhow::Result<Arc<Self>> {
        cfg.validate()?;
        let metrics = Arc::new(Metrics::new()?);
        Ok(Arc::new(Self {
            cfg,
            features,
            metrics,
            registry: RwLock::new(HashMap::new()),
        }))
    }

    /// Transport and registry metrics.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Number of live registry entries.
    pub fn connected_peers(&self) -> usize {
        self.registry.read().expect("registry lock").len()
    }

    /// Look up a live connection by key string.
    pub fn remote_peer(&self, key: &PeerKey) -> Option<Arc<RemotePeerConn>> {
        self.registry.read().expect("registry lock").get(key).cloned()
    }

    /// Key strings of all live registry entries.
    pub fn peers(&self) -> Vec<PeerKey> {
        self.registry
            .read()
            .expect("registry lock")
            .keys()
            .cloned()
            .collect()
    }

    /// Boot the peer and serve until `shutdown` flips.
    ///
    /// Fatal startup failures (bad config, store, identity, bind) surface
    /// as errors; everything after that is handled by the transport loops.
    pub async fn run(
        self: Arc<Self>,
        password: &str,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let peer_dir = self.cfg.data_dir.join(&self.cfg.addr);
        let store = Store::open(&peer_dir.join("db")).context("open store")?;
        let bucket = store
            .bucket(&self.cfg.identity_bucket)
            .context("open identity bucket")?;
        let keystore = Arc::new(Keystore::open(&bucket, password).context("init identity")?);

        info!(
            addr = %self.cfg.addr,
            public_key = PeerKey::from_bytes(&keystore.public_key()).short(),
            "peer identity ready"
        );

        let transport = TcpTransport::start(
            TcpTransportConfig {
                addr: self.cfg.addr.clone(),
                bootstrap_peers: self.cfg.bootstrap_peers.clone(),
                keystore,
                dial_timeout: self.cfg.dial_timeout,
                handler: self.clone(),
                metrics: self.metrics.clone(),
            },
            shutdown.clone(),
        )
        .await
        .context("start transport")?;

        let advisory = tokio::spawn(self.clone().advisory_loop(shutdown));

        transport.wait().await;
        let _ = advisory.await;

        // Drop whatever the read loops left behind, then persist.
        self.registry.write().expect("registry lock").clear();
        self.metrics.connected_peers.set(0);
        store.flush().context("flush store")?;
        info!(addr = %self.cfg.addr, "peer stopped");
        Ok(())
    }

    async fn advisory_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let connected = self.connected_peers();
                    if connected < self.cfg.min_connected_peers {
                        debug!(
                            connected,
                            minimum = self.cfg.min_connected_peers,
                            "below advisory peer minimum"
                        );
                    }
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

impl<F: FeatureHandler> PeerHandler for Peer<F> {
    async fn on_connect(&self, conn: Arc<RemotePeerConn>) -> anyhow::Result<()> {
        let key = conn.public_key_str().clone();
        let mut registry = self.registry.write().expect("registry lock");
        match registry.entry(key) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_stale(STALE_CONN_THRESHOLD) {
                    info!(peer = entry.key().short(), "replacing stale registry entry");
                    entry.insert(conn);
                } else {
                    bail!("already connected to peer {}", entry.key().short());
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(conn);
            }
        }
        self.metrics.connected_peers.set(registry.len() as i64);
        Ok(())
    }

    async fn on_disconnect(&self, key: &PeerKey) {
        let mut registry = self.registry.write().expect("registry lock");
        if registry.remove(key).is_some() {
            info!(peer = key.short(), "remote peer removed from registry");
        }
        self.metrics.connected_peers.set(registry.len() as i64);
    }

    async fn on_message(&self, conn: Arc<RemotePeerConn>, msg: Message) {
        debug!(
            peer = conn.public_key_str().short(),
            command = msg.command(),
            "inbound message"
        );
        match msg {
            Message::CapsuleStream(m) => self.features.handle_capsule_stream(conn, m).await,
            Message::CapsuleStreamChunk(m) => {
                self.features.handle_capsule_stream_chunk(conn, m).await
            }
            Message::ReCapsuleStream(m) => self.features.handle_re_capsule_stream(conn, m).await,
            Message::ContinueCapsuleStream(m) => {
                self.features.handle_continue_capsule_stream(conn, m).await
            }
            Message::DeleteCapsule => self.features.handle_delete_capsule(conn).await,
            Message::HeartbeatCheck(m) => self.features.handle_heartbeat_check(conn, m).await,
            Message::RecoveryCeremony => self.features.handle_recovery_ceremony(conn).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::now_nanos;
    use crate::features::LogFeatures;
    use tokio::net::{TcpListener, TcpStream};

    fn test_peer() -> Arc<Peer<LogFeatures>> {
        Peer::new(
            PeerConfig {
                addr: "127.0.0.1:0".into(),
                bootstrap_peers: vec!["127.0.0.1:1".into()],
                identity_bucket: "user".into(),
                min_connected_peers: DEFAULT_MIN_CONNECTED_PEERS,
                data_dir: PathBuf::from("."),
                dial_timeout: Duration::from_secs(1),
            },
            LogFeatures,
        )
        .expect("peer")
    }

    async fn conn_with_key(key_byte: u8) -> Arc<RemotePeerConn> {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (client, _server) =
            tokio::join!(TcpStream::connect(addr), async { listener.accept().await.unwrap() });
        Arc::new(RemotePeerConn::new([key_byte; 32], client.expect("connect")))
    }

    #[tokio::test]
    async fn duplicate_fresh_connection_is_rejected() {
        let peer = test_peer();
        let first = conn_with_key(7).await;
        let now = now_nanos();
        first.set_last_ops(now, now);

        peer.on_connect(first.clone()).await.expect("insert");
        assert_eq!(peer.connected_peers(), 1);

        let second = conn_with_key(7).await;
        assert!(peer.on_connect(second).await.is_err());
        assert_eq!(peer.connected_peers(), 1);

        // the retained entry is the first connection
        let live = peer.remote_peer(first.public_key_str()).expect("entry");
        assert_eq!(live.id(), first.id());
    }

    #[tokio::test]
    async fn stale_entry_is_replaced() {
        let peer = test_peer();
        let first = conn_with_key(9).await;
        let hour_ago = now_nanos() - Duration::from_secs(3600).as_nanos() as u64;
        first.set_last_ops(hour_ago, hour_ago);

        peer.on_connect(first.clone()).await.expect("insert");

        let second = conn_with_key(9).await;
        peer.on_connect(second.clone()).await.expect("replace");
        assert_eq!(peer.connected_peers(), 1);

        let live = peer.remote_peer(second.public_key_str()).expect("entry");
        assert_eq!(live.id(), second.id());
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let peer = test_peer();
        let conn = conn_with_key(3).await;
        let now = now_nanos();
        conn.set_last_ops(now, now);
        let key = conn.public_key_str().clone();

        peer.on_connect(conn).await.expect("insert");
        assert_eq!(peer.connected_peers(), 1);

        peer.on_disconnect(&key).await;
        assert_eq!(peer.connected_peers(), 0);
        peer.on_disconnect(&key).await;
        assert_eq!(peer.connected_peers(), 0);
    }

    #[test]
    fn config_validation_rejects_empty_fields() {
        let base = PeerConfig {
            addr: "127.0.0.1:0".into(),
            bootstrap_peers: vec!["127.0.0.1:1".into()],
            identity_bucket: "user".into(),
            min_connected_peers: 1,
            data_dir: PathBuf::from("."),
            dial_timeout: Duration::from_secs(1),
        };
        assert!(base.validate().is_ok());

        let mut bad = base.clone();
        bad.addr = String::new();
        assert!(bad.validate().is_err());

        let mut bad = base.clone();
        bad.bootstrap_peers = vec![];
        assert!(bad.validate().is_err());

        let mut bad = base.clone();
        bad.identity_bucket = String::new();
        assert!(bad.validate().is_err());

        let mut bad = base;
        bad.dial_timeout = Duration::ZERO;
        assert!(bad.validate().is_err());
    }
}
