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

//! TCP transport: listener, bootstrap dialer and per-connection read loops.
//!
//! Every established connection (inbound or outbound) goes through the same
//! path: handshake, `on_connect`, then a dedicated read loop. A rejected
//! `on_connect` closes the socket before any read loop exists, so a
//! duplicate connection never leaves a dangling reader behind.

use crate::core::security::keystore::Keystore;
use crate::monitoring::metrics::Metrics;
use crate::networking::conn::{ConnError, RemotePeerConn};
use crate::networking::protocol::{client_handshake, server_handshake, ProtocolError};
use crate::networking::PeerHandler;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

const DIAL_RETRY_MAX: u32 = 5;
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Listener could not be bound.
    #[error("could not bind listener: {0}")]
    Bind(io::Error),
    /// All dial attempts to a peer failed.
    #[error("could not dial peer addr {addr} after {attempts} attempts: {source}")]
    DialExhausted {
        /// The address that was dialed.
        addr: String,
        /// How many attempts were made.
        attempts: u32,
        /// The last dial error.
        source: io::Error,
    },
    /// Handshake with the remote peer failed.
    #[error("handshake failed: {0}")]
    Handshake(#[from] ProtocolError),
    /// The orchestrator rejected the connection.
    #[error("connection rejected by peer orchestrator")]
    Rejected,
    /// The transport is shutting down.
    #[error("transport is shutting down")]
    Shutdown,
}

/// Transport configuration.
pub struct TcpTransportConfig<H> {
    /// Local listen address (`host:port`).
    pub addr: String,
    /// Peers dialed at startup, all concurrently.
    pub bootstrap_peers: Vec<String>,
    /// Local identity; its public half is exchanged in the handshake.
    pub keystore: Arc<Keystore>,
    /// Per-attempt dial timeout.
    pub dial_timeout: Duration,
    /// Lifecycle and message callbacks.
    pub handler: Arc<H>,
    /// Transport metrics.
    pub metrics: Arc<Metrics>,
}

/// Running TCP transport.
pub struct TcpTransport<H: PeerHandler> {
    inner: Arc<Inner<H>>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

struct Inner<H> {
    keystore: Arc<Keystore>,
    dial_timeout: Duration,
    handler: Arc<H>,
    metrics: Arc<Metrics>,
    shutdown: watch::Receiver<bool>,
    tasks: Mutex<JoinSet<()>>,
}

impl<H: PeerHandler> TcpTransport<H> {
    /// Bind the listener, start the accept loop and dial every bootstrap
    /// peer concurrently.
    pub async fn start(
        cfg: TcpTransportConfig<H>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(&cfg.addr)
            .await
            .map_err(TransportError::Bind)?;
        let local_addr = listener.local_addr().map_err(TransportError::Bind)?;

        let inner = Arc::new(Inner {
            keystore: cfg.keystore,
            dial_timeout: cfg.dial_timeout,
            handler: cfg.handler,
            metrics: cfg.metrics,
            shutdown,
            tasks: Mutex::new(JoinSet::new()),
        });

        info!(%local_addr, "transport listening");

        for addr in cfg.bootstrap_peers {
            let dialer = inner.clone();
            inner.tasks.lock().expect("task set lock").spawn(async move {
                match dialer.connect(&addr).await {
                    Ok(conn) => {
                        debug!(peer = conn.public_key_str().short(), %addr, "bootstrap peer connected");
                    }
                    Err(err) => {
                        warn!(%addr, %err, "bootstrap dial failed");
                    }
                }
            });
        }

        let accept_task = tokio::spawn(inner.clone().accept_loop(listener));

        Ok(Self {
            inner,
            local_addr,
            accept_task,
        })
    }

    /// The bound listen address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Dial a peer outside the bootstrap list.
    pub async fn connect_to_peer(&self, addr: &str) -> Result<Arc<RemotePeerConn>, TransportError> {
        self.inner.clone().connect(addr).await
    }

    /// Wait for the accept loop to exit and all read loops to drain.
    /// Returns once shutdown is complete.
    pub async fn wait(self) {
        let _ = self.accept_task.await;
    }
}

impl<H: PeerHandler> Inner<H> {
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        let mut shutdown = self.shutdown.clone();
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                res = listener.accept() => match res {
                    Ok((stream, remote_addr)) => self.clone().handle_inbound(stream, remote_addr).await,
                    Err(err) => {
                        // A closed listener during shutdown is expected.
                        if *shutdown.borrow() {
                            break;
                        }
                        warn!(%err, "accept failed");
                    }
                }
            }
        }

        info!("listener shutting down, waiting for inflight connections");
        let mut tasks = std::mem::take(&mut *self.tasks.lock().expect("task set lock"));
        while tasks.join_next().await.is_some() {}
        info!("transport drained");
    }

    async fn handle_inbound(self: Arc<Self>, mut stream: TcpStream, remote_addr: SocketAddr) {
        let local_public_key = self.keystore.public_key();
        match server_handshake(&mut stream, &local_public_key).await {
            Ok(remote_public_key) => {
                let conn = Arc::new(RemotePeerConn::new(remote_public_key, stream));
                self.install(conn).await;
            }
            Err(err) => {
                self.metrics.handshake_failures_total.inc();
                warn!(%remote_addr, %err, "inbound handshake failed, dropping connection");
            }
        }
    }

    /// Hand a handshaken connection to the orchestrator and, if accepted,
    /// start its read loop.
    async fn install(self: Arc<Self>, conn: Arc<RemotePeerConn>) -> bool {
        match self.handler.on_connect(conn.clone()).await {
            Ok(()) => {
                info!(
                    peer = conn.public_key_str().short(),
                    conn_id = %conn.id(),
                    "remote peer connected"
                );
                let reader = self.clone();
                self.tasks
                    .lock()
                    .expect("task set lock")
                    .spawn(reader.read_loop(conn));
                true
            }
            Err(err) => {
                debug!(
                    peer = conn.public_key_str().short(),
                    %err,
                    "connection rejected, closing socket"
                );
                let _ = conn.close().await;
                false
            }
        }
    }

    async fn read_loop(self: Arc<Self>, conn: Arc<RemotePeerConn>) {
        let mut shutdown = self.shutdown.clone();
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                res = conn.recv() => match res {
                    Ok(frame) => {
                        self.metrics.inbound_messages_total.inc();
                        self.handler.on_message(conn.clone(), frame.msg).await;
                    }
                    Err(err) => {
                        if is_clean_eof(&err) {
                            info!(
                                peer = conn.public_key_str().short(),
                                "remote peer closed the connection"
                            );
                        } else {
                            warn!(
                                peer = conn.public_key_str().short(),
                                %err,
                                "read failed, dropping connection"
                            );
                        }
                        self.metrics.disconnects_total.inc();
                        self.handler.on_disconnect(conn.public_key_str()).await;
                        break;
                    }
                }
            }
        }
        let _ = conn.close().await;
    }

    async fn connect(self: Arc<Self>, addr: &str) -> Result<Arc<RemotePeerConn>, TransportError> {
        let mut shutdown = self.shutdown.clone();
        let mut delay = INITIAL_RETRY_DELAY;
        let mut last_err = io::Error::new(io::ErrorKind::TimedOut, "dial timed out");

        for attempt in 1..=DIAL_RETRY_MAX {
            match self.dial(addr).await {
                Ok(stream) => return self.finish_outbound(stream).await,
                Err(err) => {
                    warn!(
                        %addr,
                        attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        %err,
                        "dial failed"
                    );
                    self.metrics.dial_retries_total.inc();
                    last_err = err;
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        res = shutdown.changed() => {
                            if res.is_err() || *shutdown.borrow() {
                                return Err(TransportError::Shutdown);
                            }
                        }
                    }
                    delay *= 2;
                }
            }
        }

        Err(TransportError::DialExhausted {
            addr: addr.to_string(),
            attempts: DIAL_RETRY_MAX,
            source: last_err,
        })
    }

    async fn dial(&self, addr: &str) -> io::Result<TcpStream> {
        match tokio::time::timeout(self.dial_timeout, TcpStream::connect(addr)).await {
            Ok(res) => res,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "dial timed out")),
        }
    }

    async fn finish_outbound(
        self: Arc<Self>,
        mut stream: TcpStream,
    ) -> Result<Arc<RemotePeerConn>, TransportError> {
        let local_public_key = self.keystore.public_key();
        let remote_public_key = match client_handshake(&mut stream, &local_public_key).await {
            Ok(key) => key,
            Err(err) => {
                self.metrics.handshake_failures_total.inc();
                return Err(TransportError::Handshake(err));
            }
        };

        let conn = Arc::new(RemotePeerConn::new(remote_public_key, stream));
        if self.install(conn.clone()).await {
            Ok(conn)
        } else {
            Err(TransportError::Rejected)
        }
    }
}

fn is_clean_eof(err: &ConnError) -> bool {
    matches!(
        err,
        ConnError::Protocol(ProtocolError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof
    )
}
