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

use capsulenet::core::security::keystore::Keystore;
use capsulenet::features::LogFeatures;
use capsulenet::monitoring::metrics::Metrics;
use capsulenet::networking::tcp::{TcpTransport, TcpTransportConfig, TransportError};
use capsulenet::peer::{Peer, PeerConfig};
use capsulenet::storage::Store;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

fn refused_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    addr.to_string()
}

// A dead target is retried five times with doubling backoff
// (500 + 1000 + 2000 + 4000 + 8000 ms) before the last error surfaces.
#[tokio::test]
async fn dial_retries_back_off_before_failing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Store::open(&dir.path().join("db")).expect("store");
    let bucket = store.bucket("user").expect("bucket");
    let keystore = Arc::new(Keystore::open(&bucket, "p").expect("keystore"));

    let handler = Peer::new(
        PeerConfig {
            addr: "127.0.0.1:0".into(),
            bootstrap_peers: vec![refused_addr()],
            identity_bucket: "user".into(),
            min_connected_peers: 1,
            data_dir: PathBuf::from(dir.path()),
            dial_timeout: Duration::from_secs(1),
        },
        LogFeatures,
    )
    .expect("handler");

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let transport = TcpTransport::start(
        TcpTransportConfig {
            addr: "127.0.0.1:0".into(),
            bootstrap_peers: vec![],
            keystore,
            dial_timeout: Duration::from_secs(1),
            handler,
            metrics: Arc::new(Metrics::new().expect("metrics")),
        },
        shutdown_rx,
    )
    .await
    .expect("transport");

    let target = refused_addr();
    let started = Instant::now();
    let res = transport.connect_to_peer(&target).await;
    let elapsed = started.elapsed();

    match res {
        Err(TransportError::DialExhausted { addr, attempts, .. }) => {
            assert_eq!(addr, target);
            assert_eq!(attempts, 5);
        }
        other => panic!("expected DialExhausted, got {:?}", other.map(|_| ())),
    }

    assert!(
        elapsed >= Duration::from_millis(15_500),
        "backoff too short: {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_secs(25),
        "backoff unexpectedly long: {elapsed:?}"
    );
}
