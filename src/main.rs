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

//! Capsulenet node entrypoint.
//!
//! Configuration comes from an optional TOML file (`CAPSULENET_CONFIG`)
//! overridden by environment variables. The identity passphrase is always
//! taken from `CAPSULENET_PASSPHRASE`.

use anyhow::Context;
use capsulenet::features::LogFeatures;
use capsulenet::peer::{Peer, PeerConfig, DEFAULT_MIN_CONNECTED_PEERS};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    addr: Option<String>,
    bootstrap_peers: Option<Vec<String>>,
    identity_bucket: Option<String>,
    min_connected_peers: Option<usize>,
    data_dir: Option<String>,
    dial_timeout_ms: Option<u64>,
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn load_config() -> anyhow::Result<PeerConfig> {
    let file: FileConfig = match env("CAPSULENET_CONFIG") {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("read config file {path}"))?;
            toml::from_str(&raw).with_context(|| format!("parse config file {path}"))?
        }
        None => FileConfig::default(),
    };

    let addr = env("CAPSULENET_ADDR")
        .or(file.addr)
        .unwrap_or_else(|| "127.0.0.1:3000".to_string());

    let bootstrap_peers = match env("CAPSULENET_BOOTSTRAP") {
        Some(list) => list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => file.bootstrap_peers.unwrap_or_default(),
    };

    let identity_bucket = env("CAPSULENET_BUCKET")
        .or(file.identity_bucket)
        .unwrap_or_else(|| "user".to_string());

    let min_connected_peers = env("CAPSULENET_MIN_PEERS")
        .and_then(|v| v.parse().ok())
        .or(file.min_connected_peers)
        .unwrap_or(DEFAULT_MIN_CONNECTED_PEERS);

    let data_dir = PathBuf::from(
        env("CAPSULENET_DATA_DIR")
            .or(file.data_dir)
            .unwrap_or_else(|| "./.capsulenet".to_string()),
    );

    let dial_timeout = Duration::from_millis(
        env("CAPSULENET_DIAL_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .or(file.dial_timeout_ms)
            .unwrap_or(2000),
    );

    Ok(PeerConfig {
        addr,
        bootstrap_peers,
        identity_bucket,
        min_connected_peers,
        data_dir,
        dial_timeout,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .try_init();

    let cfg = load_config()?;
    let password =
        env("CAPSULENET_PASSPHRASE").context("set CAPSULENET_PASSPHRASE to unlock the identity")?;

    let peer = Peer::new(cfg, LogFeatures)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    peer.run(&password, shutdown_rx).await
}
