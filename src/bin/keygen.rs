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

//! Initialize (or inspect) a peer identity and print its public key.
//!
//! Usage: `CAPSULENET_PASSPHRASE=... keygen [data_dir] [bucket]`

use anyhow::{Context, Result};
use capsulenet::core::security::keystore::Keystore;
use capsulenet::storage::Store;
use std::path::PathBuf;

fn main() -> Result<()> {
    let data_dir = std::env::args().nth(1).unwrap_or_else(|| "data".to_string());
    let bucket_name = std::env::args().nth(2).unwrap_or_else(|| "user".to_string());
    let password = std::env::var("CAPSULENET_PASSPHRASE")
        .context("set CAPSULENET_PASSPHRASE to protect the identity")?;

    let db_path = PathBuf::from(data_dir).join("db");
    let store = Store::open(&db_path).context("open store")?;
    let bucket = store.bucket(&bucket_name).context("open bucket")?;
    let keystore = Keystore::open(&bucket, &password).context("init identity")?;

    println!("{}", hex::encode(keystore.public_key()));
    Ok(())
}
