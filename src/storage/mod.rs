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

//! Embedded key-value persistence using sled.
//!
//! Values are bincode-encoded records. A [`Bucket`] is a named sled tree;
//! the identity record lives in the bucket configured on the peer.

use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database or tree could not be opened.
    #[error("db open")]
    Open,
    /// Read/write failure.
    #[error("db io")]
    Io,
    /// Record encode/decode failure.
    #[error("record codec")]
    Codec,
}

/// Persistent store rooted at a database directory.
#[derive(Clone)]
pub struct Store {
    db: sled::Db,
}

/// A named bucket of records.
#[derive(Clone)]
pub struct Bucket {
    tree: sled::Tree,
}

fn restrict_perms_best_effort(dir: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o700));
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    let _ = fs::set_permissions(entry.path(), fs::Permissions::from_mode(0o600));
                }
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
}

impl Store {
    /// Open (or create) the database directory at `path`.
    ///
    /// Parent directories are created mode 0700; database files are
    /// restricted to 0600, best-effort.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|_| StoreError::Open)?;
            restrict_perms_best_effort(parent);
        }
        let db = sled::open(path).map_err(|_| StoreError::Open)?;
        restrict_perms_best_effort(path);
        Ok(Self { db })
    }

    /// Open a named bucket.
    pub fn bucket(&self, name: &str) -> Result<Bucket, StoreError> {
        let tree = self.db.open_tree(name).map_err(|_| StoreError::Open)?;
        Ok(Bucket { tree })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush().map_err(|_| StoreError::Io)?;
        Ok(())
    }
}

impl Bucket {
    /// Fetch and decode the record under `key`, if present.
    pub fn find<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(raw) = self.tree.get(key).map_err(|_| StoreError::Io)? else {
            return Ok(None);
        };
        let value = bincode::deserialize(&raw).map_err(|_| StoreError::Codec)?;
        Ok(Some(value))
    }

    /// Encode and store `value` under `key`, replacing any prior record.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = bincode::serialize(value).map_err(|_| StoreError::Codec)?;
        self.tree.insert(key, raw).map_err(|_| StoreError::Io)?;
        self.tree.flush().map_err(|_| StoreError::Io)?;
        Ok(())
    }

    /// Remove the record under `key`. Removing a missing key is not an error.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.tree.remove(key).map_err(|_| StoreError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Rec {
        n: u64,
        tag: String,
    }

    #[test]
    fn save_find_delete_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(&dir.path().join("db")).expect("open");
        let bucket = store.bucket("user").expect("bucket");

        assert!(bucket.find::<Rec>("k").expect("find").is_none());

        let rec = Rec {
            n: 7,
            tag: "x".into(),
        };
        bucket.save("k", &rec).expect("save");
        assert_eq!(bucket.find::<Rec>("k").expect("find"), Some(rec));

        bucket.delete("k").expect("delete");
        assert!(bucket.find::<Rec>("k").expect("find").is_none());
        // deleting again is a no-op
        bucket.delete("k").expect("delete");
    }

    #[test]
    fn buckets_are_isolated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(&dir.path().join("db")).expect("open");
        let a = store.bucket("a").expect("bucket a");
        let b = store.bucket("b").expect("bucket b");

        a.save("k", &1u32).expect("save");
        assert!(b.find::<u32>("k").expect("find").is_none());
    }
}
