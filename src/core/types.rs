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

//! Public-key representations and time helpers.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Raw Ed25519 public key bytes.
pub type PublicKeyBytes = [u8; 32];

/// Stable, hashable encoding of a remote peer's public key, used as the
/// registry map key. The encoding is lowercase hex and never changes for
/// the lifetime of the underlying bytes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerKey(String);

impl PeerKey {
    /// Encode raw public key bytes.
    pub fn from_bytes(public_key: &PublicKeyBytes) -> Self {
        Self(hex::encode(public_key))
    }

    /// Full key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short display form for logs (first six characters).
    pub fn short(&self) -> &str {
        &self.0[..6]
    }
}

impl fmt::Display for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerKey({})", self.short())
    }
}

/// Nanoseconds since the UNIX epoch. `0` is reserved for "never".
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_key_is_stable_hex() {
        let mut pk = [0u8; 32];
        pk[0] = 0xab;
        pk[31] = 0x01;
        let key = PeerKey::from_bytes(&pk);
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().starts_with("ab0000"));
        assert_eq!(key.short(), "ab0000");
        assert_eq!(key, PeerKey::from_bytes(&pk));
    }

    #[test]
    fn now_nanos_is_monotonic_enough() {
        let a = now_nanos();
        let b = now_nanos();
        assert!(b >= a);
        assert!(a > 0);
    }
}
