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

//! Keystore: the peer's long-term Ed25519 identity.
//!
//! The private half is stored encrypted at rest in the embedded store:
//! AES-256-GCM over the Ed25519 PKCS#8 document, keyed by
//! `scrypt(password, salt)`. The record keeps the public key alongside the
//! ciphertext so a successful decryption can be cross-checked against it.

use ring::{
    aead,
    rand::{SecureRandom, SystemRandom},
    signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

use crate::core::types::PublicKeyBytes;
use crate::storage::{Bucket, StoreError};

const IDENTITY_KEY: &str = "identity";

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;

// scrypt cost parameters: N = 2^15 = 32768, r = 8, p = 1.
const SCRYPT_LOG_N: u8 = 15;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

/// Keystore errors.
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// Underlying store failure.
    #[error("store: {0}")]
    Store(#[from] StoreError),
    /// Randomness, KDF or AEAD failure.
    #[error("crypto failure")]
    Crypto,
    /// Ciphertext did not authenticate: wrong password or corrupted record.
    #[error("wrong password or corrupted identity record")]
    BadPassword,
    /// Decrypted bytes are not a valid keypair matching the stored public key.
    #[error("invalid identity key material")]
    InvalidKey,
}

/// Persisted identity record. Created once per peer, never mutated.
#[derive(Debug, Serialize, Deserialize)]
struct IdentityRecord {
    public_key: PublicKeyBytes,
    enc_private_key: Vec<u8>,
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
}

/// The peer's identity keypair, loaded or created from the store.
pub struct Keystore {
    keypair: Ed25519KeyPair,
    public_key: PublicKeyBytes,
}

fn derive_aead_key(password: &[u8], salt: &[u8]) -> Result<[u8; 32], KeystoreError> {
    let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, 32)
        .map_err(|_| KeystoreError::Crypto)?;
    let mut out = [0u8; 32];
    scrypt::scrypt(password, salt, &params, &mut out).map_err(|_| KeystoreError::Crypto)?;
    Ok(out)
}

fn aead_seal(key: &mut [u8; 32], nonce: [u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>, KeystoreError> {
    let unbound =
        aead::UnboundKey::new(&aead::AES_256_GCM, key.as_ref()).map_err(|_| KeystoreError::Crypto)?;
    let less_safe = aead::LessSafeKey::new(unbound);

    let mut in_out = plaintext.to_vec();
    less_safe
        .seal_in_place_append_tag(
            aead::Nonce::assume_unique_for_key(nonce),
            aead::Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| KeystoreError::Crypto)?;
    key.zeroize();
    Ok(in_out)
}

fn aead_open(key: &mut [u8; 32], nonce: [u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>, KeystoreError> {
    let unbound =
        aead::UnboundKey::new(&aead::AES_256_GCM, key.as_ref()).map_err(|_| KeystoreError::Crypto)?;
    let less_safe = aead::LessSafeKey::new(unbound);

    let mut in_out = ciphertext.to_vec();
    let plain = less_safe
        .open_in_place(
            aead::Nonce::assume_unique_for_key(nonce),
            aead::Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| KeystoreError::BadPassword)?;
    let out = plain.to_vec();
    key.zeroize();
    in_out.zeroize();
    Ok(out)
}

impl Keystore {
    /// Load the identity from `bucket`, or create and persist a new one.
    ///
    /// Loading fails with [`KeystoreError::BadPassword`] when the password
    /// does not decrypt the stored private key.
    pub fn open(bucket: &Bucket, password: &str) -> Result<Self, KeystoreError> {
        if let Some(record) = bucket.find::<IdentityRecord>(IDENTITY_KEY)? {
            tracing::info!("loading existing identity");
            return Self::load(&record, password);
        }

        tracing::info!("creating new identity");
        let rng = SystemRandom::new();

        let mut salt = [0u8; SALT_LEN];
        rng.fill(&mut salt).map_err(|_| KeystoreError::Crypto)?;
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill(&mut nonce).map_err(|_| KeystoreError::Crypto)?;

        let pkcs8 =
            Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| KeystoreError::InvalidKey)?;
        let keypair =
            Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).map_err(|_| KeystoreError::InvalidKey)?;

        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(keypair.public_key().as_ref());

        let mut aead_key = derive_aead_key(password.as_bytes(), &salt)?;
        let enc_private_key = aead_seal(&mut aead_key, nonce, pkcs8.as_ref())?;

        bucket.save(
            IDENTITY_KEY,
            &IdentityRecord {
                public_key,
                enc_private_key,
                salt,
                nonce,
            },
        )?;

        Ok(Self {
            keypair,
            public_key,
        })
    }

    fn load(record: &IdentityRecord, password: &str) -> Result<Self, KeystoreError> {
        let mut aead_key = derive_aead_key(password.as_bytes(), &record.salt)?;
        let mut pkcs8 = aead_open(&mut aead_key, record.nonce, &record.enc_private_key)?;

        let keypair = Ed25519KeyPair::from_pkcs8(&pkcs8).map_err(|_| KeystoreError::InvalidKey);
        pkcs8.zeroize();
        let keypair = keypair?;

        if keypair.public_key().as_ref() != record.public_key {
            return Err(KeystoreError::InvalidKey);
        }

        Ok(Self {
            keypair,
            public_key: record.public_key,
        })
    }

    /// Raw public key bytes.
    pub fn public_key(&self) -> PublicKeyBytes {
        self.public_key
    }

    /// Sign a message with the identity key.
    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        self.keypair.sign(msg).as_ref().to_vec()
    }
}

/// Verify an Ed25519 signature against raw public key bytes.
pub fn verify(public_key: &PublicKeyBytes, msg: &[u8], sig: &[u8]) -> bool {
    if sig.len() != 64 {
        return false;
    }
    UnparsedPublicKey::new(&ED25519, public_key)
        .verify(msg, sig)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;

    fn test_bucket(dir: &tempfile::TempDir) -> (Store, Bucket) {
        let store = Store::open(&dir.path().join("db")).expect("store open");
        let bucket = store.bucket("user").expect("bucket");
        (store, bucket)
    }

    #[test]
    fn created_identity_signs_and_verifies() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_store, bucket) = test_bucket(&dir);

        let ks = Keystore::open(&bucket, "p").expect("create");
        let sig = ks.sign(b"hello");
        assert!(verify(&ks.public_key(), b"hello", &sig));
        assert!(!verify(&ks.public_key(), b"other", &sig));
    }

    #[test]
    fn reload_with_same_password_yields_same_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_store, bucket) = test_bucket(&dir);

        let pk1 = Keystore::open(&bucket, "p").expect("create").public_key();
        let pk2 = Keystore::open(&bucket, "p").expect("load").public_key();
        assert_eq!(pk1, pk2);
    }

    #[test]
    fn wrong_password_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_store, bucket) = test_bucket(&dir);

        let _ = Keystore::open(&bucket, "p").expect("create");
        match Keystore::open(&bucket, "q") {
            Err(KeystoreError::BadPassword) => {}
            other => panic!("expected BadPassword, got {:?}", other.map(|_| ())),
        }
    }
}
