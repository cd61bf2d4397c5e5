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

//! Self-describing payload encoding for the message catalogue.
//!
//! Fixint bincode with trailing-byte rejection; the enum tag carries the
//! variant discriminator. The decoder is additionally capped so container
//! length prefixes cannot allocate past the frame bound.

use crate::networking::message::Message;
use bincode::Options;
use thiserror::Error;

/// Payload codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Value could not be encoded.
    #[error("payload encode")]
    Encode,
    /// Malformed, truncated, or unknown-variant payload.
    #[error("payload decode")]
    Decode,
    /// Payload exceeds the permitted size.
    #[error("payload too large")]
    TooLarge,
}

fn bincode_opts() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Append the encoding of `msg` to `buf`.
pub fn encode_into(buf: &mut Vec<u8>, msg: &Message) -> Result<(), CodecError> {
    bincode_opts()
        .serialize_into(&mut *buf, msg)
        .map_err(|_| CodecError::Encode)
}

/// Decode exactly one message from `bytes`, which must hold exactly one
/// encoding. `max` caps both the input length and any decoded container.
pub fn decode(bytes: &[u8], max: usize) -> Result<Message, CodecError> {
    if bytes.len() > max {
        return Err(CodecError::TooLarge);
    }
    bincode_opts()
        .with_limit(max as u64)
        .deserialize(bytes)
        .map_err(|_| CodecError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networking::message::HeartbeatCheck;
    use uuid::Uuid;

    const MAX: usize = 16 << 20;

    #[test]
    fn roundtrip_preserves_discriminator() {
        let msg = Message::HeartbeatCheck(HeartbeatCheck {
            id: Uuid::new_v4(),
            capsule_id: Uuid::new_v4(),
            user_public_key: vec![7u8; 32],
        });

        let mut buf = Vec::new();
        encode_into(&mut buf, &msg).expect("encode");
        let back = decode(&buf, MAX).expect("decode");
        assert_eq!(back, msg);
    }

    #[test]
    fn unit_variants_roundtrip() {
        for msg in [Message::DeleteCapsule, Message::RecoveryCeremony] {
            let mut buf = Vec::new();
            encode_into(&mut buf, &msg).expect("encode");
            assert_eq!(decode(&buf, MAX).expect("decode"), msg);
        }
    }

    #[test]
    fn unknown_discriminator_fails() {
        // Enum tags are encoded as a fixint u32; 99 is outside the catalogue.
        let bytes = 99u32.to_le_bytes();
        assert!(matches!(decode(&bytes, MAX), Err(CodecError::Decode)));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut buf = Vec::new();
        encode_into(&mut buf, &Message::DeleteCapsule).expect("encode");
        buf.push(0);
        assert!(matches!(decode(&buf, MAX), Err(CodecError::Decode)));
    }

    #[test]
    fn truncated_input_fails() {
        let msg = Message::HeartbeatCheck(HeartbeatCheck {
            id: Uuid::new_v4(),
            capsule_id: Uuid::new_v4(),
            user_public_key: vec![1, 2, 3],
        });
        let mut buf = Vec::new();
        encode_into(&mut buf, &msg).expect("encode");
        buf.truncate(buf.len() - 1);
        assert!(matches!(decode(&buf, MAX), Err(CodecError::Decode)));
    }

    #[test]
    fn oversized_input_is_capped() {
        let bytes = vec![0u8; 8];
        assert!(matches!(decode(&bytes, 4), Err(CodecError::TooLarge)));
    }
}
