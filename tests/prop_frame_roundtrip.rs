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

use capsulenet::networking::message::{
    CapsuleStream, CapsuleStreamChunk, ContinueCapsuleStream, HeartbeatCheck, Message,
    ReCapsuleStream,
};
use capsulenet::networking::protocol::{read_frame, write_frame, Frame, PROTOCOL_VERSION};
use proptest::prelude::*;
use std::time::Duration;
use uuid::Uuid;

fn arb_uuid() -> impl Strategy<Value = Uuid> {
    any::<[u8; 16]>().prop_map(Uuid::from_bytes)
}

fn arb_public_keys() -> impl Strategy<Value = Vec<[u8; 32]>> {
    prop::collection::vec(any::<[u8; 32]>(), 0..4)
}

fn arb_addrs() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z0-9.]{1,16}:[0-9]{1,5}", 0..4)
}

fn arb_duration() -> impl Strategy<Value = Duration> {
    (0u64..86_400_000).prop_map(Duration::from_millis)
}

fn arb_message() -> impl Strategy<Value = Message> {
    prop_oneof![
        (
            arb_uuid(),
            arb_public_keys(),
            arb_addrs(),
            any::<u64>(),
            any::<u32>(),
            arb_duration(),
        )
            .prop_map(
                |(id, guardian_public_keys, guardian_addrs, total_size, chunk_size, heartbeat_grace)| {
                    Message::CapsuleStream(CapsuleStream {
                        id,
                        guardian_public_keys,
                        guardian_addrs,
                        total_size,
                        chunk_size,
                        heartbeat_grace,
                    })
                }
            ),
        (any::<bool>(), arb_uuid(), any::<u32>(), any::<u64>()).prop_map(
            |(is_final, id, seq, size)| {
                Message::CapsuleStreamChunk(CapsuleStreamChunk {
                    is_final,
                    id,
                    seq,
                    size,
                })
            }
        ),
        (
            arb_uuid(),
            arb_public_keys(),
            arb_addrs(),
            any::<u64>(),
            arb_duration(),
        )
            .prop_map(
                |(id, guardian_public_keys, guardian_addrs, total_size, heartbeat_grace)| {
                    Message::ReCapsuleStream(ReCapsuleStream {
                        id,
                        guardian_public_keys,
                        guardian_addrs,
                        total_size,
                        heartbeat_grace,
                    })
                }
            ),
        (arb_uuid(), arb_uuid(), any::<u16>()).prop_map(|(id, capsule_id, offset_chunk_num)| {
            Message::ContinueCapsuleStream(ContinueCapsuleStream {
                id,
                capsule_id,
                offset_chunk_num,
            })
        }),
        Just(Message::DeleteCapsule),
        (arb_uuid(), arb_uuid(), prop::collection::vec(any::<u8>(), 0..64)).prop_map(
            |(id, capsule_id, user_public_key)| {
                Message::HeartbeatCheck(HeartbeatCheck {
                    id,
                    capsule_id,
                    user_public_key,
                })
            }
        ),
        Just(Message::RecoveryCeremony),
    ]
}

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
        .block_on(fut)
}

proptest! {
    // Every catalogue variant survives a write/read cycle through a pipe
    // with version and payload intact.
    #[test]
    fn prop_frame_roundtrip(msg in arb_message()) {
        let back = block_on(async {
            let (mut a, mut b) = tokio::io::duplex(17 << 20);
            let frame = Frame { version: PROTOCOL_VERSION, msg: msg.clone() };

            let mut wbuf = Vec::new();
            write_frame(&mut a, &frame, &mut wbuf).await.expect("write");

            let mut rbuf = Vec::new();
            read_frame(&mut b, &mut rbuf).await.expect("read")
        });

        prop_assert_eq!(back.version, PROTOCOL_VERSION);
        prop_assert_eq!(back.msg, msg);
    }

    // Back-to-back frames decode independently and in order.
    #[test]
    fn prop_frame_stream_preserves_order(msgs in prop::collection::vec(arb_message(), 1..8)) {
        let decoded = block_on(async {
            let (mut a, mut b) = tokio::io::duplex(17 << 20);

            let mut wbuf = Vec::new();
            for msg in &msgs {
                let frame = Frame { version: PROTOCOL_VERSION, msg: msg.clone() };
                write_frame(&mut a, &frame, &mut wbuf).await.expect("write");
            }

            let mut out = Vec::new();
            let mut rbuf = Vec::new();
            for _ in 0..msgs.len() {
                out.push(read_frame(&mut b, &mut rbuf).await.expect("read").msg);
            }
            out
        });

        prop_assert_eq!(decoded, msgs);
    }
}
