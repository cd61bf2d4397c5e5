// Copyright (c) 2026 Capsulenet
// Licensed under the Apache License, Version 2.0

/// Password-derived Ed25519 identity, encrypted at rest.
pub mod keystore;
