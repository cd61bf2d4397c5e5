// Copyright (c) 2026 Capsulenet
// Licensed under the Apache License, Version 2.0

/// Prometheus metrics for the transport and registry.
pub mod metrics;
