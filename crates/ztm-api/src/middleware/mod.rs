// SPDX-License-Identifier: BUSL-1.1
//! HTTP middleware: Prometheus request metrics.

pub mod metrics;
