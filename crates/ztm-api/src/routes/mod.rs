// SPDX-License-Identifier: BUSL-1.1
//! Route modules, one per API domain.

pub mod audit;
pub mod certs;
pub mod evaluate;
pub mod principals;
pub mod telemetry;
pub mod zones;
