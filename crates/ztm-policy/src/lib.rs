// SPDX-License-Identifier: BUSL-1.1
//! # ztm-policy — Policy Engine & Segmentation Enforcer
//!
//! Turns trust state, zone topology, and enforcement status into
//! per-request [`PolicyDecision`]s.
//!
//! ## Security Invariant
//!
//! Every failure path denies. An unavailable trust store, a missing
//! assessment, an unknown zone, or an assessment predating a known
//! revocation all produce `DENY` with a specific reason code — the
//! engine has no default-allow path. Once a principal's enforcement
//! state reaches `REVOKED`, no decision for it is ever `ALLOW` again.
//!
//! ## Design
//!
//! The request path is synchronous and read-mostly: one trust-state
//! read, one zone-table lookup, and a decision-cache probe. Decisions
//! are deterministic functions of `(trust level, source zone, dest
//! zone, time)` and are cached under a TTL; revocation notices
//! invalidate the affected principal's cached decisions immediately.

pub mod audit;
pub mod decision;
pub mod enforcement;
pub mod engine;

pub use audit::{AuditLog, AuditRecord};
pub use decision::{PolicyAction, PolicyDecision, ReasonCode};
pub use enforcement::{EnforcementRegistry, EnforcementState};
pub use engine::{spawn_revocation_listener, PolicyConfig, PolicyEngine, PrincipalZones};
