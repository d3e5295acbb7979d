// SPDX-License-Identifier: BUSL-1.1
//! # ztm-core — Foundational Types for the ZTM Engine
//!
//! This crate is the bedrock of the ZTM (Zero Trust Mesh) engine. It defines
//! the type-system primitives every other crate builds on. Every other crate
//! in the workspace depends on `ztm-core`; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `PrincipalId`, `ZoneId`,
//!    `CertSerial`, `EventId` — all newtypes. No bare strings or bare UUIDs
//!    for identifiers, so a certificate serial can never be passed where a
//!    principal id is expected.
//!
//! 2. **Ordered `TrustLevel`.** One definition, six variants with a total
//!    order. Policy gating is `level >= zone.min_trust_for_entry` — the
//!    ordering lives in exactly one place.
//!
//! 3. **UTC-only timestamps.** The `Timestamp` type enforces UTC with
//!    seconds precision. Expiry, decay, and propagation-bound arithmetic all
//!    flow through it.
//!
//! 4. **Fail-closed zone table.** `ZoneTable` validates adjacency at
//!    construction; a contradictory table is a [`ZtmError::PolicyConflict`]
//!    at load time and can never reach the evaluation hot path.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `ztm-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - All public types derive `Debug`, `Clone`, and implement
//!   `Serialize`/`Deserialize`.

pub mod error;
pub mod identity;
pub mod level;
pub mod temporal;
pub mod zone;

// Re-export primary types for ergonomic imports.
pub use error::ZtmError;
pub use identity::{CertSerial, EventId, Principal, PrincipalId, PrincipalKind, ZoneId};
pub use level::TrustLevel;
pub use temporal::Timestamp;
pub use zone::{Zone, ZoneTable};
