// SPDX-License-Identifier: BUSL-1.1
//! # ztm-trust — Trust Scorer & Trust State Store
//!
//! Computes per-principal [`TrustAssessment`]s from identity verification,
//! behavioral anomaly scores, and context weights, and holds them in a
//! versioned concurrent store.
//!
//! ## Security Invariant
//!
//! Identity failure is absolute: if chain verification fails for any
//! reason, the assessment is `UNTRUSTED` regardless of behavioral score.
//! Assessment versions increase monotonically per principal and commits
//! go through compare-and-swap on the version, so racing re-evaluation
//! triggers (periodic tick vs. revocation) can never lose an update.
//!
//! ## Design
//!
//! Levels resist flapping: demotion requires the computed score to
//! undershoot the current band's threshold by a configured margin, and
//! promotion advances one band only after the score has held above it
//! for a configured dwell count. An assessment that outlives its
//! `expires_at` decays one band per missed re-evaluation cycle rather
//! than staying elevated on stale evidence.

pub mod assessment;
pub mod error;
pub mod scorer;
pub mod store;

pub use assessment::TrustAssessment;
pub use error::TrustError;
pub use scorer::{
    spawn_reevaluation_loop, ContextProvider, ScorerConfig, StaticContext, TrustScorer,
};
pub use store::{AssessmentSource, TrustStore};
