// SPDX-License-Identifier: BUSL-1.1
//! # Enforcement State Machine
//!
//! Per-principal enforcement status, independent of the trust-level
//! bands:
//!
//! ```text
//! Active ◀──▶ Quarantined
//!    │            │
//!    └────────────┴──▶ Revoked (terminal)
//! ```
//!
//! `Active ↔ Quarantined` tracks drift detection and resolution.
//! `Revoked` is entered on certificate revocation and never left; no
//! decision for a revoked principal is ever `ALLOW` again.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use ztm_core::PrincipalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementState {
    Active,
    Quarantined,
    Revoked,
}

impl EnforcementState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Revoked)
    }
}

impl std::fmt::Display for EnforcementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "ACTIVE",
            Self::Quarantined => "QUARANTINED",
            Self::Revoked => "REVOKED",
        };
        f.write_str(s)
    }
}

/// Concurrent per-principal enforcement states. Unknown principals
/// read as `Active`.
#[derive(Default)]
pub struct EnforcementRegistry {
    states: DashMap<PrincipalId, EnforcementState>,
}

impl EnforcementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, principal_id: &PrincipalId) -> EnforcementState {
        self.states
            .get(principal_id)
            .map(|s| *s)
            .unwrap_or(EnforcementState::Active)
    }

    /// Enter quarantine on drift detection. No-op once revoked.
    pub fn mark_quarantined(&self, principal_id: PrincipalId) {
        self.transition(principal_id, EnforcementState::Quarantined);
    }

    /// Leave quarantine on drift resolution. No-op once revoked.
    pub fn mark_active(&self, principal_id: PrincipalId) {
        self.transition(principal_id, EnforcementState::Active);
    }

    /// Terminal: entered on certificate revocation, never left.
    pub fn mark_revoked(&self, principal_id: PrincipalId) {
        let previous = self
            .states
            .insert(principal_id, EnforcementState::Revoked);
        if previous != Some(EnforcementState::Revoked) {
            tracing::warn!(
                principal = %principal_id,
                "enforcement state is now REVOKED (terminal)"
            );
        }
    }

    fn transition(&self, principal_id: PrincipalId, to: EnforcementState) {
        let mut entry = self
            .states
            .entry(principal_id)
            .or_insert(EnforcementState::Active);
        if entry.is_terminal() || *entry == to {
            return;
        }
        tracing::info!(
            principal = %principal_id,
            from = %*entry,
            to = %to,
            "enforcement state transition"
        );
        *entry = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_principal_is_active() {
        let registry = EnforcementRegistry::new();
        assert_eq!(registry.state(&PrincipalId::new()), EnforcementState::Active);
    }

    #[test]
    fn quarantine_round_trip() {
        let registry = EnforcementRegistry::new();
        let p = PrincipalId::new();
        registry.mark_quarantined(p);
        assert_eq!(registry.state(&p), EnforcementState::Quarantined);
        registry.mark_active(p);
        assert_eq!(registry.state(&p), EnforcementState::Active);
    }

    #[test]
    fn revoked_is_terminal() {
        let registry = EnforcementRegistry::new();
        let p = PrincipalId::new();
        registry.mark_quarantined(p);
        registry.mark_revoked(p);
        assert_eq!(registry.state(&p), EnforcementState::Revoked);

        // Nothing moves a revoked principal back.
        registry.mark_active(p);
        assert_eq!(registry.state(&p), EnforcementState::Revoked);
        registry.mark_quarantined(p);
        assert_eq!(registry.state(&p), EnforcementState::Revoked);
    }
}
