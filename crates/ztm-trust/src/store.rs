// SPDX-License-Identifier: BUSL-1.1
//! # Trust State Store
//!
//! Concurrent, versioned store of the latest [`TrustAssessment`] per
//! principal. Reads are lock-free on the hot path; writes go through a
//! compare-and-swap on the assessment version so that racing
//! re-evaluation triggers (periodic tick vs. revocation-triggered)
//! cannot lose updates or regress to a stale version.

use dashmap::DashMap;

use ztm_core::{PrincipalId, ZtmError};

use crate::assessment::TrustAssessment;
use crate::error::TrustError;

/// Bounded per-principal history depth.
const HISTORY_DEPTH: usize = 64;

/// Read seam between the policy engine and trust state.
///
/// The in-memory [`TrustStore`] is infallible; a persistence-backed
/// implementation surfaces `StoreUnavailable`, which the policy engine
/// handles with retries and a last-known-good fallback.
pub trait AssessmentSource: Send + Sync {
    fn fetch(&self, principal_id: &PrincipalId) -> Result<Option<TrustAssessment>, ZtmError>;
}

/// In-memory versioned trust state.
#[derive(Default)]
pub struct TrustStore {
    current: DashMap<PrincipalId, TrustAssessment>,
    history: DashMap<PrincipalId, Vec<TrustAssessment>>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest committed assessment, if any.
    pub fn get(&self, principal_id: &PrincipalId) -> Option<TrustAssessment> {
        self.current.get(principal_id).map(|a| a.clone())
    }

    /// The version a fresh evaluation should commit as.
    pub fn next_version(&self, principal_id: &PrincipalId) -> u64 {
        self.current
            .get(principal_id)
            .map(|a| a.version + 1)
            .unwrap_or(1)
    }

    /// Commit an assessment. Succeeds only if `assessment.version` is
    /// exactly one past the stored version (or 1 for a first commit);
    /// anything else lost the race and must re-read and re-evaluate.
    pub fn commit(&self, assessment: TrustAssessment) -> Result<(), TrustError> {
        use dashmap::mapref::entry::Entry;

        let principal = assessment.principal_id;
        match self.current.entry(principal) {
            Entry::Vacant(slot) => {
                if assessment.version != 1 {
                    return Err(TrustError::VersionConflict {
                        principal,
                        expected: assessment.version.saturating_sub(1),
                        found: 0,
                    });
                }
                slot.insert(assessment.clone());
            }
            Entry::Occupied(mut slot) => {
                let found = slot.get().version;
                if assessment.version != found + 1 {
                    return Err(TrustError::VersionConflict {
                        principal,
                        expected: assessment.version.saturating_sub(1),
                        found,
                    });
                }
                slot.insert(assessment.clone());
            }
        }

        let mut history = self.history.entry(principal).or_default();
        if history.len() == HISTORY_DEPTH {
            history.remove(0);
        }
        history.push(assessment);
        Ok(())
    }

    /// Append-only evaluation history, oldest first, bounded.
    pub fn history(&self, principal_id: &PrincipalId) -> Vec<TrustAssessment> {
        self.history
            .get(principal_id)
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    /// All principals with at least one committed assessment.
    pub fn principals(&self) -> Vec<PrincipalId> {
        self.current.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

impl AssessmentSource for TrustStore {
    fn fetch(&self, principal_id: &PrincipalId) -> Result<Option<TrustAssessment>, ZtmError> {
        Ok(self.get(principal_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ztm_core::{Timestamp, TrustLevel};
    use ztm_monitor::Maturity;

    fn assessment(principal: PrincipalId, version: u64) -> TrustAssessment {
        let now = Timestamp::now();
        TrustAssessment {
            principal_id: principal,
            level: TrustLevel::Basic,
            identity_score: 1.0,
            anomaly_score: 0.2,
            context_score: 0.5,
            composite_score: 0.68,
            maturity: Maturity::Stable,
            version,
            promotion_streak: 0,
            computed_at: now,
            expires_at: now.plus_secs(30),
        }
    }

    #[test]
    fn first_commit_is_version_one() {
        let store = TrustStore::new();
        let p = PrincipalId::new();
        assert_eq!(store.next_version(&p), 1);
        store.commit(assessment(p, 1)).unwrap();
        assert_eq!(store.get(&p).unwrap().version, 1);
    }

    #[test]
    fn version_must_advance_by_one() {
        let store = TrustStore::new();
        let p = PrincipalId::new();
        store.commit(assessment(p, 1)).unwrap();

        // Skipping ahead and replaying both lose the CAS.
        assert!(matches!(
            store.commit(assessment(p, 3)),
            Err(TrustError::VersionConflict { .. })
        ));
        assert!(matches!(
            store.commit(assessment(p, 1)),
            Err(TrustError::VersionConflict { .. })
        ));

        store.commit(assessment(p, 2)).unwrap();
        assert_eq!(store.get(&p).unwrap().version, 2);
    }

    #[test]
    fn failed_commit_leaves_state_untouched() {
        let store = TrustStore::new();
        let p = PrincipalId::new();
        store.commit(assessment(p, 1)).unwrap();
        let before = store.get(&p).unwrap();

        let mut stale = assessment(p, 1);
        stale.level = TrustLevel::Full;
        assert!(store.commit(stale).is_err());
        assert_eq!(store.get(&p).unwrap(), before);
        assert_eq!(store.history(&p).len(), 1);
    }

    #[test]
    fn history_is_append_only_and_bounded() {
        let store = TrustStore::new();
        let p = PrincipalId::new();
        for v in 1..=(HISTORY_DEPTH as u64 + 10) {
            store.commit(assessment(p, v)).unwrap();
        }
        let history = store.history(&p);
        assert_eq!(history.len(), HISTORY_DEPTH);
        // Oldest entries were evicted; order is preserved.
        assert_eq!(history.first().unwrap().version, 11);
        assert_eq!(history.last().unwrap().version, HISTORY_DEPTH as u64 + 10);
    }

    #[test]
    fn fetch_through_source_trait() {
        let store = TrustStore::new();
        let p = PrincipalId::new();
        let source: &dyn AssessmentSource = &store;
        assert!(source.fetch(&p).unwrap().is_none());

        store.commit(assessment(p, 1)).unwrap();
        assert_eq!(source.fetch(&p).unwrap().unwrap().version, 1);
    }

    #[test]
    fn principals_lists_committed() {
        let store = TrustStore::new();
        let a = PrincipalId::new();
        let b = PrincipalId::new();
        store.commit(assessment(a, 1)).unwrap();
        store.commit(assessment(b, 1)).unwrap();
        let mut listed = store.principals();
        listed.sort_by_key(|p| p.to_string());
        assert_eq!(listed.len(), 2);
    }
}
