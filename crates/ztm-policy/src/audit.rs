// SPDX-License-Identifier: BUSL-1.1
//! # Audit Log
//!
//! Append-only record of policy decisions and scored anomaly events for
//! compliance review. External dashboards read this log; nothing in the
//! engine ever mutates an appended record.
//!
//! The in-memory log is a bounded ring so a chatty deployment cannot
//! grow it without limit; the persistence layer mirrors appends to the
//! durable `audit_log` table when a database is configured.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use ztm_core::Timestamp;
use ztm_monitor::AnomalyEvent;

use crate::decision::PolicyDecision;

/// Default retained record count.
const DEFAULT_CAPACITY: usize = 10_000;

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    Decision(PolicyDecision),
    Anomaly(AnomalyEvent),
}

impl AuditRecord {
    pub fn recorded_at(&self) -> Timestamp {
        match self {
            Self::Decision(d) => d.decided_at,
            Self::Anomaly(a) => a.timestamp,
        }
    }
}

/// Bounded, append-only audit log.
pub struct AuditLog {
    records: RwLock<VecDeque<AuditRecord>>,
    capacity: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    pub fn append(&self, record: AuditRecord) {
        let mut records = self.records.write();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// The most recent `limit` records, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        let records = self.records.read();
        let skip = records.len().saturating_sub(limit);
        records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{PolicyAction, ReasonCode};
    use ztm_core::{PrincipalId, ZoneId};

    fn decision() -> AuditRecord {
        AuditRecord::Decision(PolicyDecision {
            source_principal: PrincipalId::new(),
            dest_zone: ZoneId::new("internal"),
            action: PolicyAction::Deny,
            reason_code: ReasonCode::TrustBelowThreshold,
            ttl_secs: 5,
            decided_at: Timestamp::now(),
        })
    }

    #[test]
    fn append_and_read_back() {
        let log = AuditLog::new();
        log.append(decision());
        log.append(decision());
        assert_eq!(log.len(), 2);
        assert_eq!(log.recent(10).len(), 2);
        assert_eq!(log.recent(1).len(), 1);
    }

    #[test]
    fn ring_evicts_oldest() {
        let log = AuditLog::with_capacity(3);
        for _ in 0..5 {
            log.append(decision());
        }
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn record_serializes_with_kind_tag() {
        let json = serde_json::to_string(&decision()).unwrap();
        assert!(json.contains("\"kind\":\"decision\""));
    }
}
