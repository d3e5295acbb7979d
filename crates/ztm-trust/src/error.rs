// SPDX-License-Identifier: BUSL-1.1
//! Error types for trust scoring and state storage.

use thiserror::Error;

use ztm_core::PrincipalId;

/// Errors from the trust scorer and trust state store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrustError {
    /// A commit lost the compare-and-swap race on the assessment version.
    #[error("version conflict for {principal}: expected to replace v{expected}, found v{found}")]
    VersionConflict {
        principal: PrincipalId,
        expected: u64,
        found: u64,
    },

    /// CAS retries were exhausted without a successful commit.
    #[error("evaluation for {0} kept losing the version race")]
    CommitContention(PrincipalId),
}
