// SPDX-License-Identifier: BUSL-1.1
//! # Domain Identity Newtypes
//!
//! Newtype wrappers for all domain identifiers in the ZTM engine. These
//! prevent accidental identifier confusion — you cannot pass a
//! [`CertSerial`] where a [`PrincipalId`] is expected.
//!
//! ## Security Invariant
//!
//! Type-level distinction between identifier namespaces prevents
//! cross-namespace confusion where, for example, a telemetry event id is
//! substituted for a certificate serial in a revocation request.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a principal (service, user, or device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalId(pub Uuid);

/// Unique identifier for a network zone.
///
/// Zones are statically configured, so their ids are human-readable labels
/// (e.g., `"internal-db"`, `"guest"`) rather than UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneId(pub String);

/// Unique serial number of an issued certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CertSerial(pub Uuid);

/// Unique identifier for a telemetry event, used for de-duplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl PrincipalId {
    /// Generate a new random principal identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl CertSerial {
    /// Generate a new random certificate serial.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CertSerial {
    fn default() -> Self {
        Self::new()
    }
}

impl EventId {
    /// Generate a new random event identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneId {
    /// Wrap a zone label.
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The zone label as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "principal:{}", self.0)
    }
}

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "zone:{}", self.0)
    }
}

impl std::fmt::Display for CertSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cert:{}", self.0)
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "event:{}", self.0)
    }
}

// ─── Principal ───────────────────────────────────────────────────────

/// The kind of actor a principal represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// A workload or backend service.
    Service,
    /// A human user.
    User,
    /// A physical or virtual device.
    Device,
}

impl std::fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Service => "SERVICE",
            Self::User => "USER",
            Self::Device => "DEVICE",
        };
        f.write_str(s)
    }
}

/// A registered principal.
///
/// Identity (`id`, `kind`) is immutable after registration; the zone
/// assignment may change when a workload is rescheduled or a device moves
/// segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique principal identifier. Immutable.
    pub id: PrincipalId,
    /// What kind of actor this principal is. Immutable.
    pub kind: PrincipalKind,
    /// The zone this principal currently resides in.
    pub zone_id: ZoneId,
}

impl Principal {
    /// Register a new principal in the given zone.
    pub fn new(kind: PrincipalKind, zone_id: ZoneId) -> Self {
        Self {
            id: PrincipalId::new(),
            kind,
            zone_id,
        }
    }

    /// Reassign the principal to a different zone.
    pub fn reassign_zone(&mut self, zone_id: ZoneId) {
        self.zone_id = zone_id;
    }
}
