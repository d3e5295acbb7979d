// SPDX-License-Identifier: BUSL-1.1
//! # Segmentation Zones
//!
//! A zone is a segmentation boundary with a minimum trust level for entry
//! and an explicit adjacency list of zones it may exchange traffic with.
//! The full set of zones is held in a [`ZoneTable`] built once at startup
//! from configuration.
//!
//! ## Security Invariant
//!
//! Adjacency is symmetric: if zone A lists zone B as a permitted peer,
//! zone B must list zone A. A configuration violating this (or referencing
//! a zone that does not exist) is a `PolicyConflict` and is rejected at
//! load — the engine never starts with a contradictory segmentation graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ZtmError;
use crate::identity::ZoneId;
use crate::level::TrustLevel;

/// A segmentation zone definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    /// Human-readable label, informational only.
    pub name: String,
    /// Minimum trust level a principal must hold to receive traffic
    /// admitted into this zone.
    pub min_trust_for_entry: TrustLevel,
    /// Zones this zone is permitted to exchange traffic with. A zone is
    /// always permitted to talk to itself; it never appears in its own list.
    #[serde(default)]
    pub allowed_peer_zones: Vec<ZoneId>,
}

impl Zone {
    pub fn new(id: ZoneId, name: impl Into<String>, min_trust_for_entry: TrustLevel) -> Self {
        Self {
            id,
            name: name.into(),
            min_trust_for_entry,
            allowed_peer_zones: Vec::new(),
        }
    }

    /// Whether traffic from this zone toward `dest` crosses a permitted edge.
    /// Intra-zone traffic is always permitted at the adjacency layer.
    pub fn permits_peer(&self, dest: &ZoneId) -> bool {
        self.id == *dest || self.allowed_peer_zones.contains(dest)
    }
}

/// Validated, immutable set of zones loaded at startup.
///
/// `BTreeMap` keeps iteration order deterministic, which keeps config
/// validation errors and audit output stable across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneTable {
    zones: BTreeMap<ZoneId, Zone>,
}

impl ZoneTable {
    /// Build a zone table from configuration, enforcing graph consistency.
    ///
    /// Rejects with `PolicyConflict`:
    /// - duplicate zone ids,
    /// - a peer reference to a zone that is not defined,
    /// - a zone listing itself as a peer,
    /// - asymmetric adjacency (A lists B, but B does not list A).
    pub fn from_config(zones: Vec<Zone>) -> Result<Self, ZtmError> {
        let mut table: BTreeMap<ZoneId, Zone> = BTreeMap::new();
        for zone in zones {
            if table.insert(zone.id.clone(), zone.clone()).is_some() {
                return Err(ZtmError::PolicyConflict(format!(
                    "duplicate zone definition: {}",
                    zone.id
                )));
            }
        }

        for zone in table.values() {
            for peer in &zone.allowed_peer_zones {
                if *peer == zone.id {
                    return Err(ZtmError::PolicyConflict(format!(
                        "zone {} lists itself as a peer",
                        zone.id
                    )));
                }
                let Some(peer_zone) = table.get(peer) else {
                    return Err(ZtmError::PolicyConflict(format!(
                        "zone {} references undefined peer {}",
                        zone.id, peer
                    )));
                };
                if !peer_zone.allowed_peer_zones.contains(&zone.id) {
                    return Err(ZtmError::PolicyConflict(format!(
                        "asymmetric adjacency: {} lists {} but not vice versa",
                        zone.id, peer.as_str()
                    )));
                }
            }
        }

        Ok(Self { zones: table })
    }

    pub fn get(&self, id: &ZoneId) -> Option<&Zone> {
        self.zones.get(id)
    }

    pub fn contains(&self, id: &ZoneId) -> bool {
        self.zones.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    /// Whether a crossing from `source` to `dest` is a permitted edge in
    /// the segmentation graph. Unknown zones never permit anything.
    pub fn crossing_permitted(&self, source: &ZoneId, dest: &ZoneId) -> bool {
        match self.zones.get(source) {
            Some(zone) => self.zones.contains_key(dest) && zone.permits_peer(dest),
            None => false,
        }
    }
}
