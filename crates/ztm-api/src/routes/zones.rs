// SPDX-License-Identifier: BUSL-1.1
//! # Zone Table Routes
//!
//! `GET /v1/zones` — the validated segmentation topology, read-only.
//! Zones are configuration; reshaping them is a deploy, not an API call.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use ztm_core::Zone;

use crate::state::AppState;

/// Assemble the zones router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/zones", get(list_zones))
}

/// Wire form of a zone.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ZoneSummary {
    pub id: String,
    pub name: String,
    pub min_trust_for_entry: String,
    pub allowed_peer_zones: Vec<String>,
}

impl From<&Zone> for ZoneSummary {
    fn from(zone: &Zone) -> Self {
        Self {
            id: zone.id.as_str().to_string(),
            name: zone.name.clone(),
            min_trust_for_entry: zone.min_trust_for_entry.to_string(),
            allowed_peer_zones: zone
                .allowed_peer_zones
                .iter()
                .map(|z| z.as_str().to_string())
                .collect(),
        }
    }
}

/// List the configured zones.
#[utoipa::path(
    get,
    path = "/v1/zones",
    responses(
        (status = 200, description = "Zone table", body = Vec<ZoneSummary>),
    ),
    tag = "zones"
)]
pub async fn list_zones(State(state): State<AppState>) -> Json<Vec<ZoneSummary>> {
    let zones: Vec<ZoneSummary> = state.zones.iter().map(ZoneSummary::from).collect();
    Json(zones)
}
