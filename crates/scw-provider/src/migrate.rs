//! State migrations between schema versions

use crate::error::{ProviderError, Result};
use scw_core::{Locality, Zone, ZonedId};
use serde_json::{Map, Value as Json};

/// Rewrite `{region}/{uuid}` as `{region}-1/{uuid}`; zoned ids pass through
pub fn zoned_id_from_regional(raw: &str) -> Result<String> {
    let id: ZonedId = raw.parse()?;
    Ok(id.to_string())
}

/// Version 0 of a zoned resource stored a regional id and a `region`
/// attribute; version 1 stores a zoned id and a `zone` attribute
pub fn regional_to_zonal(mut state: Map<String, Json>) -> Result<Map<String, Json>> {
    let raw_id = state
        .get("id")
        .and_then(Json::as_str)
        .ok_or_else(|| ProviderError::InvalidState("missing id".to_string()))?
        .to_string();
    let id: ZonedId = raw_id.parse()?;

    let zone = match state.get("zone").and_then(Json::as_str) {
        Some(z) if !z.is_empty() => z.parse::<Zone>()?,
        _ => id.zone.clone(),
    };
    if let Some(region) = state.get("region").and_then(Json::as_str) {
        if !region.is_empty() {
            let region = Locality::parse(region)?.region();
            if region != zone.region() {
                return Err(ProviderError::InvalidState(format!(
                    "zone {zone} is not in region {region}"
                )));
            }
        }
    }

    tracing::debug!(from = %raw_id, to = %id, "migrating id to zonal scope");
    state.insert("id".to_string(), Json::String(id.to_string()));
    state.insert("zone".to_string(), Json::String(zone.to_string()));
    state.insert("region".to_string(), Json::String(zone.region().to_string()));
    Ok(state)
}
