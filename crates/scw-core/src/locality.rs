//! Zones and regions
//!
//! A zone is a region name followed by `-N` (`fr-par-1`); its region is the
//! zone minus that suffix (`fr-par`). Every resource lives in exactly one
//! locality kind, fixed per resource type.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Regions the provider knows about
pub const KNOWN_REGIONS: &[&str] = &["fr-par", "nl-ams", "pl-waw"];

/// Zones the provider knows about
pub const KNOWN_ZONES: &[&str] = &[
    "fr-par-1", "fr-par-2", "fr-par-3", "nl-ams-1", "nl-ams-2", "nl-ams-3", "pl-waw-1",
    "pl-waw-2", "pl-waw-3",
];

/// An availability zone, e.g. `fr-par-1`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Zone(String);

/// A region, e.g. `fr-par`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Region(String);

impl Zone {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The region this zone belongs to
    pub fn region(&self) -> Region {
        match self.0.rsplit_once('-') {
            Some((region, _)) => Region(region.to_string()),
            None => Region(self.0.clone()),
        }
    }

    /// Zone `-1` of a region, used when a legacy regional scope must be
    /// read as a zone
    pub fn first_of(region: &Region) -> Zone {
        Zone(format!("{}-1", region.0))
    }
}

impl Region {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// All known zones of this region
    pub fn zones(&self) -> Vec<Zone> {
        KNOWN_ZONES
            .iter()
            .filter(|z| Zone((*z).to_string()).region() == *self)
            .map(|z| Zone((*z).to_string()))
            .collect()
    }
}

impl FromStr for Zone {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        if KNOWN_ZONES.contains(&s) {
            Ok(Zone(s.to_string()))
        } else {
            Err(CoreError::UnknownScope(s.to_string()))
        }
    }
}

impl FromStr for Region {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        if KNOWN_REGIONS.contains(&s) {
            Ok(Region(s.to_string()))
        } else {
            Err(CoreError::UnknownScope(s.to_string()))
        }
    }
}

impl TryFrom<String> for Zone {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl TryFrom<String> for Region {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Zone> for String {
    fn from(z: Zone) -> Self {
        z.0
    }
}

impl From<Region> for String {
    fn from(r: Region) -> Self {
        r.0
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Either kind of scope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locality {
    Zone(Zone),
    Region(Region),
}

impl Locality {
    /// Parse a scope segment, trying zones before regions
    pub fn parse(s: &str) -> Result<Self> {
        if let Ok(zone) = s.parse::<Zone>() {
            return Ok(Locality::Zone(zone));
        }
        s.parse::<Region>().map(Locality::Region)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Locality::Zone(z) => z.as_str(),
            Locality::Region(r) => r.as_str(),
        }
    }

    pub fn region(&self) -> Region {
        match self {
            Locality::Zone(z) => z.region(),
            Locality::Region(r) => r.clone(),
        }
    }
}

impl fmt::Display for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `s` names a known zone or region
pub fn is_known_locality(s: &str) -> bool {
    Locality::parse(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_region() {
        let zone: Zone = "nl-ams-2".parse().unwrap();
        assert_eq!(zone.region().as_str(), "nl-ams");
    }

    #[test]
    fn test_unknown_zone() {
        assert_eq!(
            "mars-1".parse::<Zone>(),
            Err(CoreError::UnknownScope("mars-1".to_string()))
        );
        assert!("fr-par".parse::<Zone>().is_err());
    }

    #[test]
    fn test_locality_parse_prefers_zone() {
        assert!(matches!(Locality::parse("fr-par-1"), Ok(Locality::Zone(_))));
        assert!(matches!(Locality::parse("fr-par"), Ok(Locality::Region(_))));
        assert!(Locality::parse("").is_err());
    }

    #[test]
    fn test_region_zones() {
        let region: Region = "pl-waw".parse().unwrap();
        let zones: Vec<String> = region.zones().into_iter().map(String::from).collect();
        assert_eq!(zones, vec!["pl-waw-1", "pl-waw-2", "pl-waw-3"]);
        assert_eq!(Zone::first_of(&region).as_str(), "pl-waw-1");
    }

    #[test]
    fn test_serde() {
        let zone: Zone = serde_json::from_str("\"fr-par-2\"").unwrap();
        assert_eq!(serde_json::to_string(&zone).unwrap(), "\"fr-par-2\"");
        assert!(serde_json::from_str::<Region>("\"fr-par-2\"").is_err());
    }
}
