//! Composite identifiers
//!
//! State ids are opaque to the host but carry the locality a resource lives
//! in, so Read never needs more than the id:
//!
//! ```text
//! {zone|region}/{uuid}
//! {zone}/{parent-uuid}/{child-uuid}
//! {parent-uuid}/{user|app}/{member-uuid}
//! ```
//!
//! `/` is the only delimiter. Ids are parsed into named types at the host
//! boundary and formatted back only when written to state.

use crate::error::{CoreError, Result};
use crate::locality::{Locality, Region, Zone};
use std::fmt;
use std::str::FromStr;

const SEP: char = '/';

fn split<'a>(raw: &'a str, expected: &'static str, count: usize) -> Result<Vec<&'a str>> {
    let parts: Vec<&str> = raw.split(SEP).collect();
    if parts.len() != count || parts.iter().any(|p| p.is_empty() || p.trim() != *p) {
        return Err(CoreError::MalformedId {
            id: raw.to_string(),
            expected,
        });
    }
    Ok(parts)
}

/// Read a zone scope; a bare region (legacy state) reads as its zone `-1`
fn parse_zone_scope(scope: &str) -> Result<Zone> {
    match Locality::parse(scope)? {
        Locality::Zone(zone) => Ok(zone),
        Locality::Region(region) => Ok(Zone::first_of(&region)),
    }
}

/// `{zone}/{uuid}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZonedId {
    pub zone: Zone,
    pub id: String,
}

impl ZonedId {
    pub fn new(zone: Zone, id: impl Into<String>) -> Self {
        Self {
            zone,
            id: id.into(),
        }
    }
}

impl FromStr for ZonedId {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self> {
        let parts = split(raw, "{zone}/{uuid}", 2)?;
        Ok(Self {
            zone: parse_zone_scope(parts[0])?,
            id: parts[1].to_string(),
        })
    }
}

impl fmt::Display for ZonedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.zone, SEP, self.id)
    }
}

/// `{region}/{uuid}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionalId {
    pub region: Region,
    pub id: String,
}

impl RegionalId {
    pub fn new(region: Region, id: impl Into<String>) -> Self {
        Self {
            region,
            id: id.into(),
        }
    }
}

impl FromStr for RegionalId {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self> {
        let parts = split(raw, "{region}/{uuid}", 2)?;
        match Locality::parse(parts[0])? {
            Locality::Region(region) => Ok(Self {
                region,
                id: parts[1].to_string(),
            }),
            Locality::Zone(_) => Err(CoreError::MalformedId {
                id: raw.to_string(),
                expected: "{region}/{uuid}",
            }),
        }
    }
}

impl fmt::Display for RegionalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.region, SEP, self.id)
    }
}

/// `{zone}/{parent-uuid}/{child-uuid}`, for resources nested under a zoned
/// parent. The child shares the parent's zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZonedNestedId {
    pub zone: Zone,
    pub parent_id: String,
    pub child_id: String,
}

impl ZonedNestedId {
    pub fn new(zone: Zone, parent_id: impl Into<String>, child_id: impl Into<String>) -> Self {
        Self {
            zone,
            parent_id: parent_id.into(),
            child_id: child_id.into(),
        }
    }

    /// The parent as a standalone zoned id
    pub fn parent(&self) -> ZonedId {
        ZonedId::new(self.zone.clone(), self.parent_id.clone())
    }
}

impl FromStr for ZonedNestedId {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self> {
        let parts = split(raw, "{zone}/{parent}/{child}", 3)?;
        Ok(Self {
            zone: parse_zone_scope(parts[0])?,
            parent_id: parts[1].to_string(),
            child_id: parts[2].to_string(),
        })
    }
}

impl fmt::Display for ZonedNestedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            self.zone, SEP, self.parent_id, SEP, self.child_id
        )
    }
}

/// Member type tag of a polymorphic association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKind {
    User,
    App,
}

impl MemberKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberKind::User => "user",
            MemberKind::App => "app",
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{parent-uuid}/{user|app}/{member-uuid}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberId {
    pub parent_id: String,
    pub kind: MemberKind,
    pub member_id: String,
}

impl MemberId {
    pub fn new(parent_id: impl Into<String>, kind: MemberKind, member_id: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            kind,
            member_id: member_id.into(),
        }
    }
}

impl FromStr for MemberId {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self> {
        let parts = split(raw, "{parent}/{user|app}/{member}", 3)?;
        let kind = match parts[1] {
            "user" => MemberKind::User,
            "app" => MemberKind::App,
            _ => {
                return Err(CoreError::MalformedId {
                    id: raw.to_string(),
                    expected: "{parent}/{user|app}/{member}",
                });
            }
        };
        Ok(Self {
            parent_id: parts[0].to_string(),
            kind,
            member_id: parts[2].to_string(),
        })
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            self.parent_id, SEP, self.kind, SEP, self.member_id
        )
    }
}

/// Generic `{scope}("/"{id})+` form
pub fn format_id(scope: &Locality, ids: &[&str]) -> String {
    let mut out = scope.to_string();
    for id in ids {
        out.push(SEP);
        out.push_str(id);
    }
    out
}

/// Split a scoped id into its locality and the remaining id segments
pub fn parse_id(raw: &str) -> Result<(Locality, Vec<String>)> {
    let parts: Vec<&str> = raw.split(SEP).collect();
    if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
        return Err(CoreError::MalformedId {
            id: raw.to_string(),
            expected: "{scope}/{uuid}",
        });
    }
    let scope = Locality::parse(parts[0])?;
    Ok((scope, parts[1..].iter().map(|s| s.to_string()).collect()))
}

/// Strip an optional scope prefix, keeping the trailing uuid
///
/// Cross-references may be given either as a bare uuid or as the composite
/// id of the referenced resource.
pub fn expand_id(raw: &str) -> &str {
    match raw.rsplit_once(SEP) {
        Some((_, id)) => id,
        None => raw,
    }
}

pub fn is_uuid(raw: &str) -> bool {
    uuid::Uuid::parse_str(raw).is_ok() && raw.len() == 36
}

/// Accept `uuid` or `{zone|region}/uuid`
pub fn validate_uuid_or_uuid_with_locality(raw: &str) -> Result<()> {
    match raw.split_once(SEP) {
        None if is_uuid(raw) => Ok(()),
        None => Err(CoreError::InvalidUuid(raw.to_string())),
        Some((scope, id)) => {
            Locality::parse(scope)?;
            if is_uuid(id) {
                Ok(())
            } else {
                Err(CoreError::InvalidUuid(raw.to_string()))
            }
        }
    }
}
