//! Expanders and flatteners between schema values and SDK types
//!
//! `expand_*` go schema → SDK. The `*_ptr` forms return `None` for an absent
//! or empty value so "not set" stays distinguishable from "explicitly empty".
//! The `updated_*_ptr` forms are for update bodies: an absent value becomes an
//! explicit empty so the cloud clears the field.
//!
//! `flatten_*` go SDK → schema. `None` flattens to the zero value of the
//! schema type, times to RFC 3339 UTC, durations to Go-style strings.

use crate::duration::{format_duration, parse_duration};
use crate::error::{CoreError, Result};
use crate::value::Value;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

pub fn expand_string(v: &Value) -> String {
    v.as_str().unwrap_or_default().to_string()
}

pub fn expand_string_ptr(v: &Value) -> Option<String> {
    match v.as_str() {
        Some(s) if !s.is_empty() => Some(s.to_string()),
        _ => None,
    }
}

pub fn expand_updated_string_ptr(v: &Value) -> Option<String> {
    Some(expand_string(v))
}

pub fn expand_strings(v: &Value) -> Vec<String> {
    v.as_items()
        .iter()
        .filter_map(|i| i.as_str().map(str::to_string))
        .collect()
}

/// Set elements sorted, so request bodies are deterministic
pub fn expand_string_set(v: &Value) -> Vec<String> {
    let mut out = expand_strings(v);
    out.sort();
    out
}

pub fn expand_strings_ptr(v: &Value) -> Option<Vec<String>> {
    let items = expand_strings(v);
    if items.is_empty() { None } else { Some(items) }
}

pub fn expand_updated_strings_ptr(v: &Value) -> Option<Vec<String>> {
    Some(expand_strings(v))
}

pub fn expand_bool(v: &Value) -> bool {
    v.as_bool().unwrap_or(false)
}

pub fn expand_bool_ptr(v: &Value) -> Option<bool> {
    v.as_bool()
}

pub fn expand_int_ptr(v: &Value) -> Option<i64> {
    v.as_int()
}

pub fn expand_u32_ptr(v: &Value) -> Option<u32> {
    v.as_int().and_then(|i| u32::try_from(i).ok())
}

pub fn expand_string_map(v: &Value) -> BTreeMap<String, String> {
    v.as_object()
        .map(|m| {
            m.iter()
                .map(|(k, v)| (k.clone(), expand_string(v)))
                .collect()
        })
        .unwrap_or_default()
}

pub fn expand_duration_ptr(v: &Value) -> Result<Option<Duration>> {
    match v.as_str() {
        Some(s) if !s.is_empty() => parse_duration(s).map(Some),
        _ => Ok(None),
    }
}

pub fn expand_time_ptr(v: &Value) -> Result<Option<DateTime<Utc>>> {
    match v.as_str() {
        Some(s) if !s.is_empty() => DateTime::parse_from_rfc3339(s)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| CoreError::InvalidTime(s.to_string())),
        _ => Ok(None),
    }
}

pub fn expand_ip_ptr(v: &Value) -> Result<Option<IpAddr>> {
    match v.as_str() {
        Some(s) if !s.is_empty() => s
            .parse()
            .map(Some)
            .map_err(|_| CoreError::InvalidIp(s.to_string())),
        _ => Ok(None),
    }
}

/// Uuid part of a reference given as a bare uuid or a composite id
pub fn expand_id_ptr(v: &Value) -> Option<String> {
    expand_string_ptr(v).map(|s| crate::id::expand_id(&s).to_string())
}

pub fn flatten_string_ptr(s: Option<&str>) -> Value {
    Value::String(s.unwrap_or_default().to_string())
}

pub fn flatten_strings(items: &[String]) -> Value {
    Value::string_list(items.iter().cloned())
}

pub fn flatten_string_set(items: &[String]) -> Value {
    Value::string_set(items.iter().cloned())
}

pub fn flatten_bool_ptr(b: Option<bool>) -> Value {
    Value::Bool(b.unwrap_or(false))
}

pub fn flatten_int_ptr(i: Option<i64>) -> Value {
    Value::Int(i.unwrap_or(0))
}

pub fn flatten_string_map(m: &BTreeMap<String, String>) -> Value {
    Value::Map(
        m.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

pub fn flatten_time(t: Option<&DateTime<Utc>>) -> Value {
    match t {
        Some(t) => Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        None => Value::String(String::new()),
    }
}

pub fn flatten_duration(d: Option<Duration>) -> Value {
    match d {
        Some(d) => Value::String(format_duration(d)),
        None => Value::String(String::new()),
    }
}

pub fn flatten_ip(ip: Option<&IpAddr>) -> Value {
    Value::String(ip.map(IpAddr::to_string).unwrap_or_default())
}

/// An address with prefix length; a bare address is a host route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    pub addr: IpAddr,
    pub prefix: u8,
}

impl FromStr for Cidr {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let err = || CoreError::InvalidCidr(s.to_string());
        let (addr, prefix) = match s.split_once('/') {
            Some((a, p)) => (a, Some(p)),
            None => (s, None),
        };
        let addr: IpAddr = addr.parse().map_err(|_| err())?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        let prefix = match prefix {
            Some(p) => p.parse::<u8>().map_err(|_| err())?,
            None => max,
        };
        if prefix > max {
            return Err(err());
        }
        Ok(Cidr { addr, prefix })
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}
