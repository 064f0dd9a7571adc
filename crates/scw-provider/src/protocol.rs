//! Host protocol messages
//!
//! One JSON object per line in each direction. Requests are tagged by
//! `method`; every response echoes the request `seq`.

use scw_core::duration::parse_duration;
use scw_core::{CoreError, Diagnostics, Timeouts};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub seq: u64,
    #[serde(flatten)]
    pub request: Request,
}

/// Per-request timeouts as Go duration strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimeoutsSpec {
    pub create: Option<String>,
    pub read: Option<String>,
    pub update: Option<String>,
    pub delete: Option<String>,
}

impl TimeoutsSpec {
    /// `declared` with every phase given here replaced
    pub fn apply(&self, declared: Timeouts) -> Result<Timeouts, CoreError> {
        let pick = |raw: &Option<String>, base| match raw.as_deref() {
            Some(s) if !s.is_empty() => parse_duration(s),
            _ => Ok(base),
        };
        Ok(Timeouts {
            create: pick(&self.create, declared.create)?,
            read: pick(&self.read, declared.read)?,
            update: pick(&self.update, declared.update)?,
            delete: pick(&self.delete, declared.delete)?,
        })
    }
}

/// Which registry a `Validate` request targets; names overlap between them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    #[default]
    Resource,
    DataSource,
    Ephemeral,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method")]
pub enum Request {
    GetProviderSchema,
    ConfigureProvider {
        #[serde(default)]
        config: Json,
    },
    Validate {
        type_name: String,
        #[serde(default)]
        kind: TypeKind,
        config: Json,
    },
    PlanDiff {
        type_name: String,
        #[serde(default)]
        prior_state: Option<Json>,
        config: Json,
    },
    Create {
        type_name: String,
        planned_state: Json,
        #[serde(default)]
        private: Option<Json>,
        #[serde(default)]
        timeouts: TimeoutsSpec,
    },
    Read {
        type_name: String,
        prior_state: Json,
        #[serde(default)]
        private: Option<Json>,
        #[serde(default)]
        timeouts: TimeoutsSpec,
    },
    Update {
        type_name: String,
        prior_state: Json,
        planned_state: Json,
        #[serde(default)]
        private: Option<Json>,
        #[serde(default)]
        timeouts: TimeoutsSpec,
    },
    Delete {
        type_name: String,
        prior_state: Json,
        #[serde(default)]
        timeouts: TimeoutsSpec,
    },
    Import {
        type_name: String,
        id: String,
        #[serde(default)]
        timeouts: TimeoutsSpec,
    },
    UpgradeState {
        type_name: String,
        version: u32,
        raw_state: Json,
    },
    ReadDataSource {
        type_name: String,
        config: Json,
    },
    OpenEphemeral {
        type_name: String,
        config: Json,
    },
    Stop,
}

impl Request {
    pub fn method(&self) -> &'static str {
        match self {
            Request::GetProviderSchema => "GetProviderSchema",
            Request::ConfigureProvider { .. } => "ConfigureProvider",
            Request::Validate { .. } => "Validate",
            Request::PlanDiff { .. } => "PlanDiff",
            Request::Create { .. } => "Create",
            Request::Read { .. } => "Read",
            Request::Update { .. } => "Update",
            Request::Delete { .. } => "Delete",
            Request::Import { .. } => "Import",
            Request::UpgradeState { .. } => "UpgradeState",
            Request::ReadDataSource { .. } => "ReadDataSource",
            Request::OpenEphemeral { .. } => "OpenEphemeral",
            Request::Stop => "Stop",
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        match self {
            Request::Validate { type_name, .. }
            | Request::PlanDiff { type_name, .. }
            | Request::Create { type_name, .. }
            | Request::Read { type_name, .. }
            | Request::Update { type_name, .. }
            | Request::Delete { type_name, .. }
            | Request::Import { type_name, .. }
            | Request::UpgradeState { type_name, .. }
            | Request::ReadDataSource { type_name, .. }
            | Request::OpenEphemeral { type_name, .. } => Some(type_name),
            _ => None,
        }
    }
}

/// Reply to one request; absent fields do not apply to the method
///
/// `new_state` is `Some(Json::Null)` when the object no longer exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Response {
    pub seq: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_state: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned_state: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_replace: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_paths: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgraded_state: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<Json>,
    pub diagnostics: Diagnostics,
}

impl Response {
    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    pub fn diagnostics(diagnostics: Diagnostics) -> Self {
        Self {
            diagnostics,
            ..Self::default()
        }
    }

    /// A state-carrying reply; a missing state is sent as `null`
    pub fn state(new_state: Option<Json>, diagnostics: Diagnostics) -> Self {
        Self {
            new_state: Some(new_state.unwrap_or(Json::Null)),
            diagnostics,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_decode_tagged_request() {
        let raw = json!({
            "seq": 7,
            "method": "Create",
            "type_name": "scaleway_lb",
            "planned_state": {"type": "LB-S"},
            "timeouts": {"create": "20m"},
        });
        let env: Envelope = serde_json::from_value(raw).unwrap();
        assert_eq!(env.seq, 7);
        assert_eq!(env.request.method(), "Create");
        assert_eq!(env.request.type_name(), Some("scaleway_lb"));
        let Request::Create { timeouts, .. } = env.request else {
            panic!("expected create");
        };
        let applied = timeouts.apply(Timeouts::default()).unwrap();
        assert_eq!(applied.create, Duration::from_secs(20 * 60));
        assert_eq!(applied.read, scw_core::schema::DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_validate_kind_defaults_to_resource() {
        let env: Envelope = serde_json::from_value(json!({
            "seq": 2, "method": "Validate", "type_name": "scaleway_lb", "config": {},
        }))
        .unwrap();
        assert!(matches!(env.request, Request::Validate { kind: TypeKind::Resource, .. }));
        let env: Envelope = serde_json::from_value(json!({
            "seq": 3, "method": "Validate", "type_name": "scaleway_lb",
            "kind": "data_source", "config": {},
        }))
        .unwrap();
        assert!(matches!(env.request, Request::Validate { kind: TypeKind::DataSource, .. }));
    }

    #[test]
    fn test_unit_methods_decode() {
        let env: Envelope = serde_json::from_value(json!({"seq": 1, "method": "Stop"})).unwrap();
        assert!(matches!(env.request, Request::Stop));
    }

    #[test]
    fn test_removed_state_is_null() {
        let resp = Response::state(None, Diagnostics::new()).with_seq(3);
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"seq": 3, "new_state": null, "diagnostics": []})
        );
    }

    #[test]
    fn test_bad_timeout_rejected() {
        let spec = TimeoutsSpec {
            delete: Some("soon".into()),
            ..TimeoutsSpec::default()
        };
        assert!(spec.apply(Timeouts::default()).is_err());
    }
}
