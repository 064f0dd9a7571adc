//! Resource, data source and ephemeral resource traits
//!
//! Lifecycle callbacks see one [`ResourceData`]: the working state tree, the
//! composite id, the change set of the current update and the phase timeout.
//! Callbacks never persist anything themselves; the driver turns the final
//! `ResourceData` into the new state handed back to the host.

use crate::error::Result;
use crate::meta::Meta;
use async_trait::async_trait;
use scw_core::{ChangeSet, Context, Diagnostic, Diagnostics, Object, Schema, Value};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    id: Option<String>,
    state: Object,
    changes: ChangeSet,
    timeout: Duration,
    warnings: Diagnostics,
}

impl ResourceData {
    pub fn new(id: Option<String>, state: Object) -> Self {
        Self {
            id,
            state,
            timeout: scw_core::schema::DEFAULT_TIMEOUT,
            ..Self::default()
        }
    }

    pub fn with_changes(mut self, changes: ChangeSet) -> Self {
        self.changes = changes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl ToString) {
        self.id = Some(id.to_string());
    }

    /// Mark the remote object as gone
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn get(&self, name: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.state.get(name).unwrap_or(&NULL)
    }

    /// String attribute, empty when unset
    pub fn get_str(&self, name: &str) -> &str {
        self.get(name).as_str().unwrap_or_default()
    }

    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name).as_bool().unwrap_or(false)
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.state.insert(name.to_string(), value.into());
    }

    pub fn has_change(&self, name: &str) -> bool {
        self.changes.has_change(name)
    }

    pub fn has_any_change(&self, names: &[&str]) -> bool {
        self.changes.has_any(names)
    }

    /// Prior value of an attribute changed by the current update
    pub fn old(&self, name: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.changes.get(name).map(|c| &c.old).unwrap_or(&NULL)
    }

    /// Value before the current update, changed or not
    pub fn prior(&self, name: &str) -> &Value {
        match self.changes.get(name) {
            Some(c) => &c.old,
            None => self.get(name),
        }
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Attach a non-fatal diagnostic to the response
    pub fn warn(&mut self, diag: Diagnostic) {
        self.warnings.push(diag);
    }

    pub fn state(&self) -> &Object {
        &self.state
    }

    pub fn into_parts(self) -> (Option<String>, Object, Diagnostics) {
        (self.id, self.state, self.warnings)
    }
}

/// A managed resource type
#[async_trait]
pub trait Resource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Checks the declarative schema cannot express
    fn validate(&self, _config: &Object) -> Diagnostics {
        Diagnostics::new()
    }

    async fn create(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()>;

    /// Refresh `d` from the cloud; clear the id when the object is gone
    async fn read(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()>;

    async fn update(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()>;

    async fn delete(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()>;

    /// Normalize an import id before the first read
    fn import_id(&self, id: &str) -> Result<String> {
        Ok(id.to_string())
    }

    /// Upgrade raw state written by schema version `from` to `from + 1`
    fn upgrade(
        &self,
        from: u32,
        state: serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        let _ = from;
        Ok(state)
    }
}

/// A read-only lookup
#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn read(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()>;
}

/// An open-only resource whose value lives for one plan
#[async_trait]
pub trait EphemeralResource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn open(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use scw_core::{Change, object};

    #[test]
    fn test_old_value_from_changes() {
        let mut changes = ChangeSet::new();
        changes.insert(
            "name",
            Change {
                old: "a".into(),
                new: "b".into(),
            },
        );
        let d = ResourceData::new(Some("id".into()), object! { "name" => "b" })
            .with_changes(changes);
        assert!(d.has_change("name"));
        assert_eq!(d.old("name"), &Value::from("a"));
        assert_eq!(d.get_str("name"), "b");
        assert!(d.get("missing").is_null());
    }
}
