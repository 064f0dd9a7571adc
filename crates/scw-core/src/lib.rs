//! Scaleway provider core
//!
//! Building blocks shared by the API client and the provider plugin:
//! localities and composite identifiers, schema-world values and their
//! conversion to SDK types, diff suppression, plan diffs, and the
//! cancellable polling waiter.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │             host (plan / apply / read)          │
//! └─────────────────┬───────────────────────────────┘
//!                   │ JSON lines
//! ┌─────────────────▼───────────────────────────────┐
//! │                 scw-provider                    │
//! │   resource drivers, data sources, migrations    │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐ ┌────────────┐
//! │   scw-core    │ │    scw-api    │ │ scw-config │
//! │ ids, schemas, │ │  IAM / LB /   │ │  profiles, │
//! │ diffs, waiter │ │  Kubernetes   │ │  env vars  │
//! └───────────────┘ └───────────────┘ └────────────┘
//! ```

pub mod classify;
pub mod context;
pub mod convert;
pub mod diagnostic;
pub mod diff;
pub mod duration;
pub mod error;
pub mod hash;
pub mod id;
pub mod locality;
pub mod path;
pub mod plan;
pub mod schema;
pub mod value;
pub mod waiter;

// Re-exports
pub use classify::{Classify, ErrorKind};
pub use context::Context;
pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use error::{CoreError, Result};
pub use id::{MemberId, MemberKind, RegionalId, ZonedId, ZonedNestedId};
pub use locality::{Locality, Region, Zone};
pub use path::{AttributePath, PathStep};
pub use plan::{Change, ChangeSet, PlannedDiff, plan_diff};
pub use schema::{Attribute, Block, Schema, Timeouts, Type};
pub use value::{Object, Value};
pub use waiter::{Poll, WaitError, WaitOptions, wait_for};
