//! Scaleway provider plugin
//!
//! Resource, data source and ephemeral drivers for IAM, Load Balancer and
//! Kubernetes, the registry that dispatches host requests to them, and the
//! JSON-lines server the host talks to.

pub mod datasources;
pub mod driver;
pub mod ephemeral;
pub mod error;
pub mod meta;
pub mod migrate;
pub mod protocol;
pub mod provider;
pub mod relation;
pub mod resource;
pub mod resources;
pub mod server;

pub use driver::{Driver, Outcome, PlanOutcome};
pub use error::{ProviderError, Result};
pub use meta::Meta;
pub use protocol::{Envelope, Request, Response, TimeoutsSpec, TypeKind};
pub use provider::Provider;
pub use resource::{DataSource, EphemeralResource, Resource, ResourceData};
pub use server::{serve, serve_stdio};
