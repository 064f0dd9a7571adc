//! Typed Scaleway API client
//!
//! One trait per product API ([`IamApi`], [`LbApi`], [`K8sApi`]) so that
//! resources depend on behaviour rather than on HTTP. [`ScwClient`]
//! implements all of them over `reqwest`; the `fake` feature adds an
//! in-memory implementation for tests.

pub mod client;
pub mod error;
#[cfg(feature = "fake")]
pub mod fake;
pub mod iam;
pub mod k8s;
pub mod lb;
pub mod wire;

pub use client::{ClientConfig, ScwClient};
pub use error::{ApiError, Result};
pub use iam::IamApi;
pub use k8s::K8sApi;
pub use lb::LbApi;

/// Every product API behind one object
pub trait CloudApi: IamApi + LbApi + K8sApi {}

impl<T: IamApi + LbApi + K8sApi> CloudApi for T {}
