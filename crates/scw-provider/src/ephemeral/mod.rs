//! Open-only resources whose values live for a single plan

mod iam_api_key;

pub use iam_api_key::IamApiKeyEphemeral;

use crate::resource::EphemeralResource;
use std::sync::Arc;

pub fn all() -> Vec<Arc<dyn EphemeralResource>> {
    vec![Arc::new(IamApiKeyEphemeral)]
}
