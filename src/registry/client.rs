use serde::Serialize;
use std::sync::Arc;

use super::feature::{FeatureValue, ResolvedFeatures};
use super::spec::ModelSpec;
use super::Category;

/// A resolved model together with the validated per-call features. This is
/// what the category clients are built from.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ClientHandle {
    pub category: Category,
    pub key: String,
    #[serde(rename = "model")]
    pub spec: Arc<ModelSpec>,
    pub features: ResolvedFeatures,
}

impl ClientHandle {
    pub(crate) fn new(
        category: Category,
        key: String,
        spec: Arc<ModelSpec>,
        features: ResolvedFeatures,
    ) -> ClientHandle {
        ClientHandle {
            category,
            key,
            spec,
            features,
        }
    }

    pub(crate) fn model_id(&self) -> &str {
        &self.spec.model_id
    }

    pub(crate) fn feature(&self, name: &str) -> Option<&FeatureValue> {
        self.features.get(name)
    }

    /// Gives the model's request hook its single chance to shape `request`.
    /// Must be called exactly once per request, right before dispatch.
    pub(crate) fn prepare_request(&self, request: &mut serde_json::Value) {
        if let Some(hook) = &self.spec.mangle_request {
            hook(request, &self.features);
        }
    }
}
