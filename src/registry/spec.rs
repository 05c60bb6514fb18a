//! The model descriptor: what a provider adapter registers for each model,
//! and the status derived from its probes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::feature::{FeatureSpec, ResolvedFeatures};

/// An availability or "hot" check. Implementations may go over the network
/// and are expected to cache and to swallow their own failures.
#[async_trait]
pub(crate) trait Probe: Send + Sync {
    async fn probe(&self) -> bool;
}

#[async_trait]
impl<F, Fut> Probe for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send,
{
    async fn probe(&self) -> bool {
        (self)().await
    }
}

/// Shapes the vendor request body right before it is dispatched. Called once
/// per request with the features resolved from the model name.
pub(crate) type RequestHook = Arc<dyn Fn(&mut serde_json::Value, &ResolvedFeatures) + Send + Sync>;

/// Prices in dollars per million tokens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Costs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_input: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<f64>,
}

/// Relative capability scores. Higher is better; providers pick their own
/// scale, conventionally 1 through 5.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Scores {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intelligence: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search: Option<i64>,
}

#[derive(Clone, Serialize)]
pub(crate) struct ModelSpec {
    pub model_id: String,
    /// The provider display name, the first half of the registry key.
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u64>,
    pub costs: Costs,
    pub scores: Scores,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, FeatureSpec>,
    /// Absent means the model is never available.
    #[serde(skip)]
    pub is_available: Option<Arc<dyn Probe>>,
    /// Absent means the model is always hot.
    #[serde(skip)]
    pub is_hot: Option<Arc<dyn Probe>>,
    #[serde(skip)]
    pub mangle_request: Option<RequestHook>,
}

impl fmt::Debug for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSpec")
            .field("model_id", &self.model_id)
            .field("provider", &self.provider)
            .field("context_length", &self.context_length)
            .field("max_completion_tokens", &self.max_completion_tokens)
            .field("costs", &self.costs)
            .field("scores", &self.scores)
            .field("features", &self.features.keys().collect::<Vec<_>>())
            .field("is_available", &self.is_available.is_some())
            .field("is_hot", &self.is_hot.is_some())
            .field("mangle_request", &self.mangle_request.is_some())
            .finish()
    }
}

impl ModelSpec {
    pub(crate) fn new<P: Into<String>, M: Into<String>>(provider: P, model_id: M) -> ModelSpec {
        ModelSpec {
            model_id: model_id.into(),
            provider: provider.into(),
            context_length: None,
            max_completion_tokens: None,
            costs: Costs::default(),
            scores: Scores::default(),
            features: BTreeMap::new(),
            is_available: None,
            is_hot: None,
            mangle_request: None,
        }
    }

    /// The registry key, `provider:model_id` in lower case.
    pub(crate) fn key(&self) -> String {
        format!("{}:{}", self.provider, self.model_id).to_lowercase()
    }

    pub(crate) fn with_context_length(mut self, context_length: u64) -> ModelSpec {
        self.context_length = Some(context_length);
        self
    }

    pub(crate) fn with_max_completion_tokens(mut self, max_completion_tokens: u64) -> ModelSpec {
        self.max_completion_tokens = Some(max_completion_tokens);
        self
    }

    pub(crate) fn with_costs(mut self, costs: Costs) -> ModelSpec {
        self.costs = costs;
        self
    }

    pub(crate) fn with_scores(mut self, scores: Scores) -> ModelSpec {
        self.scores = scores;
        self
    }

    pub(crate) fn with_feature<S: Into<String>>(mut self, name: S, feature: FeatureSpec) -> ModelSpec {
        self.features.insert(name.into(), feature);
        self
    }

    pub(crate) fn with_availability<P: Probe + 'static>(mut self, probe: P) -> ModelSpec {
        self.is_available = Some(Arc::new(probe));
        self
    }

    pub(crate) fn with_hotness<P: Probe + 'static>(mut self, probe: P) -> ModelSpec {
        self.is_hot = Some(Arc::new(probe));
        self
    }

    pub(crate) fn with_request_hook<H>(mut self, hook: H) -> ModelSpec
    where
        H: Fn(&mut serde_json::Value, &ResolvedFeatures) + Send + Sync + 'static,
    {
        self.mangle_request = Some(Arc::new(hook));
        self
    }

    /// Runs both probes concurrently and derives the status.
    pub(crate) async fn status(&self) -> (Status, bool, bool) {
        let available = async {
            match &self.is_available {
                Some(probe) => probe.probe().await,
                None => false,
            }
        };

        let hot = async {
            match &self.is_hot {
                Some(probe) => probe.probe().await,
                None => true,
            }
        };

        let (available, hot) = futures_util::join!(available, hot);

        (Status::derive(available, hot), available, hot)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display, strum_macros::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Status {
    /// Available and warmed up.
    Online,
    /// Available, but the first request pays for a cold start.
    Cold,
    Offline,
}

impl Status {
    pub(crate) fn derive(available: bool, hot: bool) -> Status {
        match (available, hot) {
            (true, true) => Status::Online,
            (true, false) => Status::Cold,
            (false, _) => Status::Offline,
        }
    }
}

/// A point-in-time view of one registered model. Never cached; every query
/// runs the probes again (the probes do their own caching).
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ModelStatus {
    pub key: String,
    pub status: Status,
    pub available: bool,
    pub hot: bool,
    #[serde(rename = "model")]
    pub spec: Arc<ModelSpec>,
}

#[cfg(test)]
pub(crate) mod testing {
    //! Probe helpers shared by the registry tests.

    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    pub(crate) fn fixed(value: bool) -> impl Probe {
        move || async move { value }
    }

    /// A probe whose answer can be flipped after registration.
    pub(crate) fn switch(value: bool) -> (Arc<AtomicBool>, impl Probe) {
        let flag = Arc::new(AtomicBool::new(value));
        let probe_flag = Arc::clone(&flag);

        let probe = move || {
            let value = probe_flag.load(Ordering::SeqCst);
            async move { value }
        };

        (flag, probe)
    }
}
