use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::providers::cached_fetcher::{CacheSettings, CachedFetcher};
use crate::providers::openai::api;
use crate::providers::openai::models::{features_for, CatalogEntry, OPENAI_MODELS};
use crate::providers::{providers::ProviderIdentifier, Error, ErrorKind, ProviderAdapter};
use crate::registry::feature::ResolvedFeatures;
use crate::registry::spec::{ModelSpec, Probe};
use crate::registry::{Category, Registry};

impl From<api::Error> for Error {
    fn from(value: api::Error) -> Self {
        let kind = match &value {
            api::Error::Authentication(_) | api::Error::PermissionDenied(_) => {
                ErrorKind::Authentication
            }
            api::Error::BadRequest(_) => ErrorKind::BadRequest,
            api::Error::InvalidApiBase(_) | api::Error::InvalidEndpoint(_) => {
                ErrorKind::Configuration
            }
            api::Error::InternalError(_) => ErrorKind::InternalError,
            api::Error::NotFound(_) => ErrorKind::NotFound,
            api::Error::RateLimit(_) => ErrorKind::ExcessUsage,
            api::Error::UnknownStatus(_) => ErrorKind::UnspecifiedError,
            api::Error::ApiOverloaded(_) => ErrorKind::ApiOverloaded,
            api::Error::RequestFailed(_) => ErrorKind::Connection,
        };

        match value {
            api::Error::RequestFailed(err) => err.into(),
            value => Error::from_source(kind, Box::new(value)),
        }
    }
}

/// Copies the resolved features into the top level of a request body.
fn apply_features(request: &mut Value, features: &ResolvedFeatures) {
    if let Value::Object(body) = request {
        for (name, value) in features {
            body.insert(name.clone(), value.as_json());
        }
    }
}

/// o-series models reject the sampling parameters and want
/// `max_completion_tokens` in place of `max_tokens`.
fn apply_reasoning_features(request: &mut Value, features: &ResolvedFeatures) {
    if !request.is_object() {
        *request = json!({});
    }

    apply_features(request, features);

    if let Value::Object(body) = request {
        body.remove("temperature");
        body.remove("top_p");

        if let Some(max_tokens) = body.remove("max_tokens") {
            body.entry("max_completion_tokens").or_insert(max_tokens);
        }
    }
}

pub(crate) struct OpenAIProvider {
    /// Ids of the models the key can reach, from `/v1/models`.
    reachable: Arc<CachedFetcher<Vec<String>>>,
}

impl OpenAIProvider {
    pub(crate) fn new(
        api_key: &str,
        api_base: Option<&str>,
        settings: CacheSettings,
    ) -> Result<OpenAIProvider, Error> {
        if api_key.trim().is_empty() {
            return Err(Error::configuration("the OpenAI API key is empty"));
        }

        let api = Arc::new(api::OpenAIApi::new(
            api_key,
            api_base.unwrap_or(api::DEFAULT_API_BASE),
        )?);

        let reachable = CachedFetcher::new("openai /v1/models", settings, move || {
            let api = Arc::clone(&api);

            async move {
                let models = api.models().await?;

                Ok::<_, Error>(models.into_iter().map(|m| m.id).collect())
            }
        });

        Ok(OpenAIProvider {
            reachable: Arc::new(reachable),
        })
    }

    fn reachable(&self, id: &'static str) -> impl Probe {
        let reachable = Arc::clone(&self.reachable);

        move || {
            let reachable = Arc::clone(&reachable);

            async move {
                reachable
                    .get()
                    .await
                    .map_or(false, |ids| ids.iter().any(|m| m == id))
            }
        }
    }

    fn spec_for(&self, entry: &CatalogEntry) -> ModelSpec {
        let mut spec = ModelSpec::new(ProviderIdentifier::OpenAI.to_string(), entry.id)
            .with_costs(entry.costs.clone())
            .with_scores(entry.scores.clone())
            .with_availability(self.reachable(entry.id));

        if let Some(context_length) = entry.context_length {
            spec = spec.with_context_length(context_length);
        }

        if let Some(max_completion_tokens) = entry.max_completion_tokens {
            spec = spec.with_max_completion_tokens(max_completion_tokens);
        }

        for (name, feature) in features_for(entry) {
            spec = spec.with_feature(name, feature);
        }

        if entry.reasoning {
            spec.with_request_hook(apply_reasoning_features)
        } else {
            spec.with_request_hook(apply_features)
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAIProvider {
    fn id(&self) -> ProviderIdentifier {
        ProviderIdentifier::OpenAI
    }

    async fn register(&self, registry: &Registry) -> Result<usize, Error> {
        let mut by_category: BTreeMap<Category, Vec<ModelSpec>> = BTreeMap::new();

        for entry in OPENAI_MODELS.iter() {
            by_category
                .entry(entry.category)
                .or_default()
                .push(self.spec_for(entry));
        }

        let mut registered = 0;

        for (category, specs) in by_category {
            debug!(%category, models = specs.len(), "registering openai models");

            registered += specs.len();
            registry.category(category).register(specs);
        }

        Ok(registered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::feature::FeatureValue;

    fn features(pairs: &[(&str, FeatureValue)]) -> ResolvedFeatures {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_empty_key_is_a_configuration_error() {
        let err = OpenAIProvider::new("  ", None, CacheSettings::default())
            .err()
            .unwrap();

        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_invalid_api_base_is_a_configuration_error() {
        let err = OpenAIProvider::new("sk-test", Some("not a url"), CacheSettings::default())
            .err()
            .unwrap();

        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_features_are_copied_to_the_body() {
        let mut request = json!({ "model": "gpt-4o" });

        apply_features(
            &mut request,
            &features(&[
                ("temperature", FeatureValue::Number(0.3)),
                ("stop", FeatureValue::Array(vec!["END".to_string()])),
            ]),
        );

        assert_eq!(
            request,
            json!({ "model": "gpt-4o", "temperature": 0.3, "stop": ["END"] })
        );
    }

    #[test]
    fn test_reasoning_hook_maps_effort() {
        let mut request = json!({
            "model": "o3",
            "temperature": 1.0,
            "max_tokens": 2048
        });

        apply_reasoning_features(
            &mut request,
            &features(&[(
                "reasoning_effort",
                FeatureValue::String("high".to_string()),
            )]),
        );

        assert_eq!(
            request,
            json!({
                "model": "o3",
                "reasoning_effort": "high",
                "max_completion_tokens": 2048
            })
        );
    }

    #[tokio::test]
    async fn test_register_covers_every_category() {
        let provider = OpenAIProvider::new(
            "sk-test",
            Some("http://127.0.0.1:9"),
            CacheSettings::default(),
        )
        .unwrap();

        let registry = Registry::new();
        let registered = provider.register(&registry).await.unwrap();

        assert_eq!(registered, OPENAI_MODELS.len());
        assert!(registry.chat().get("openai:gpt-4o").is_some());
        assert!(registry
            .category(Category::Embedding)
            .get("openai:text-embedding-3-small")
            .is_some());
        assert!(registry.category(Category::Reranking).is_empty());

        let o3 = registry.chat().get("openai:o3").unwrap();
        assert!(o3.features.contains_key("reasoning_effort"));
        assert!(o3.mangle_request.is_some());
    }
}
