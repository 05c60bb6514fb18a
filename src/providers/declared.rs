//! Models declared by hand in the `[[models]]` section of the config file.
//!
//! These cover anything the built-in adapters do not: self-hosted
//! OpenAI-compatible servers, rerankers, and so on. Availability is decided by
//! a health URL (any 2xx answer), or is unconditional with `always_available`.
//! Entries with neither are registered but never available.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::warn;

use crate::config::DeclaredModel;
use crate::providers::apireq::{self, Url};
use crate::providers::cached_fetcher::{CacheSettings, CachedFetcher};
use crate::providers::{providers::ProviderIdentifier, Error, ProviderAdapter};
use crate::registry::feature::ResolvedFeatures;
use crate::registry::spec::{ModelSpec, Probe};
use crate::registry::{Category, Registry};

type HealthCheck = Arc<CachedFetcher<()>>;

pub(crate) struct DeclaredProvider {
    models: Vec<DeclaredModel>,
    settings: CacheSettings,
    client: Client,
}

/// Writes the resolved features into the top level of the request body.
fn apply_features(request: &mut serde_json::Value, features: &ResolvedFeatures) {
    if let serde_json::Value::Object(body) = request {
        for (name, value) in features {
            body.insert(name.clone(), value.as_json());
        }
    }
}

fn health_probe(check: &HealthCheck) -> impl Probe {
    let check = Arc::clone(check);

    move || {
        let check = Arc::clone(&check);

        async move { check.get().await.is_some() }
    }
}

fn validate(model: &DeclaredModel) -> Result<Option<Url>, Error> {
    if model.provider.trim().is_empty() || model.model_id.trim().is_empty() {
        return Err(Error::configuration(
            "declared models need both a provider and a model_id",
        ));
    }

    if model.provider.contains(':') {
        return Err(Error::configuration(format!(
            "the provider name \"{}\" may not contain ':'",
            model.provider
        )));
    }

    model
        .health_url
        .as_deref()
        .map(|url| {
            Url::parse(url).map_err(|err| {
                Error::configuration(format!("invalid health_url \"{}\": {}", url, err))
            })
        })
        .transpose()
}

impl DeclaredProvider {
    pub(crate) fn new(models: Vec<DeclaredModel>, settings: CacheSettings) -> DeclaredProvider {
        DeclaredProvider {
            models,
            settings,
            client: Client::new(),
        }
    }

    /// One fetcher per distinct URL, so models served by the same process
    /// share a single health request.
    fn health_check(&self, checks: &mut HashMap<Url, HealthCheck>, url: Url) -> HealthCheck {
        let settings = self.settings;
        let client = self.client.clone();

        Arc::clone(checks.entry(url.clone()).or_insert_with(|| {
            Arc::new(CachedFetcher::new(url.to_string(), settings, move || {
                let client = client.clone();
                let url = url.clone();

                async move {
                    apireq::get_ok(&client, url).await?;

                    Ok::<_, Error>(())
                }
            }))
        }))
    }

    fn spec_for(
        &self,
        model: &DeclaredModel,
        health_url: Option<Url>,
        checks: &mut HashMap<Url, HealthCheck>,
    ) -> ModelSpec {
        let mut spec = ModelSpec::new(model.provider.clone(), model.model_id.clone())
            .with_costs(model.costs.clone())
            .with_scores(model.scores.clone());

        spec.context_length = model.context_length;
        spec.max_completion_tokens = model.max_completion_tokens;
        spec.features = model.features.clone();

        if !spec.features.is_empty() {
            spec = spec.with_request_hook(apply_features);
        }

        if let Some(url) = health_url {
            let check = self.health_check(checks, url);

            spec.with_availability(health_probe(&check))
        } else if model.always_available {
            spec.with_availability(|| async { true })
        } else {
            spec
        }
    }
}

#[async_trait]
impl ProviderAdapter for DeclaredProvider {
    fn id(&self) -> ProviderIdentifier {
        ProviderIdentifier::Declared
    }

    async fn register(&self, registry: &Registry) -> Result<usize, Error> {
        let mut checks = HashMap::new();
        let mut by_category: BTreeMap<Category, Vec<ModelSpec>> = BTreeMap::new();

        for model in &self.models {
            let health_url = match validate(model) {
                Ok(health_url) => health_url,
                Err(err) => {
                    warn!(
                        provider = %model.provider,
                        model = %model.model_id,
                        "skipping declared model: {}",
                        err
                    );
                    continue;
                }
            };

            let spec = self.spec_for(model, health_url, &mut checks);

            by_category.entry(model.category).or_default().push(spec);
        }

        let mut registered = 0;

        for (category, specs) in by_category {
            registered += specs.len();
            registry.category(category).register(specs);
        }

        Ok(registered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::spec::Status;

    fn declared(provider: &str, model_id: &str) -> DeclaredModel {
        DeclaredModel {
            category: Category::Chat,
            provider: provider.to_string(),
            model_id: model_id.to_string(),
            context_length: Some(32768),
            max_completion_tokens: None,
            costs: Default::default(),
            scores: Default::default(),
            health_url: None,
            always_available: false,
            features: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_always_available_and_unprobed_models() {
        let mut always = declared("local", "bge-reranker");
        always.category = Category::Reranking;
        always.always_available = true;

        let never = declared("local", "qwen2.5-7b");

        let provider = DeclaredProvider::new(vec![always, never], CacheSettings::default());
        let registry = Registry::new();

        assert_eq!(provider.register(&registry).await.unwrap(), 2);

        let statuses = registry.category(Category::Reranking).statuses().await;
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].status, Status::Online);

        let statuses = registry.chat().statuses().await;
        assert_eq!(statuses[0].key, "local:qwen2.5-7b");
        assert_eq!(statuses[0].status, Status::Offline);
    }

    #[tokio::test]
    async fn test_malformed_entries_are_skipped() {
        let mut bad_url = declared("local", "a");
        bad_url.health_url = Some("not a url".to_string());

        let models = vec![
            bad_url,
            declared("", "b"),
            declared("lo:cal", "c"),
            declared("local", "d"),
        ];

        let provider = DeclaredProvider::new(models, CacheSettings::default());
        let registry = Registry::new();

        assert_eq!(provider.register(&registry).await.unwrap(), 1);
        assert!(registry.chat().get("local:d").is_some());
    }

    #[test]
    fn test_health_checks_are_shared_per_url() {
        let provider = DeclaredProvider::new(Vec::new(), CacheSettings::default());
        let mut checks = HashMap::new();

        let url = Url::parse("http://localhost:8000/health").unwrap();
        let other = Url::parse("http://localhost:8001/health").unwrap();

        let first = provider.health_check(&mut checks, url.clone());
        let second = provider.health_check(&mut checks, url);
        let third = provider.health_check(&mut checks, other);

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(checks.len(), 2);
    }
}
