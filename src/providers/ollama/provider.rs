use async_trait::async_trait;
use reqwest::IntoUrl;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::api;
use crate::providers::cached_fetcher::{CacheSettings, CachedFetcher};
use crate::providers::{providers::ProviderIdentifier, Error, ErrorKind, ProviderAdapter};
use crate::registry::feature::{FeatureSpec, FeatureValue, ResolvedFeatures};
use crate::registry::spec::{Costs, ModelSpec, Probe};
use crate::registry::{Category, Registry};

impl From<api::Error> for Error {
    fn from(value: api::Error) -> Self {
        let kind = match &value {
            api::Error::InternalError(_) => Some(ErrorKind::InternalError),
            api::Error::InvalidApiBase(_) | api::Error::InvalidEndpoint(_) => {
                Some(ErrorKind::Configuration)
            }
            api::Error::NotFound(_) => Some(ErrorKind::NotFound),
            api::Error::BadRequest(_) => Some(ErrorKind::BadRequest),
            api::Error::RequestFailed(_) => None,
            api::Error::UnspecifiedError(_) => Some(ErrorKind::UnspecifiedError),
        };

        match (value, kind) {
            (api::Error::RequestFailed(err), _) => err.into(),
            (value, Some(kind)) => Error::from_source(kind, Box::new(value)),
            (value, None) => Error::from_source(ErrorKind::UnspecifiedError, Box::new(value)),
        }
    }
}

type Listing<T> = Arc<CachedFetcher<Vec<T>>>;

pub(crate) struct OllamaProvider {
    /// The models pulled locally.
    local: Listing<api::Tag>,
    /// The models loaded into memory.
    loaded: Listing<api::RunningModel>,
}

trait Named {
    fn name(&self) -> &str;
}

impl Named for api::Tag {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for api::RunningModel {
    fn name(&self) -> &str {
        &self.name
    }
}

fn is_embedding_model(tag: &api::Tag) -> bool {
    let family = tag.details.family.to_lowercase();

    tag.name.to_lowercase().contains("embed") || family.contains("bert")
}

/// Ollama takes sampling parameters in a nested `options` object.
fn apply_options(request: &mut Value, features: &ResolvedFeatures) {
    if features.is_empty() {
        return;
    }

    if !request.is_object() {
        *request = json!({});
    }

    let options = request
        .as_object_mut()
        .map(|body| body.entry("options").or_insert_with(|| json!({})));

    if let Some(Value::Object(options)) = options {
        for (name, value) in features {
            options.insert(name.clone(), value.as_json());
        }
    }
}

fn chat_features() -> BTreeMap<String, FeatureSpec> {
    BTreeMap::from([
        (
            "temperature".to_string(),
            FeatureSpec::number("sampling temperature", Some(0.0), Some(2.0))
                .with_default(FeatureValue::Number(0.8)),
        ),
        (
            "num_ctx".to_string(),
            FeatureSpec::number("size of the context window", Some(1.0), None)
                .with_default(FeatureValue::Number(2048.0)),
        ),
        (
            "top_k".to_string(),
            FeatureSpec::number("sample from the k most likely tokens", Some(1.0), None),
        ),
        (
            "seed".to_string(),
            FeatureSpec::number("random seed for reproducible output", None, None),
        ),
        (
            "stop".to_string(),
            FeatureSpec::array("sequences that end generation"),
        ),
    ])
}

impl OllamaProvider {
    pub(crate) fn with_api_base<U: IntoUrl>(
        api_base: U,
        settings: CacheSettings,
    ) -> Result<OllamaProvider, Error> {
        Ok(Self::with_api(api::OllamaApi::with_api_base(api_base)?, settings))
    }

    pub(crate) fn new(settings: CacheSettings) -> Result<OllamaProvider, Error> {
        Ok(Self::with_api(api::OllamaApi::new()?, settings))
    }

    fn with_api(api: api::OllamaApi, settings: CacheSettings) -> OllamaProvider {
        let api = Arc::new(api);

        let tags_api = Arc::clone(&api);
        let local = CachedFetcher::new("ollama /api/tags", settings, move || {
            let api = Arc::clone(&tags_api);

            async move { Ok::<_, Error>(api.tags().await?) }
        });

        let loaded = CachedFetcher::new("ollama /api/ps", settings, move || {
            let api = Arc::clone(&api);

            async move { Ok::<_, Error>(api.ps().await?) }
        });

        Self::with_listings(local, loaded)
    }

    fn with_listings(
        local: CachedFetcher<Vec<api::Tag>>,
        loaded: CachedFetcher<Vec<api::RunningModel>>,
    ) -> OllamaProvider {
        OllamaProvider {
            local: Arc::new(local),
            loaded: Arc::new(loaded),
        }
    }

    /// Whether the local Ollama server answers at all.
    pub(crate) async fn is_awake(&self) -> bool {
        self.local.get().await.is_some()
    }

    fn contains<T>(list: &Listing<T>, name: &str) -> impl Probe
    where
        T: Named + Clone + Send + Sync + 'static,
    {
        let list = Arc::clone(list);
        let name = name.to_string();

        move || {
            let list = Arc::clone(&list);
            let name = name.clone();

            async move {
                list.get()
                    .await
                    .map_or(false, |models| models.iter().any(|m| m.name() == name))
            }
        }
    }

    fn spec_for(&self, tag: &api::Tag) -> (Category, ModelSpec) {
        let spec = ModelSpec::new(ProviderIdentifier::Ollama.to_string(), tag.name.clone())
            .with_availability(Self::contains(&self.local, &tag.name))
            .with_hotness(Self::contains(&self.loaded, &tag.name))
            .with_costs(Costs {
                input: Some(0.0),
                output: Some(0.0),
                ..Costs::default()
            });

        if is_embedding_model(tag) {
            let spec = spec.with_feature(
                "truncate",
                FeatureSpec::boolean("truncate inputs that exceed the context")
                    .with_default(FeatureValue::Bool(true)),
            );

            (Category::Embedding, spec)
        } else {
            let mut spec = spec.with_request_hook(apply_options);
            spec.features = chat_features();

            (Category::Chat, spec)
        }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaProvider {
    fn id(&self) -> ProviderIdentifier {
        ProviderIdentifier::Ollama
    }

    async fn register(&self, registry: &Registry) -> Result<usize, Error> {
        // Shares the listing `is_awake` may already have fetched.
        let tags = self.local.get().await.ok_or_else(|| {
            Error::from_source(ErrorKind::Connection, "ollama did not list its models".into())
        })?;

        let mut by_category: BTreeMap<Category, Vec<ModelSpec>> = BTreeMap::new();

        for tag in &tags {
            let (category, spec) = self.spec_for(tag);

            by_category.entry(category).or_default().push(spec);
        }

        for (category, specs) in by_category {
            debug!(%category, models = specs.len(), "registering ollama models");

            registry.category(category).register(specs);
        }

        Ok(tags.len())
    }
}
