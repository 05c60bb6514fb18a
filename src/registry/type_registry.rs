//! The per-category catalog: registration, status sweeps, and resolution of
//! model names to client handles.

use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

use super::client::ClientHandle;
use super::feature::ResolvedFeatures;
use super::name::{KeyPattern, ModelName};
use super::spec::{ModelSpec, ModelStatus};
use super::{Category, Error};

type Specs = BTreeMap<String, Arc<ModelSpec>>;

pub(crate) struct TypeRegistry {
    category: Category,
    specs: RwLock<Specs>,
}

impl TypeRegistry {
    pub(crate) fn new(category: Category) -> TypeRegistry {
        TypeRegistry {
            category,
            specs: RwLock::new(BTreeMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Specs> {
        self.specs.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Specs> {
        self.specs.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn category(&self) -> Category {
        self.category
    }

    pub(crate) fn len(&self) -> usize {
        self.read().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<ModelSpec>> {
        self.read().get(&key.to_lowercase()).cloned()
    }

    /// The registered specs, ordered by key, as of now.
    pub(crate) fn snapshot(&self) -> Vec<(String, Arc<ModelSpec>)> {
        self.read()
            .iter()
            .map(|(key, spec)| (key.clone(), Arc::clone(spec)))
            .collect()
    }

    /// Stores every spec under its key, replacing whatever was registered
    /// under that key before.
    ///
    /// Afterwards a background sweep runs every probe once so that their
    /// caches are warm by the time someone asks. The sweep is detached and its
    /// outcome discarded; outside of a tokio runtime it is skipped.
    pub(crate) fn register<I: IntoIterator<Item = ModelSpec>>(&self, specs: I) {
        {
            let mut registered = self.write();

            for spec in specs {
                let key = spec.key();

                if registered.insert(key.clone(), Arc::new(spec)).is_some() {
                    debug!(category = %self.category, key = %key, "replaced a registered model");
                }
            }
        }

        let snapshot = self.snapshot();
        let category = self.category;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let statuses = sweep(snapshot).await;
                    trace!(category = %category, models = statuses.len(), "pre-warm sweep finished");
                });
            }
            Err(_) => trace!(category = %category, "no runtime, skipping the pre-warm sweep"),
        }
    }

    /// Probes every registered model.
    pub(crate) async fn statuses(&self) -> Vec<ModelStatus> {
        sweep(self.snapshot()).await
    }

    /// [`TypeRegistry::statuses`], grouped by provider display name.
    pub(crate) async fn statuses_by_provider(&self) -> BTreeMap<String, Vec<ModelStatus>> {
        let mut grouped: BTreeMap<String, Vec<ModelStatus>> = BTreeMap::new();

        for status in self.statuses().await {
            grouped
                .entry(status.spec.provider.clone())
                .or_default()
                .push(status);
        }

        grouped
    }

    /// Resolves `provider:model[?features]` to a client handle.
    ///
    /// A wildcard base must match exactly one key. Every feature must be
    /// declared by the model and its value must satisfy the declaration.
    pub(crate) fn resolve(&self, name: &str) -> Result<ClientHandle, Error> {
        let parsed = ModelName::parse(name);
        let specs = self.snapshot();

        let key = if parsed.is_pattern() {
            let pattern = KeyPattern::new(parsed.base)?;
            let matches = pattern.filter(specs.iter().map(|(key, _)| key.as_str()));

            match matches.as_slice() {
                [] => return Err(Error::ModelNotFound(parsed.base.to_string())),
                [key] => key.to_string(),
                _ => {
                    return Err(Error::AmbiguousModel {
                        pattern: parsed.base.to_string(),
                        matches: matches.iter().map(|key| key.to_string()).collect(),
                    })
                }
            }
        } else {
            parsed.base.to_lowercase()
        };

        let spec = specs
            .into_iter()
            .find_map(|(k, spec)| (k == key).then_some(spec))
            .ok_or_else(|| Error::ModelNotFound(parsed.base.to_string()))?;

        let mut features = ResolvedFeatures::new();

        for (feature, raw) in &parsed.features {
            let declared = spec
                .features
                .get(*feature)
                .ok_or_else(|| Error::UnknownFeature {
                    model: key.clone(),
                    feature: feature.to_string(),
                })?;

            if let Some(value) = declared.coerce(feature, raw)? {
                features.insert(feature.to_string(), value);
            }
        }

        Ok(ClientHandle::new(self.category, key, spec, features))
    }

    /// Lists the models whose key matches the base of `name_like` and which
    /// declare every feature it names. Feature values are ignored.
    pub(crate) fn matching_specs(
        &self,
        name_like: &str,
    ) -> Result<Vec<(String, Arc<ModelSpec>)>, Error> {
        let parsed = ModelName::parse(name_like);
        let pattern = KeyPattern::new(parsed.base)?;

        let matched = self
            .snapshot()
            .into_iter()
            .filter(|(key, _)| pattern.matches(key))
            .filter(|(_, spec)| {
                parsed
                    .feature_names()
                    .all(|feature| spec.features.contains_key(feature))
            })
            .collect();

        Ok(matched)
    }
}

/// Probes the given specs concurrently, keeping their order.
pub(crate) async fn sweep(specs: Vec<(String, Arc<ModelSpec>)>) -> Vec<ModelStatus> {
    join_all(specs.into_iter().map(|(key, spec)| async move {
        let (status, available, hot) = spec.status().await;

        ModelStatus {
            key,
            status,
            available,
            hot,
            spec,
        }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::feature::{FeatureSpec, FeatureValue};
    use crate::registry::spec::testing::{fixed, switch};
    use crate::registry::spec::Status;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chat() -> TypeRegistry {
        TypeRegistry::new(Category::Chat)
    }

    fn gpt(model_id: &str) -> ModelSpec {
        ModelSpec::new("openai", model_id)
            .with_availability(fixed(true))
            .with_feature(
                "temperature",
                FeatureSpec::number("sampling temperature", Some(0.0), Some(2.0)),
            )
            .with_feature("stream", FeatureSpec::boolean("stream the response"))
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let registry = chat();

        registry.register(vec![ModelSpec::new("OpenAI", "gpt-4o").with_context_length(1)]);
        registry.register(vec![ModelSpec::new("openai", "GPT-4o").with_context_length(2)]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("openai:gpt-4o").unwrap().context_length, Some(2));
    }

    #[tokio::test]
    async fn test_statuses() {
        let registry = chat();

        registry.register(vec![
            ModelSpec::new("acme", "online").with_availability(fixed(true)),
            ModelSpec::new("acme", "cold")
                .with_availability(fixed(true))
                .with_hotness(fixed(false)),
            ModelSpec::new("acme", "offline").with_hotness(fixed(true)),
        ]);

        let statuses: Vec<(String, Status)> = registry
            .statuses()
            .await
            .into_iter()
            .map(|s| (s.key, s.status))
            .collect();

        assert_eq!(
            statuses,
            vec![
                ("acme:cold".to_string(), Status::Cold),
                ("acme:offline".to_string(), Status::Offline),
                ("acme:online".to_string(), Status::Online),
            ]
        );
    }

    #[tokio::test]
    async fn test_statuses_follow_the_probes() {
        let registry = chat();
        let (available, probe) = switch(true);

        registry.register(vec![ModelSpec::new("acme", "m").with_availability(probe)]);

        assert_eq!(registry.statuses().await[0].status, Status::Online);

        available.store(false, Ordering::SeqCst);

        assert_eq!(registry.statuses().await[0].status, Status::Offline);
    }

    #[tokio::test]
    async fn test_registration_order_does_not_matter() {
        let batch = || {
            vec![
                ModelSpec::new("b", "two").with_availability(fixed(true)),
                ModelSpec::new("a", "one").with_hotness(fixed(false)),
                ModelSpec::new("c", "three")
                    .with_availability(fixed(true))
                    .with_hotness(fixed(false)),
            ]
        };

        let forward = chat();
        forward.register(batch());

        let backward = chat();
        let mut reversed = batch();
        reversed.reverse();
        for spec in reversed {
            backward.register(vec![spec]);
        }

        let summarize = |statuses: Vec<ModelStatus>| -> Vec<(String, Status, bool, bool)> {
            statuses
                .into_iter()
                .map(|s| (s.key, s.status, s.available, s.hot))
                .collect()
        };

        assert_eq!(
            summarize(forward.statuses().await),
            summarize(backward.statuses().await)
        );
    }

    #[tokio::test]
    async fn test_grouping_by_provider() {
        let registry = chat();

        registry.register(vec![gpt("gpt-4.1"), gpt("gpt-4.1-mini")]);
        registry.register(vec![ModelSpec::new("ollama", "llama3:latest")]);

        let grouped = registry.statuses_by_provider().await;

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["openai"].len(), 2);
        assert_eq!(grouped["ollama"][0].status, Status::Offline);
    }

    #[tokio::test]
    async fn test_registration_prewarms_probes() {
        let registry = chat();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        registry.register(vec![ModelSpec::new("acme", "m").with_availability(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { true }
        })]);

        // The sweep never runs inline.
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_registration_outside_a_runtime() {
        let registry = chat();

        registry.register(vec![gpt("gpt-4.1")]);

        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_exact_and_ambiguous() {
        let registry = chat();

        registry.register(vec![gpt("gpt-4.1"), gpt("gpt-4.1-mini")]);

        let err = registry.resolve("openai:gpt-4*").unwrap_err();
        assert!(matches!(err, Error::AmbiguousModel { ref matches, .. } if matches.len() == 2));

        let handle = registry.resolve("openai:gpt-4.1").unwrap();
        assert_eq!(handle.key, "openai:gpt-4.1");
        assert_eq!(handle.model_id(), "gpt-4.1");
        assert_eq!(handle.category, Category::Chat);

        let handle = registry.resolve("OpenAI:*-mini").unwrap();
        assert_eq!(handle.key, "openai:gpt-4.1-mini");
    }

    #[tokio::test]
    async fn test_resolve_not_found() {
        let registry = chat();

        registry.register(vec![gpt("gpt-4.1")]);

        assert!(matches!(
            registry.resolve("openai:gpt-5"),
            Err(Error::ModelNotFound(_))
        ));
        assert!(matches!(
            registry.resolve("anthropic:*"),
            Err(Error::ModelNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_features() {
        let registry = chat();

        registry.register(vec![gpt("gpt-4.1")]);

        let handle = registry.resolve("openai:gpt-4.1?temperature=0.7&stream").unwrap();

        assert_eq!(handle.feature("temperature"), Some(&FeatureValue::Number(0.7)));
        assert_eq!(handle.feature("stream"), Some(&FeatureValue::Bool(true)));

        assert!(matches!(
            registry.resolve("openai:gpt-4.1?temperature=5"),
            Err(Error::FeatureOutOfRange { .. })
        ));
        assert!(matches!(
            registry.resolve("openai:gpt-4.1?unknown=1"),
            Err(Error::UnknownFeature { .. })
        ));
    }

    #[tokio::test]
    async fn test_matching_specs() {
        let registry = chat();

        registry.register(vec![
            gpt("gpt-4.1"),
            ModelSpec::new("openai", "o3")
                .with_feature("reasoning_effort", FeatureSpec::enumeration("effort", &["low"])),
            ModelSpec::new("ollama", "llama3:latest"),
        ]);

        let keys = |name: &str| -> Vec<String> {
            registry
                .matching_specs(name)
                .unwrap()
                .into_iter()
                .map(|(key, _)| key)
                .collect()
        };

        assert_eq!(keys("openai:*"), vec!["openai:gpt-4.1", "openai:o3"]);
        assert_eq!(keys("*?temperature=9&stream"), vec!["openai:gpt-4.1"]);
        assert_eq!(keys("*?reasoning_effort"), vec!["openai:o3"]);
        assert_eq!(keys("ollama:llama3:latest"), vec!["ollama:llama3:latest"]);
        assert!(keys("*?vision").is_empty());
        assert_eq!(keys("openai:gpt-**"), vec!["openai:gpt-4.1"]);
    }

    #[tokio::test]
    async fn test_resolve_repeated_wildcards() {
        let registry = chat();

        registry.register(vec![gpt("gpt-4.1")]);

        assert_eq!(registry.resolve("openai:**").unwrap().key, "openai:gpt-4.1");
        assert_eq!(registry.resolve("openai:gpt**1").unwrap().key, "openai:gpt-4.1");
    }
}
