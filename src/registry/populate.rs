use std::env::VarError;
use tracing::{debug, info, warn};

use super::Registry;
use crate::config::{Config, RequestedProviderEnabled};
use crate::providers::cached_fetcher::CacheSettings;
use crate::providers::providers::{DeclaredProvider, OllamaProvider, OpenAIProvider};
use crate::providers::{Error, ProviderAdapter};

const OPENAI_ENV_KEY_VAR: &'static str = "OPENAI_API_KEY";

fn openai_api_key(configured: Option<&String>) -> Option<String> {
    if let Some(api_key) = configured {
        return Some(api_key.clone());
    }

    match std::env::var(OPENAI_ENV_KEY_VAR) {
        Ok(api_key) => Some(api_key),
        Err(VarError::NotPresent) => None,
        Err(VarError::NotUnicode(_)) => {
            warn!("{} is not valid unicode, ignoring it", OPENAI_ENV_KEY_VAR);
            None
        }
    }
}

async fn ollama_adapter(
    config: &Config,
    settings: CacheSettings,
) -> Result<Option<Box<dyn ProviderAdapter>>, Error> {
    let ollama = &config.providers.ollama;

    if ollama.enabled == RequestedProviderEnabled::No {
        return Ok(None);
    }

    let provider = match &ollama.api_base {
        Some(api_base) => OllamaProvider::with_api_base(api_base.as_str(), settings)?,
        None => OllamaProvider::new(settings)?,
    };

    // In auto mode a server that does not answer just means ollama is not in use.
    if ollama.enabled == RequestedProviderEnabled::Auto && !provider.is_awake().await {
        debug!("ollama is not running, skipping it");
        return Ok(None);
    }

    Ok(Some(Box::new(provider)))
}

fn openai_adapter(
    config: &Config,
    settings: CacheSettings,
    api_key: Option<String>,
) -> Result<Option<Box<dyn ProviderAdapter>>, Error> {
    let openai = &config.providers.openai;

    let api_key = match (openai.enabled, api_key) {
        (RequestedProviderEnabled::No, _) | (RequestedProviderEnabled::Auto, None) => {
            return Ok(None)
        }
        (RequestedProviderEnabled::Yes, None) => {
            return Err(Error::configuration(format!(
                "openai is enabled but no API key is set, add it to the config or define {}",
                OPENAI_ENV_KEY_VAR
            )))
        }
        (_, Some(api_key)) => api_key,
    };

    let provider = OpenAIProvider::new(&api_key, openai.api_base.as_deref(), settings)?;

    Ok(Some(Box::new(provider)))
}

/// Builds the adapters the config enables. A provider that fails to come up
/// is logged and left out; the others are unaffected.
async fn adapters(config: &Config) -> Vec<Box<dyn ProviderAdapter>> {
    let settings = config.cache.settings();
    let mut adapters: Vec<Box<dyn ProviderAdapter>> = Vec::new();

    let openai_key = openai_api_key(config.providers.openai.api_key.as_ref());

    let candidates = [
        ("ollama", ollama_adapter(config, settings).await),
        ("openai", openai_adapter(config, settings, openai_key)),
    ];

    for (name, candidate) in candidates {
        match candidate {
            Ok(Some(adapter)) => adapters.push(adapter),
            Ok(None) => debug!(provider = name, "provider is not enabled"),
            Err(err) => warn!(provider = name, "failed to set up provider: {}", err),
        }
    }

    if !config.models.is_empty() {
        adapters.push(Box::new(DeclaredProvider::new(
            config.models.clone(),
            settings,
        )));
    }

    adapters
}

/// Registers every adapter into `registry`. Registration failures are
/// isolated to the adapter that raised them.
pub(crate) async fn populate(registry: &Registry, adapters: &[Box<dyn ProviderAdapter>]) {
    for adapter in adapters {
        match adapter.register(registry).await {
            Ok(registered) => info!(provider = %adapter.id(), registered, "registered models"),
            Err(err) => warn!(provider = %adapter.id(), "failed to register models: {}", err),
        }
    }
}

/// Populate a registry with the enabled providers
pub(crate) async fn populated_registry(config: &Config) -> Registry {
    let registry = Registry::new();

    populate(&registry, &adapters(config).await).await;

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeclaredModel;
    use crate::providers::providers::ProviderIdentifier;
    use crate::providers::ErrorKind;
    use crate::registry::Category;
    use async_trait::async_trait;

    struct Failing;

    #[async_trait]
    impl ProviderAdapter for Failing {
        fn id(&self) -> ProviderIdentifier {
            ProviderIdentifier::Ollama
        }

        async fn register(&self, _registry: &Registry) -> Result<usize, Error> {
            Err(Error::from_kind(ErrorKind::Connection))
        }
    }

    fn declared(model_id: &str) -> DeclaredModel {
        DeclaredModel {
            category: Category::Chat,
            provider: "local".to_string(),
            model_id: model_id.to_string(),
            context_length: None,
            max_completion_tokens: None,
            costs: Default::default(),
            scores: Default::default(),
            health_url: None,
            always_available: true,
            features: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_failing_adapter_is_isolated() {
        let adapters: Vec<Box<dyn ProviderAdapter>> = vec![
            Box::new(Failing),
            Box::new(DeclaredProvider::new(
                vec![declared("a"), declared("b")],
                CacheSettings::default(),
            )),
        ];

        let registry = Registry::new();
        populate(&registry, &adapters).await;

        assert_eq!(registry.chat().len(), 2);
    }

    #[test]
    fn test_openai_enabled_without_key_is_a_configuration_error() {
        let mut config = Config::default();
        config.providers.openai.enabled = RequestedProviderEnabled::Yes;

        let err = openai_adapter(&config, CacheSettings::default(), None)
            .err()
            .unwrap();

        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_openai_auto_follows_the_key() {
        let config = Config::default();

        assert!(openai_adapter(&config, CacheSettings::default(), None)
            .unwrap()
            .is_none());
        assert!(
            openai_adapter(&config, CacheSettings::default(), Some("sk-test".to_string()))
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_openai_disabled_ignores_the_key() {
        let mut config = Config::default();
        config.providers.openai.enabled = RequestedProviderEnabled::No;

        assert!(
            openai_adapter(&config, CacheSettings::default(), Some("sk-test".to_string()))
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_disabled_ollama_is_not_contacted() {
        let mut config = Config::default();
        config.providers.ollama.enabled = RequestedProviderEnabled::No;

        assert!(ollama_adapter(&config, CacheSettings::default())
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_configured_key_wins_over_the_environment() {
        let key = "sk-from-config".to_string();

        assert_eq!(openai_api_key(Some(&key)), Some(key));
    }
}
