use serde::Serialize;
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use table::{IntoTable, Table};
pub(crate) mod table;

use crate::{
    config::Config,
    die,
    registry::{
        populate::populated_registry,
        spec::{ModelStatus, Status},
        Category, Registry,
    },
    ListArgs, ListObject, ListingFormat,
};

fn cell<T: ToString>(value: Option<T>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "-".to_string(),
    }
}

#[derive(Serialize)]
struct ListedModel {
    category: Category,
    #[serde(flatten)]
    status: ModelStatus,
}

impl From<Vec<ListedModel>> for Table {
    fn from(value: Vec<ListedModel>) -> Self {
        let mut tab = Table::new([
            "CATEGORY", "KEY", "PROVIDER", "STATUS", "CONTEXT", "INPUT", "OUTPUT",
        ])
        .align_right(&["CONTEXT", "INPUT", "OUTPUT"]);

        for model in value {
            let spec = &model.status.spec;

            tab.add_row(vec![
                model.category.to_string(),
                model.status.key.clone(),
                spec.provider.clone(),
                model.status.status.to_string(),
                cell(spec.context_length),
                cell(spec.costs.input),
                cell(spec.costs.output),
            ]);
        }

        tab
    }
}

#[derive(Serialize, Debug, PartialEq)]
struct ProviderSummary {
    provider: String,
    category: Category,
    models: usize,
    online: usize,
    cold: usize,
    offline: usize,
}

impl ProviderSummary {
    fn new(provider: String, category: Category, statuses: &[ModelStatus]) -> ProviderSummary {
        let count = |wanted: Status| statuses.iter().filter(|s| s.status == wanted).count();

        ProviderSummary {
            provider,
            category,
            models: statuses.len(),
            online: count(Status::Online),
            cold: count(Status::Cold),
            offline: count(Status::Offline),
        }
    }
}

impl From<Vec<ProviderSummary>> for Table {
    fn from(value: Vec<ProviderSummary>) -> Self {
        let mut tab = Table::new([
            "PROVIDER", "CATEGORY", "MODELS", "ONLINE", "COLD", "OFFLINE",
        ])
        .align_right(&["MODELS", "ONLINE", "COLD", "OFFLINE"]);

        for summary in value {
            tab.add_row(vec![
                summary.provider,
                summary.category.to_string(),
                summary.models.to_string(),
                summary.online.to_string(),
                summary.cold.to_string(),
                summary.offline.to_string(),
            ]);
        }

        tab
    }
}

fn categories(filter: Option<Category>) -> Vec<Category> {
    match filter {
        Some(category) => vec![category],
        None => Category::iter().collect(),
    }
}

async fn get_models(
    registry: &Registry,
    category: Option<Category>,
    provider: Option<&str>,
) -> Vec<ListedModel> {
    let mut models = Vec::new();

    for category in categories(category) {
        for status in registry.category(category).statuses().await {
            let wanted = provider.map_or(true, |p| status.spec.provider.eq_ignore_ascii_case(p));

            if wanted {
                models.push(ListedModel { category, status });
            }
        }
    }

    models
}

async fn get_providers(registry: &Registry, category: Option<Category>) -> Vec<ProviderSummary> {
    let mut summaries = Vec::new();

    for category in categories(category) {
        let grouped: BTreeMap<String, Vec<ModelStatus>> =
            registry.category(category).statuses_by_provider().await;

        for (provider, statuses) in grouped {
            summaries.push(ProviderSummary::new(provider, category, &statuses));
        }
    }

    summaries
}

pub(crate) fn format_output<O: IntoTable + Serialize>(object: O, format: ListingFormat) {
    match format {
        ListingFormat::Json => match serde_json::to_string_pretty(&object) {
            Ok(output) => println!("{}", output),
            Err(err) => die!("failed to serialize output: {}", err),
        },
        ListingFormat::Table => {
            let tab = object.into_table();

            print!("{}", tab);
        }
        ListingFormat::HeaderlessTable => {
            let mut tab = object.into_table();

            tab.print_header(false);

            print!("{}", tab);
        }
    }
}

pub(crate) async fn list_cmd(config: &Config, args: &ListArgs) {
    let format = args.format;

    let registry = populated_registry(config).await;

    match &args.object {
        ListObject::Models(args) => {
            let models = get_models(&registry, args.category, args.provider.as_deref()).await;
            format_output(models, format);
        }
        ListObject::Providers(args) => {
            let providers = get_providers(&registry, args.category).await;
            format_output(providers, format);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::spec::testing::fixed;
    use crate::registry::spec::{Costs, ModelSpec};

    fn registry() -> Registry {
        let registry = Registry::new();

        registry.chat().register(vec![
            ModelSpec::new("openai", "gpt-4o")
                .with_context_length(128000)
                .with_costs(Costs {
                    input: Some(2.5),
                    output: Some(10.0),
                    ..Default::default()
                })
                .with_availability(fixed(true)),
            ModelSpec::new("ollama", "llama3:latest")
                .with_availability(fixed(true))
                .with_hotness(fixed(false)),
            ModelSpec::new("ollama", "gemma:2b"),
        ]);

        registry
            .category(Category::Embedding)
            .register(vec![ModelSpec::new("openai", "text-embedding-3-small")
                .with_availability(fixed(true))]);

        registry
    }

    #[tokio::test]
    async fn test_models_filtered_by_provider_and_category() {
        let registry = registry();

        let models = get_models(&registry, None, Some("OpenAI")).await;
        let keys: Vec<&str> = models.iter().map(|m| m.status.key.as_str()).collect();
        assert_eq!(keys, vec!["openai:gpt-4o", "openai:text-embedding-3-small"]);

        let models = get_models(&registry, Some(Category::Chat), None).await;
        assert_eq!(models.len(), 3);
    }

    #[tokio::test]
    async fn test_provider_summaries_count_statuses() {
        let registry = registry();

        let summaries = get_providers(&registry, Some(Category::Chat)).await;

        assert_eq!(
            summaries,
            vec![
                ProviderSummary {
                    provider: "ollama".to_string(),
                    category: Category::Chat,
                    models: 2,
                    online: 0,
                    cold: 1,
                    offline: 1,
                },
                ProviderSummary {
                    provider: "openai".to_string(),
                    category: Category::Chat,
                    models: 1,
                    online: 1,
                    cold: 0,
                    offline: 0,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_model_table() {
        let registry = registry();
        let models = get_models(&registry, Some(Category::Chat), Some("openai")).await;

        let mut tab: Table = models.into();
        tab.print_header(false);

        let output = tab.to_string();
        let cells: Vec<&str> = output.split_whitespace().collect();

        assert_eq!(output.lines().count(), 1);
        assert_eq!(
            cells,
            vec!["chat", "openai:gpt-4o", "openai", "online", "128000", "2.5", "10"]
        );
    }

    #[tokio::test]
    async fn test_json_listing_flattens_the_status() {
        let registry = registry();
        let models = get_models(&registry, Some(Category::Embedding), None).await;

        let json = serde_json::to_value(&models).unwrap();

        assert_eq!(json[0]["category"], "embedding");
        assert_eq!(json[0]["key"], "openai:text-embedding-3-small");
        assert_eq!(json[0]["status"], "online");
        assert_eq!(json[0]["model"]["model_id"], "text-embedding-3-small");
    }
}
