//! Commands that look up a single model: `resolve`, `match` and `select`.

use serde::Serialize;
use std::sync::Arc;

use super::list::{format_output, table::Table};
use crate::{
    config::Config,
    die,
    registry::{client::ClientHandle, populate::populated_registry, spec::ModelSpec},
    MatchArgs, ResolveArgs, SelectArgs,
};

fn joined_features(handle: &ClientHandle) -> String {
    handle
        .features
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&")
}

impl From<ClientHandle> for Table {
    fn from(handle: ClientHandle) -> Self {
        let mut tab = Table::new(["KEY", "CATEGORY", "MODEL", "FEATURES"]);

        tab.add_row(vec![
            handle.key.clone(),
            handle.category.to_string(),
            handle.model_id().to_string(),
            joined_features(&handle),
        ]);

        tab
    }
}

#[derive(Serialize)]
struct MatchedModel {
    key: String,
    #[serde(rename = "model")]
    spec: Arc<ModelSpec>,
}

impl From<Vec<MatchedModel>> for Table {
    fn from(value: Vec<MatchedModel>) -> Self {
        let mut tab =
            Table::new(["KEY", "PROVIDER", "CONTEXT", "FEATURES"]).align_right(&["CONTEXT"]);

        for matched in value {
            let features: Vec<&str> = matched.spec.features.keys().map(|f| f.as_str()).collect();

            tab.add_row(vec![
                matched.key,
                matched.spec.provider.clone(),
                match matched.spec.context_length {
                    Some(context) => context.to_string(),
                    None => "-".to_string(),
                },
                features.join(","),
            ]);
        }

        tab
    }
}

/// Runs the model's request hook over `raw` and returns the result.
fn prepared_request(handle: &ClientHandle, raw: &str) -> Result<serde_json::Value, serde_json::Error> {
    let mut request: serde_json::Value = serde_json::from_str(raw)?;

    if let serde_json::Value::Object(body) = &mut request {
        body.entry("model")
            .or_insert_with(|| serde_json::Value::String(handle.model_id().to_string()));
    }

    handle.prepare_request(&mut request);

    Ok(request)
}

pub(crate) async fn resolve_cmd(config: &Config, args: &ResolveArgs) {
    let registry = populated_registry(config).await;

    let handle = match registry.category(args.category).resolve(&args.name) {
        Ok(handle) => handle,
        Err(err) => die!("failed to resolve model: {}", err),
    };

    match &args.request {
        Some(raw) => match prepared_request(&handle, raw) {
            Ok(request) => match serde_json::to_string_pretty(&request) {
                Ok(output) => println!("{}", output),
                Err(err) => die!("failed to serialize the request: {}", err),
            },
            Err(err) => die!("the request is not valid JSON: {}", err),
        },
        None => format_output(handle, args.format),
    }
}

pub(crate) async fn match_cmd(config: &Config, args: &MatchArgs) {
    let registry = populated_registry(config).await;

    let specs = match registry.category(args.category).matching_specs(&args.name_like) {
        Ok(specs) => specs,
        Err(err) => die!("failed to match models: {}", err),
    };

    let matched: Vec<MatchedModel> = specs
        .into_iter()
        .map(|(key, spec)| MatchedModel { key, spec })
        .collect();

    if matched.is_empty() {
        crate::warn!("no model matches \"{}\"", args.name_like);
    }

    format_output(matched, args.format);
}

pub(crate) async fn select_cmd(config: &Config, args: &SelectArgs) {
    let registry = populated_registry(config).await;

    match registry.chat().select(&args.requirements).await {
        Ok(handle) => format_output(handle, args.format),
        Err(err) => die!("failed to select a model: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::feature::{FeatureSpec, FeatureValue, ResolvedFeatures};
    use crate::registry::Category;
    use serde_json::json;

    fn handle() -> ClientHandle {
        let spec = ModelSpec::new("openai", "o3")
            .with_feature(
                "reasoning_effort",
                FeatureSpec::enumeration("effort", &["low", "medium", "high"]),
            )
            .with_request_hook(|request, features| {
                if let Some(effort) = features.get("reasoning_effort") {
                    request["reasoning_effort"] = effort.as_json();
                }
            });

        let mut features = ResolvedFeatures::new();
        features.insert(
            "reasoning_effort".to_string(),
            FeatureValue::String("high".to_string()),
        );

        ClientHandle::new(Category::Chat, spec.key(), Arc::new(spec), features)
    }

    #[test]
    fn test_prepared_request_fills_in_the_model() {
        let request = prepared_request(&handle(), r#"{"messages": []}"#).unwrap();

        assert_eq!(
            request,
            json!({ "model": "o3", "messages": [], "reasoning_effort": "high" })
        );
    }

    #[test]
    fn test_prepared_request_rejects_invalid_json() {
        assert!(prepared_request(&handle(), "{not json").is_err());
    }

    #[test]
    fn test_handle_table() {
        let mut tab: Table = handle().into();
        tab.print_header(false);

        let output = tab.to_string();
        let cells: Vec<&str> = output.split_whitespace().collect();

        assert_eq!(cells, vec!["openai:o3", "chat", "o3", "reasoning_effort=high"]);
    }
}
