//! The registry is the catalog of every inference model the process can use,
//! split by category (chat, embedding, image generation, speech,
//! transcription, reranking). Provider adapters populate it at startup; the
//! rest of the program queries it.
//!
//! Each model is registered under a key built from its provider display name
//! and its model identifier. In BNF, a model name with per-call feature
//! overrides is:
//! ```text
//! <name>     := <provider> ":" <model> [ "?" <features> ]
//! <features> := <feature> [ "&" <features> ]
//! <feature>  := <feature name> [ "=" <value> ]
//! ```
//!
//! For example, `openai:gpt-4.1?temperature=0.2&stream` selects `gpt-4.1` from
//! the `openai` provider with `temperature` set to 0.2 and `stream` set to
//! true (a bare feature means `"1"`). The `<provider>:<model>` segment may
//! contain `*` wildcards, as long as the pattern matches exactly one key.
//!
//! The chat registry additionally accepts requirement strings, such as
//! `openai:intelligence>=3,context_length>=64000`, which are matched against
//! model attributes and ranked by an estimated price. See [`requirement`].

pub(crate) mod client;
pub(crate) mod feature;
pub(crate) mod name;
pub(crate) mod populate;
pub(crate) mod requirement;
pub(crate) mod spec;
pub(crate) mod type_registry;

use serde::Serialize;
use strum::IntoEnumIterator;
use thiserror::Error;

use type_registry::TypeRegistry;

#[derive(Error, Debug)]
pub(crate) enum Error {
    /// No registered key matches the name
    #[error("model \"{0}\" not found")]
    ModelNotFound(String),
    /// A wildcard pattern matched more than one key
    #[error("model pattern \"{pattern}\" is ambiguous, it matches: {}", .matches.join(", "))]
    AmbiguousModel {
        pattern: String,
        matches: Vec<String>,
    },
    /// A wildcard name could not be turned into a key pattern
    #[error("invalid model pattern \"{pattern}\": {reason}")]
    InvalidPattern { pattern: String, reason: String },
    /// The name refers to a feature the model does not declare
    #[error("model \"{model}\" does not support feature \"{feature}\"")]
    UnknownFeature { model: String, feature: String },
    /// A numeric feature value could not be parsed
    #[error("feature \"{feature}\" expects a number, got \"{value}\"")]
    InvalidFeatureValue { feature: String, value: String },
    /// A numeric feature value lies outside of its declared bounds
    #[error(
        "feature \"{feature}\" value {value} is out of range {}",
        fmt_bounds(.min, .max)
    )]
    FeatureOutOfRange {
        feature: String,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// A requirement string or condition is malformed
    #[error("invalid requirement \"{requirement}\": {reason}")]
    InvalidRequirement { requirement: String, reason: String },
    /// A requirement refers to an attribute models do not have
    #[error("unknown requirement field \"{0}\"")]
    UnknownField(String),
    /// A condition uses an operator other than `>`, `<`, `>=`, `<=` or `=`
    #[error("unrecognized operator \"{op}\" in condition \"{condition}\"")]
    UnknownOperator { condition: String, op: String },
    /// Every candidate is offline
    #[error("no online model found")]
    NoOnlineModel,
}

fn fmt_bounds(min: &Option<f64>, max: &Option<f64>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("[{}, {}]", min, max),
        (Some(min), None) => format!("[{}, ∞)", min),
        (None, Some(max)) => format!("(-∞, {}]", max),
        (None, None) => "(-∞, ∞)".to_string(),
    }
}

/// The kind of inference a model performs. Every category has its own,
/// isolated registry.
///
/// The `to_string` and `FromStr` are part of the CLI and the configuration
/// file and should remain stable.
#[derive(
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Clone,
    Copy,
    Serialize,
    serde::Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub(crate) enum Category {
    Chat,
    Embedding,
    ImageGeneration,
    Speech,
    Transcription,
    Reranking,
}

/// One [`TypeRegistry`] per [`Category`].
///
/// This is the composition root handed to provider adapters (which register
/// into it) and to the commands (which query it). It has no matching logic of
/// its own.
pub(crate) struct Registry {
    chat: TypeRegistry,
    embedding: TypeRegistry,
    image_generation: TypeRegistry,
    speech: TypeRegistry,
    transcription: TypeRegistry,
    reranking: TypeRegistry,
}

impl Registry {
    pub(crate) fn new() -> Registry {
        Registry {
            chat: TypeRegistry::new(Category::Chat),
            embedding: TypeRegistry::new(Category::Embedding),
            image_generation: TypeRegistry::new(Category::ImageGeneration),
            speech: TypeRegistry::new(Category::Speech),
            transcription: TypeRegistry::new(Category::Transcription),
            reranking: TypeRegistry::new(Category::Reranking),
        }
    }

    pub(crate) fn category(&self, category: Category) -> &TypeRegistry {
        match category {
            Category::Chat => &self.chat,
            Category::Embedding => &self.embedding,
            Category::ImageGeneration => &self.image_generation,
            Category::Speech => &self.speech,
            Category::Transcription => &self.transcription,
            Category::Reranking => &self.reranking,
        }
    }

    pub(crate) fn chat(&self) -> &TypeRegistry {
        &self.chat
    }

    /// Iterates over the category registries in declaration order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &TypeRegistry> {
        Category::iter().map(move |category| self.category(category))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.iter().all(|registry| registry.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::spec::ModelSpec;
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_category_names_are_stable() {
        assert_eq!(Category::ImageGeneration.to_string(), "image-generation");
        assert_eq!(
            Category::from_str("transcription").unwrap(),
            Category::Transcription
        );
        assert!(Category::from_str("video").is_err());
    }

    #[tokio::test]
    async fn test_categories_are_isolated() {
        let registry = Registry::new();

        assert!(registry.is_empty());

        registry
            .category(Category::Embedding)
            .register(vec![ModelSpec::new("openai", "text-embedding-3-small")]);

        assert!(!registry.is_empty());
        assert_eq!(registry.category(Category::Embedding).len(), 1);
        assert!(registry.chat().is_empty());

        for typed in registry.iter() {
            if typed.category() != Category::Embedding {
                assert!(typed.is_empty());
            }
        }
    }

    #[test]
    fn test_out_of_range_message() {
        let err = Error::FeatureOutOfRange {
            feature: "temperature".to_string(),
            value: 5.0,
            min: Some(0.0),
            max: Some(2.0),
        };

        assert_eq!(
            err.to_string(),
            "feature \"temperature\" value 5 is out of range [0, 2]"
        );
    }
}
