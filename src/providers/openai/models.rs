use lazy_static::lazy_static;

use crate::registry::feature::{FeatureSpec, FeatureValue};
use crate::registry::spec::{Costs, Scores};
use crate::registry::Category;

/// One entry of the static OpenAI catalog.
pub(super) struct CatalogEntry {
    pub category: Category,
    pub id: &'static str,
    pub context_length: Option<u64>,
    pub max_completion_tokens: Option<u64>,
    pub costs: Costs,
    pub scores: Scores,
    /// o-series models: they take `reasoning_effort` and reject sampling
    /// parameters.
    pub reasoning: bool,
}

fn costs(input: f64, cached_input: Option<f64>, output: Option<f64>) -> Costs {
    Costs {
        input: Some(input),
        cached_input,
        output,
        reasoning: None,
    }
}

fn scores(reasoning: i64, intelligence: i64, speed: i64) -> Scores {
    Scores {
        reasoning: Some(reasoning),
        intelligence: Some(intelligence),
        speed: Some(speed),
        research: None,
        web_search: None,
    }
}

fn chat(
    id: &'static str,
    context_length: u64,
    max_completion_tokens: u64,
    costs: Costs,
    scores: Scores,
) -> CatalogEntry {
    CatalogEntry {
        category: Category::Chat,
        id,
        context_length: Some(context_length),
        max_completion_tokens: Some(max_completion_tokens),
        costs,
        scores,
        reasoning: false,
    }
}

fn other(category: Category, id: &'static str, context_length: Option<u64>, costs: Costs) -> CatalogEntry {
    CatalogEntry {
        category,
        id,
        context_length,
        max_completion_tokens: None,
        costs,
        scores: Scores::default(),
        reasoning: false,
    }
}

lazy_static! {
    // The /v1/models route only lists ids. Context lengths, prices and features
    // are not exposed anywhere, so this list needs to be updated whenever
    // OpenAI adds a model or changes its pricing. The route is still used to
    // decide which of these the key can actually reach.
    pub(super) static ref OPENAI_MODELS: Vec<CatalogEntry> = vec![
        chat("gpt-4.1", 1_047_576, 32_768, costs(2.00, Some(0.50), Some(8.00)), scores(3, 4, 3)),
        chat("gpt-4.1-mini", 1_047_576, 32_768, costs(0.40, Some(0.10), Some(1.60)), scores(2, 3, 4)),
        chat("gpt-4.1-nano", 1_047_576, 32_768, costs(0.10, Some(0.025), Some(0.40)), scores(1, 2, 5)),
        chat("gpt-4o", 128_000, 16_384, costs(2.50, Some(1.25), Some(10.00)), scores(3, 4, 3)),
        chat("gpt-4o-mini", 128_000, 16_384, costs(0.15, Some(0.075), Some(0.60)), scores(2, 2, 4)),
        CatalogEntry {
            scores: Scores {
                research: Some(3),
                web_search: Some(5),
                ..scores(3, 4, 3)
            },
            ..chat("gpt-4o-search-preview", 128_000, 16_384, costs(2.50, None, Some(10.00)), Scores::default())
        },
        CatalogEntry {
            reasoning: true,
            costs: Costs {
                reasoning: Some(8.00),
                ..costs(2.00, Some(0.50), Some(8.00))
            },
            scores: Scores {
                research: Some(4),
                ..scores(5, 5, 2)
            },
            ..chat("o3", 200_000, 100_000, Costs::default(), Scores::default())
        },
        CatalogEntry {
            reasoning: true,
            costs: Costs {
                reasoning: Some(4.40),
                ..costs(1.10, Some(0.275), Some(4.40))
            },
            ..chat("o4-mini", 200_000, 100_000, Costs::default(), scores(4, 4, 3))
        },
        other(Category::Embedding, "text-embedding-3-small", Some(8191), costs(0.02, None, None)),
        other(Category::Embedding, "text-embedding-3-large", Some(8191), costs(0.13, None, None)),
        other(Category::ImageGeneration, "gpt-image-1", None, costs(5.00, Some(1.25), Some(40.00))),
        // tts-1 is billed per million characters of input.
        other(Category::Speech, "tts-1", None, costs(15.00, None, None)),
        other(Category::Speech, "gpt-4o-mini-tts", None, costs(0.60, None, Some(12.00))),
        other(Category::Transcription, "gpt-4o-transcribe", Some(16_000), costs(2.50, None, Some(10.00))),
        other(Category::Transcription, "whisper-1", None, Costs::default()),
    ];
}

const VOICES: [&str; 9] = [
    "alloy", "ash", "coral", "echo", "fable", "onyx", "nova", "sage", "shimmer",
];

/// The per-call features each kind of entry accepts.
pub(super) fn features_for(entry: &CatalogEntry) -> Vec<(&'static str, FeatureSpec)> {
    match entry.category {
        Category::Chat if entry.reasoning => vec![(
            "reasoning_effort",
            FeatureSpec::enumeration("how much to think before answering", &["low", "medium", "high"])
                .with_default(FeatureValue::String("medium".to_string())),
        )],
        Category::Chat => vec![
            (
                "temperature",
                FeatureSpec::number("sampling temperature", Some(0.0), Some(2.0)),
            ),
            (
                "top_p",
                FeatureSpec::number("nucleus sampling mass", Some(0.0), Some(1.0)),
            ),
            (
                "seed",
                FeatureSpec::number("best-effort deterministic sampling", None, None),
            ),
            ("stop", FeatureSpec::array("up to four stop sequences")),
        ],
        Category::Embedding => vec![(
            "dimensions",
            FeatureSpec::number("truncate embeddings to this many dimensions", Some(1.0), None),
        )],
        Category::ImageGeneration => vec![
            (
                "size",
                FeatureSpec::enumeration(
                    "image dimensions",
                    &["1024x1024", "1536x1024", "1024x1536", "auto"],
                )
                .with_default(FeatureValue::String("auto".to_string())),
            ),
            (
                "quality",
                FeatureSpec::enumeration("rendering quality", &["low", "medium", "high", "auto"])
                    .with_default(FeatureValue::String("auto".to_string())),
            ),
        ],
        Category::Speech => vec![
            (
                "voice",
                FeatureSpec::enumeration("voice to speak with", &VOICES)
                    .with_default(FeatureValue::String("alloy".to_string())),
            ),
            (
                "speed",
                FeatureSpec::number("playback speed", Some(0.25), Some(4.0)),
            ),
        ],
        Category::Transcription => vec![
            (
                "language",
                FeatureSpec::string("ISO-639-1 code of the spoken language"),
            ),
            (
                "temperature",
                FeatureSpec::number("sampling temperature", Some(0.0), Some(1.0)),
            ),
        ],
        Category::Reranking => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_ids_are_unique() {
        let ids: HashSet<&str> = OPENAI_MODELS.iter().map(|m| m.id).collect();

        assert_eq!(ids.len(), OPENAI_MODELS.len());
    }

    #[test]
    fn test_reasoning_models_take_effort_only() {
        let o3 = OPENAI_MODELS.iter().find(|m| m.id == "o3").unwrap();
        let names: Vec<&str> = features_for(o3).into_iter().map(|(n, _)| n).collect();

        assert!(o3.reasoning);
        assert_eq!(o3.costs.reasoning, Some(8.00));
        assert_eq!(names, vec!["reasoning_effort"]);
    }

    #[test]
    fn test_search_model_scores() {
        let search = OPENAI_MODELS
            .iter()
            .find(|m| m.id == "gpt-4o-search-preview")
            .unwrap();

        assert_eq!(search.scores.web_search, Some(5));
        assert_eq!(search.scores.intelligence, Some(4));
        assert!(!search.reasoning);
    }

    #[test]
    fn test_every_category_but_reranking_is_covered() {
        let categories: HashSet<Category> = OPENAI_MODELS.iter().map(|m| m.category).collect();

        assert_eq!(categories.len(), 5);
        assert!(!categories.contains(&Category::Reranking));
    }
}
