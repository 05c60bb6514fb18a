//! Concrete provider types, along with their identifiers

use strum_macros;

/// The `ProviderIdentifier` is a unique per-adapter identifier. It is used to
/// differentiate provider adapters at runtime in code which is generic over
/// different providers.
///
/// The `to_string` and `FromStr` are part of the CLI and should remain stable.
/// For the built-in adapters it is also the provider display name used in
/// registry keys (e.g. `openai:gpt-4o`). Declared models carry their own
/// display names.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Hash,
    Clone,
    Copy,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum ProviderIdentifier {
    Ollama,
    OpenAI,
    Declared,
}

pub(crate) use super::declared::DeclaredProvider;
pub(crate) use super::ollama::OllamaProvider;
pub(crate) use super::openai::OpenAIProvider;
