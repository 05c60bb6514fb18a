//! Requirement matching and price ranking for the chat registry.
//!
//! A requirement is either a structured map of `field -> condition` or a
//! compact string:
//! ```text
//! <requirements> := [ <provider> ":" ] <condition> { "," <condition> }
//! <condition>    := <field> <op> <value>
//! <op>           := ">" | "<" | ">=" | "<=" | "="
//! ```
//! In the structured form the operator prefixes the value and may be left out
//! for equality (`{"intelligence": ">=3", "provider": "openai"}`). A provider
//! of `auto` places no constraint. A string that is exactly a registered key
//! selects that model by name.
//!
//! Matching models are ranked by a rough price estimate:
//! `max(10000, requested context) * input cost + 1000 * output cost`, with an
//! unknown cost counted as 600 per million tokens.

use futures_util::future::join_all;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use super::client::ClientHandle;
use super::feature::ResolvedFeatures;
use super::spec::{ModelSpec, Status};
use super::type_registry::TypeRegistry;
use super::Error;

const MIN_CONTEXT_TOKENS: f64 = 10000.0;
const ASSUMED_OUTPUT_TOKENS: f64 = 1000.0;
const UNKNOWN_COST_PER_MILLION: f64 = 600.0;

const OPERATOR_CHARS: &[char] = &['<', '>', '=', '!'];

/// A comparison against a fixed value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Condition<T> {
    Eq(T),
    Gt(T),
    Lt(T),
    Gte(T),
    Lte(T),
}

impl<T: PartialOrd> Condition<T> {
    pub(crate) fn holds(&self, actual: &T) -> bool {
        match self {
            Condition::Eq(value) => actual == value,
            Condition::Gt(value) => actual > value,
            Condition::Lt(value) => actual < value,
            Condition::Gte(value) => actual >= value,
            Condition::Lte(value) => actual <= value,
        }
    }

    pub(crate) fn value(&self) -> &T {
        match self {
            Condition::Eq(value)
            | Condition::Gt(value)
            | Condition::Lt(value)
            | Condition::Gte(value)
            | Condition::Lte(value) => value,
        }
    }

    fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Condition<U> {
        match self {
            Condition::Eq(value) => Condition::Eq(f(value)),
            Condition::Gt(value) => Condition::Gt(f(value)),
            Condition::Lt(value) => Condition::Lt(f(value)),
            Condition::Gte(value) => Condition::Gte(f(value)),
            Condition::Lte(value) => Condition::Lte(f(value)),
        }
    }
}

impl Condition<String> {
    /// Parses an operator-prefixed value such as `>=3`. No operator means
    /// equality.
    pub(crate) fn parse(raw: &str) -> Result<Condition<String>, Error> {
        let raw = raw.trim();
        let split = raw.find(|c: char| !OPERATOR_CHARS.contains(&c)).unwrap_or(raw.len());
        let (op, value) = raw.split_at(split);
        let value = value.trim().to_string();

        match op {
            "" | "=" => Ok(Condition::Eq(value)),
            ">" => Ok(Condition::Gt(value)),
            "<" => Ok(Condition::Lt(value)),
            ">=" => Ok(Condition::Gte(value)),
            "<=" => Ok(Condition::Lte(value)),
            op => Err(Error::UnknownOperator {
                condition: raw.to_string(),
                op: op.to_string(),
            }),
        }
    }
}

/// A model attribute a numeric condition can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum Field {
    ContextLength,
    MaxCompletionTokens,
    InputCost,
    CachedInputCost,
    OutputCost,
    ReasoningCost,
    Reasoning,
    Intelligence,
    Speed,
    Research,
    WebSearch,
}

impl Field {
    fn of(&self, spec: &ModelSpec) -> Option<f64> {
        match self {
            Field::ContextLength => spec.context_length.map(|v| v as f64),
            Field::MaxCompletionTokens => spec.max_completion_tokens.map(|v| v as f64),
            Field::InputCost => spec.costs.input,
            Field::CachedInputCost => spec.costs.cached_input,
            Field::OutputCost => spec.costs.output,
            Field::ReasoningCost => spec.costs.reasoning,
            Field::Reasoning => spec.scores.reasoning.map(|v| v as f64),
            Field::Intelligence => spec.scores.intelligence.map(|v| v as f64),
            Field::Speed => spec.scores.speed.map(|v| v as f64),
            Field::Research => spec.scores.research.map(|v| v as f64),
            Field::WebSearch => spec.scores.web_search.map(|v| v as f64),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Predicate {
    /// Compares against the registry key.
    Name(Condition<String>),
    Attribute(Field, Condition<f64>),
}

impl Predicate {
    fn holds(&self, key: &str, spec: &ModelSpec) -> bool {
        match self {
            Predicate::Name(condition) => condition.holds(&key.to_string()),
            // A spec without the attribute never satisfies the condition.
            Predicate::Attribute(field, condition) => {
                field.of(spec).map_or(false, |actual| condition.holds(&actual))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Requirements {
    pub provider: Option<String>,
    pub predicates: Vec<Predicate>,
}

impl Requirements {
    pub(crate) fn by_name(key: &str) -> Requirements {
        Requirements {
            provider: None,
            predicates: vec![Predicate::Name(Condition::Eq(key.to_lowercase()))],
        }
    }

    /// Builds requirements from `(field, operator-prefixed value)` pairs.
    pub(crate) fn from_pairs<'p, I>(pairs: I) -> Result<Requirements, Error>
    where
        I: IntoIterator<Item = (&'p str, &'p str)>,
    {
        let mut requirements = Requirements::default();

        for (field, raw) in pairs {
            let field = field.trim();
            let condition = Condition::parse(raw)?;

            if field == "provider" {
                let provider = match &condition {
                    Condition::Eq(provider) => provider,
                    _ => {
                        return Err(Error::InvalidRequirement {
                            requirement: raw.to_string(),
                            reason: "the provider can only be compared with \"=\"".to_string(),
                        })
                    }
                };

                if !provider.eq_ignore_ascii_case("auto") {
                    requirements.provider = Some(provider.to_lowercase());
                }

                continue;
            }

            let predicate = if field == "name" {
                Predicate::Name(condition.map(|name| name.to_lowercase()))
            } else {
                let field = Field::from_str(field).map_err(|_| Error::UnknownField(field.to_string()))?;

                let value: f64 = condition.value().parse().map_err(|_| Error::InvalidRequirement {
                    requirement: raw.to_string(),
                    reason: format!("\"{}\" is not a number", condition.value()),
                })?;

                Predicate::Attribute(field, condition.map(|_| value))
            };

            requirements.predicates.push(predicate);
        }

        Ok(requirements)
    }

    /// Parses the compact `provider:field<op>value,...` form.
    pub(crate) fn parse(requirements: &str) -> Result<Requirements, Error> {
        // `name=ollama:llama3` has a colon too, but no provider prefix.
        let (provider, conditions) = match requirements.split_once(':') {
            Some((provider, conditions))
                if !provider.contains(OPERATOR_CHARS) && !provider.contains(',') =>
            {
                (Some(provider.trim()), conditions)
            }
            _ => (None, requirements),
        };

        let mut pairs = Vec::new();

        if let Some(provider) = provider {
            pairs.push(("provider", provider));
        }

        for condition in conditions.split(',').filter(|c| !c.trim().is_empty()) {
            let split = condition
                .find(OPERATOR_CHARS)
                .ok_or_else(|| Error::InvalidRequirement {
                    requirement: requirements.to_string(),
                    reason: format!("condition \"{}\" has no operator", condition),
                })?;

            pairs.push(condition.split_at(split));
        }

        Self::from_pairs(pairs)
    }

    /// The context length the caller asked about, if any.
    fn requested_context_length(&self) -> f64 {
        self.predicates
            .iter()
            .find_map(|predicate| match predicate {
                Predicate::Attribute(Field::ContextLength, condition) => Some(*condition.value()),
                _ => None,
            })
            .unwrap_or(0.0)
    }

    pub(crate) fn matches(&self, key: &str, spec: &ModelSpec) -> bool {
        if let Some(provider) = &self.provider {
            if !spec.provider.eq_ignore_ascii_case(provider) {
                return false;
            }
        }

        self.predicates.iter().all(|predicate| predicate.holds(key, spec))
    }
}

/// The price estimate models are ranked by.
pub(crate) fn estimated_price(spec: &ModelSpec, requested_context_length: f64) -> f64 {
    MIN_CONTEXT_TOKENS.max(requested_context_length)
        * spec.costs.input.unwrap_or(UNKNOWN_COST_PER_MILLION)
        + ASSUMED_OUTPUT_TOKENS * spec.costs.output.unwrap_or(UNKNOWN_COST_PER_MILLION)
}

impl TypeRegistry {
    /// The models satisfying `requirements`, cheapest first. Ties keep key
    /// order.
    pub(crate) fn rank(&self, requirements: &Requirements) -> Vec<(String, Arc<ModelSpec>)> {
        let context_length = requirements.requested_context_length();

        let mut ranked: Vec<(f64, String, Arc<ModelSpec>)> = self
            .snapshot()
            .into_iter()
            .filter(|(key, spec)| requirements.matches(key, spec))
            .map(|(key, spec)| (estimated_price(&spec, context_length), key, spec))
            .collect();

        ranked.sort_by(|(a, _, _), (b, _, _)| a.total_cmp(b));

        ranked.into_iter().map(|(_, key, spec)| (key, spec)).collect()
    }

    /// Picks the cheapest online model, or failing that the cheapest cold
    /// one.
    pub(crate) async fn select_with(&self, requirements: &Requirements) -> Result<ClientHandle, Error> {
        let ranked = self.rank(requirements);

        let statuses = join_all(ranked.iter().map(|(_, spec)| spec.status())).await;

        let candidates: Vec<_> = ranked.into_iter().zip(statuses).collect();

        let chosen = candidates
            .iter()
            .find(|(_, (status, _, _))| *status == Status::Online)
            .or_else(|| candidates.iter().find(|(_, (_, available, _))| *available));

        match chosen {
            Some(((key, spec), (status, _, _))) => {
                debug!(category = %self.category(), key = %key, %status, "selected model");

                Ok(ClientHandle::new(
                    self.category(),
                    key.clone(),
                    Arc::clone(spec),
                    ResolvedFeatures::new(),
                ))
            }
            None => Err(Error::NoOnlineModel),
        }
    }

    /// [`TypeRegistry::select_with`] for a requirement string or a
    /// registered key.
    pub(crate) async fn select(&self, requirements: &str) -> Result<ClientHandle, Error> {
        let requirements = if self.get(requirements).is_some() {
            Requirements::by_name(requirements)
        } else {
            Requirements::parse(requirements)?
        };

        self.select_with(&requirements).await
    }
}
