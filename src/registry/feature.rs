//! Typed, per-call tuning parameters a model declares (temperature,
//! reasoning effort, voice, ...), and the coercion of raw values taken from a
//! model name into those types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::Error;

/// Feature values after coercion, keyed by feature name.
pub(crate) type ResolvedFeatures = BTreeMap<String, FeatureValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum FeatureValue {
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<String>),
}

impl FeatureValue {
    pub(crate) fn as_json(&self) -> serde_json::Value {
        match self {
            FeatureValue::Bool(b) => serde_json::Value::Bool(*b),
            FeatureValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FeatureValue::String(s) => serde_json::Value::String(s.clone()),
            FeatureValue::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect(),
            ),
        }
    }
}

impl std::fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureValue::Bool(b) => write!(f, "{}", b),
            FeatureValue::Number(n) => write!(f, "{}", n),
            FeatureValue::String(s) => write!(f, "{}", s),
            FeatureValue::Array(items) => write!(f, "{}", items.join(",")),
        }
    }
}

/// The declared type of a feature, with its constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum FeatureKind {
    Boolean,
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    String,
    Enum {
        values: Vec<String>,
    },
    Array,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct FeatureSpec {
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub kind: FeatureKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<FeatureValue>,
}

impl FeatureSpec {
    fn new(description: &str, kind: FeatureKind) -> FeatureSpec {
        FeatureSpec {
            description: description.to_string(),
            kind,
            default: None,
        }
    }

    pub(crate) fn boolean(description: &str) -> FeatureSpec {
        Self::new(description, FeatureKind::Boolean)
    }

    pub(crate) fn number(description: &str, min: Option<f64>, max: Option<f64>) -> FeatureSpec {
        Self::new(description, FeatureKind::Number { min, max })
    }

    pub(crate) fn string(description: &str) -> FeatureSpec {
        Self::new(description, FeatureKind::String)
    }

    pub(crate) fn enumeration(description: &str, values: &[&str]) -> FeatureSpec {
        let values = values.iter().map(|v| v.to_string()).collect();

        Self::new(description, FeatureKind::Enum { values })
    }

    pub(crate) fn array(description: &str) -> FeatureSpec {
        Self::new(description, FeatureKind::Array)
    }

    pub(crate) fn with_default(mut self, default: FeatureValue) -> FeatureSpec {
        self.default = Some(default);
        self
    }

    /// Coerces the raw value of feature `name` to the declared type.
    ///
    /// An enum value that is not allowed falls back to the default; `None`
    /// means the feature has no default either and is left unset.
    pub(crate) fn coerce(&self, name: &str, raw: &str) -> Result<Option<FeatureValue>, Error> {
        let value = match &self.kind {
            FeatureKind::Boolean => FeatureValue::Bool(raw == "1" || raw.eq_ignore_ascii_case("true")),
            FeatureKind::Number { min, max } => {
                let value = raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| Error::InvalidFeatureValue {
                        feature: name.to_string(),
                        value: raw.to_string(),
                    })?;

                let below = min.map_or(false, |min| value < min);
                let above = max.map_or(false, |max| value > max);

                if below || above {
                    return Err(Error::FeatureOutOfRange {
                        feature: name.to_string(),
                        value,
                        min: *min,
                        max: *max,
                    });
                }

                FeatureValue::Number(value)
            }
            FeatureKind::Enum { values } => {
                if values.iter().any(|allowed| allowed == raw) {
                    FeatureValue::String(raw.to_string())
                } else {
                    debug!(feature = name, value = raw, "value not allowed, using the default");

                    return Ok(self.default.clone());
                }
            }
            FeatureKind::Array => {
                FeatureValue::Array(raw.split(',').map(|s| s.trim().to_string()).collect())
            }
            FeatureKind::String => FeatureValue::String(raw.to_string()),
        };

        Ok(Some(value))
    }
}
