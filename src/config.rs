use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use toml;

use crate::providers::cached_fetcher::{CacheSettings, DEFAULT_TIMEOUT, DEFAULT_TTL};
use crate::registry::feature::FeatureSpec;
use crate::registry::spec::{Costs, Scores};
use crate::registry::Category;

#[derive(Deserialize, Serialize, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RequestedProviderEnabled {
    #[default]
    Auto,
    Yes,
    No,
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub(crate) struct Ollama {
    #[serde(default)]
    pub enabled: RequestedProviderEnabled,
    pub api_base: Option<String>,
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub(crate) struct OpenAI {
    #[serde(default)]
    pub enabled: RequestedProviderEnabled,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub(crate) struct Providers {
    #[serde(default)]
    pub ollama: Ollama,
    #[serde(default)]
    pub openai: OpenAI,
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub(crate) struct Cache {
    pub ttl_secs: Option<u64>,
    pub timeout_ms: Option<u64>,
}

impl Cache {
    pub(crate) fn settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: self.ttl_secs.map(Duration::from_secs).unwrap_or(DEFAULT_TTL),
            timeout: self
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TIMEOUT),
        }
    }
}

/// A model declared by hand in the config file.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub(crate) struct DeclaredModel {
    pub category: Category,
    pub provider: String,
    pub model_id: String,
    pub context_length: Option<u64>,
    pub max_completion_tokens: Option<u64>,
    #[serde(default)]
    pub costs: Costs,
    #[serde(default)]
    pub scores: Scores,
    /// Polled to decide availability; 2xx means available.
    pub health_url: Option<String>,
    /// Treat the model as available without polling anything.
    #[serde(default)]
    pub always_available: bool,
    #[serde(default)]
    pub features: BTreeMap<String, FeatureSpec>,
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub(crate) struct Config {
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub providers: Providers,
    #[serde(default)]
    pub models: Vec<DeclaredModel>,
}

fn get_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME");

    if let Some(home) = home {
        let home = PathBuf::from(home);

        const USER_PATHS: [&str; 2] = [".config/crossroute/config.toml", ".crossroute.toml"];

        for &path in USER_PATHS.iter() {
            let fullpath = home.join(path);

            if fullpath.exists() {
                return Some(fullpath);
            }
        }
    }

    let system_config = PathBuf::from("/etc/crossroute.toml");

    if system_config.exists() {
        Some(system_config)
    } else {
        None
    }
}

fn parse_config<S: serde::de::DeserializeOwned>(config: &str) -> Result<S, toml::de::Error> {
    toml::de::from_str(config)
}

fn parse_config_or_die<S: serde::de::DeserializeOwned>(config: &str) -> S {
    match parse_config(config) {
        Ok(s) => s,
        Err(err) => die::die!("failed to parse config: {}", err),
    }
}

fn extra_fields_helper<'a>(
    path: &mut Vec<&'a String>,
    user_config: &'a toml::Table,
    config: &'a toml::Table,
    extra: &mut Vec<String>,
) {
    for (user_key, user_value) in user_config {
        path.push(user_key);

        if let Some(config_value) = config.get(user_key) {
            if let (toml::Value::Table(user_value), toml::Value::Table(config_value)) =
                (user_value, config_value)
            {
                extra_fields_helper(path, user_value, config_value, extra)
            }
        } else {
            let path: Vec<&str> = path.iter().map(|&s| s.as_str()).collect();

            extra.push(path.join("."));
        }

        path.pop();
    }
}

/// Dotted paths of the keys in `raw_config` that the parsed `config` does not
/// know about.
fn extra_fields(config: &Config, raw_config: &str) -> Vec<String> {
    let user_config: toml::Table = match parse_config(raw_config) {
        Ok(table) => table,
        Err(_) => return Vec::new(),
    };

    let config: toml::Table = match toml::ser::to_string(&config)
        .ok()
        .and_then(|serialized| parse_config(&serialized).ok())
    {
        Some(table) => table,
        None => {
            tracing::debug!("failed to reserialize the config, skipping the extraneous key check");
            return Vec::new();
        }
    };

    let mut path = Vec::new();
    let mut extra = Vec::new();

    extra_fields_helper(&mut path, &user_config, &config, &mut extra);

    extra
}

pub(crate) fn read_config(config: Option<PathBuf>) -> Config {
    let config_path = config.or_else(get_config_path);

    if let Some(path) = config_path {
        let raw_config = match std::fs::read_to_string(&path) {
            Ok(raw_config) => raw_config,
            Err(err) => die::die!("failed to read config {}: {}", path.display(), err),
        };

        let config: Config = parse_config_or_die(&raw_config);

        for key in extra_fields(&config, &raw_config) {
            crate::warn!("config contains extraneous key \"{}\", ignoring", key);
        }

        config
    } else {
        Config::default()
    }
}
