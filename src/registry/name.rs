//! Parsing of `provider:model[?feature[=value]&...]` names and matching of
//! their (possibly wildcarded) base against registry keys.

use glob::{MatchOptions, Pattern};

use super::Error;

/// A model name split into its base and its feature query.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ModelName<'n> {
    /// The `provider:model` segment, possibly with `*` wildcards.
    pub base: &'n str,
    /// `(feature, raw value)` pairs in the order they were written.
    pub features: Vec<(&'n str, &'n str)>,
}

impl<'n> ModelName<'n> {
    pub(crate) fn parse(name: &'n str) -> ModelName<'n> {
        let (base, query) = match name.split_once('?') {
            Some((base, query)) => (base, query),
            None => (name, ""),
        };

        let features = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| pair.split_once('=').unwrap_or((pair, "1")))
            .collect();

        ModelName { base, features }
    }

    pub(crate) fn is_pattern(&self) -> bool {
        self.base.contains('*')
    }

    pub(crate) fn feature_names(&self) -> impl Iterator<Item = &'n str> + '_ {
        self.features.iter().map(|(name, _)| *name)
    }
}

/// A `*`-only glob over registry keys. Every other character, including the
/// ones glob would treat specially, matches literally and case-insensitively.
pub(crate) struct KeyPattern {
    pattern: Pattern,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

impl KeyPattern {
    pub(crate) fn new(base: &str) -> Result<KeyPattern, Error> {
        // glob gives `**` its own meaning; any run of stars is one wildcard here.
        let escaped: Vec<String> = base
            .split('*')
            .enumerate()
            .filter(|(i, literal)| *i == 0 || !literal.is_empty())
            .map(|(_, literal)| Pattern::escape(literal))
            .collect();

        let mut pattern = escaped.join("*");

        if base.ends_with('*') && !pattern.ends_with('*') {
            pattern.push('*');
        }

        let pattern = Pattern::new(&pattern).map_err(|err| Error::InvalidPattern {
            pattern: base.to_string(),
            reason: err.msg.to_string(),
        })?;

        Ok(KeyPattern { pattern })
    }

    pub(crate) fn matches(&self, key: &str) -> bool {
        self.pattern.matches_with(key, MATCH_OPTIONS)
    }

    /// Returns the matching keys, preserving the order of `keys`.
    pub(crate) fn filter<'k, I>(&self, keys: I) -> Vec<&'k str>
    where
        I: IntoIterator<Item = &'k str>,
    {
        keys.into_iter().filter(|key| self.matches(key)).collect()
    }
}
