//! Key matchers used by invalidation.

use regex::Regex;

// == Key Pattern ==
/// Selects which cached keys an invalidation removes.
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// A single key
    Exact(String),
    /// Every key starting with the prefix, e.g. `"projects:"`
    Prefix(String),
    /// Every key the expression matches
    Regex(Regex),
}

impl KeyPattern {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        KeyPattern::Prefix(prefix.into())
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Exact(exact) => exact == key,
            KeyPattern::Prefix(prefix) => key.starts_with(prefix.as_str()),
            KeyPattern::Regex(regex) => regex.is_match(key),
        }
    }
}

impl From<&str> for KeyPattern {
    fn from(key: &str) -> Self {
        KeyPattern::Exact(key.to_string())
    }
}

impl From<String> for KeyPattern {
    fn from(key: String) -> Self {
        KeyPattern::Exact(key)
    }
}

impl From<Regex> for KeyPattern {
    fn from(regex: Regex) -> Self {
        KeyPattern::Regex(regex)
    }
}
