//! Build configuration.
//!
//! The builders never read the process environment; they take a
//! [`BuildConfig`]. [`BuildConfig::from_env`] exists for the outermost entry
//! point only.

use crate::types::{AgentHeaders, AGENT_HEADER_KEYS};
use chrono::{SecondsFormat, Utc};
use std::collections::BTreeMap;

/// Environment key overriding the wall clock.
pub const TIMESTAMP_ENV: &str = "BLUX_DETERMINISTIC_TIMESTAMP";

/// Prefix of agent-header environment keys (`BLUX_AGENT_MODEL_VERSION`, ...).
pub const AGENT_ENV_PREFIX: &str = "BLUX_AGENT_";

/// Configuration consulted once per document-creation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildConfig {
    /// Replaces the wall clock for `created_at` when set.
    pub timestamp_override: Option<String>,
    /// Configured agent-header values keyed by header name.
    pub agent_defaults: BTreeMap<String, String>,
}

impl BuildConfig {
    /// Configuration with a fixed timestamp and no agent defaults.
    pub fn with_timestamp(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp_override: Some(timestamp.into()),
            agent_defaults: BTreeMap::new(),
        }
    }

    /// Set a configured agent-header value.
    pub fn with_agent_default(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.agent_defaults.insert(key.into(), value.into());
        self
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration from any key/value lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let agent_defaults = AGENT_HEADER_KEYS
            .iter()
            .filter_map(|key| {
                let env_key = format!("{}{}", AGENT_ENV_PREFIX, key.to_ascii_uppercase());
                get(&env_key).map(|v| ((*key).to_string(), v))
            })
            .collect();

        Self {
            timestamp_override: get(TIMESTAMP_ENV),
            agent_defaults,
        }
    }

    /// Timestamp for a new document: the override if set, else UTC now at second precision.
    pub fn timestamp(&self) -> String {
        match &self.timestamp_override {
            Some(ts) => ts.clone(),
            None => Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        }
    }

    /// Resolve agent headers: supplied values win, then configured values, then `"unknown"`.
    ///
    /// Supplied keys outside the recognized set are ignored.
    pub fn resolve_agent_headers(&self, supplied: &BTreeMap<String, String>) -> AgentHeaders {
        let mut headers = AgentHeaders::default();
        for key in AGENT_HEADER_KEYS {
            let value = supplied
                .get(key)
                .filter(|v| !v.is_empty())
                .or_else(|| self.agent_defaults.get(key));
            if let (Some(value), Some(slot)) = (value, headers.slot_mut(key)) {
                *slot = value.clone();
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UNKNOWN;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_reads_recognized_keys() {
        let config = BuildConfig::from_lookup(lookup_from(&[
            (TIMESTAMP_ENV, "2024-01-01T00:00:00Z"),
            ("BLUX_AGENT_INPUT_HASH", "sha256:agent"),
            ("BLUX_AGENT_MODEL_VERSION", "gpt-test"),
            ("BLUX_AGENT_TEMPERATURE", "0.2"),
        ]));

        assert_eq!(config.timestamp(), "2024-01-01T00:00:00Z");
        assert_eq!(config.agent_defaults.len(), 2);
        assert_eq!(config.agent_defaults["model_version"], "gpt-test");
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = BuildConfig::from_lookup(lookup_from(&[
            (TIMESTAMP_ENV, ""),
            ("BLUX_AGENT_DEVICE", ""),
        ]));
        assert_eq!(config.timestamp_override, None);
        assert!(config.agent_defaults.is_empty());
    }

    #[test]
    fn test_wall_clock_format() {
        let ts = BuildConfig::default().timestamp();
        assert!(ts.ends_with("+00:00"), "{ts}");
        assert!(!ts.contains('.'), "sub-second precision leaked: {ts}");
    }

    #[test]
    fn test_agent_header_precedence() {
        let config = BuildConfig::default()
            .with_agent_default("model_version", "configured")
            .with_agent_default("device", "cpu");
        let supplied: BTreeMap<String, String> = [
            ("model_version".to_string(), "supplied".to_string()),
            ("unrecognized".to_string(), "x".to_string()),
        ]
        .into_iter()
        .collect();

        let headers = config.resolve_agent_headers(&supplied);
        assert_eq!(headers.model_version, "supplied");
        assert_eq!(headers.device, "cpu");
        assert_eq!(headers.input_hash, UNKNOWN);
    }
}
