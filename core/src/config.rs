//! Client defaults.
//!
//! # Design
//! Defaults come from `ClientConfig::default()`. `from_env` layers two
//! environment variables on top, the same way the mock server picks its
//! port: a missing variable keeps the default, and an unparsable one is
//! logged and ignored rather than failing startup. `Client::new` and the
//! free request functions use `from_env`; `Client::with_config` takes a
//! config as given.

use tracing::warn;

pub const TIMEOUT_ENV: &str = "FLUENT_REQUEST_TIMEOUT_MS";
pub const USER_AGENT_ENV: &str = "FLUENT_REQUEST_USER_AGENT";

/// Defaults applied to every request a `Client` creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Timeout in milliseconds; 0 disables it.
    pub timeout_ms: u64,
    pub user_agent: Option<String>,
    /// Extra headers set on every request before caller-set ones.
    pub headers: Vec<(String, String)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 0,
            user_agent: Some(format!("fluent-request/{}", env!("CARGO_PKG_VERSION"))),
            headers: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `FLUENT_REQUEST_TIMEOUT_MS` and
    /// `FLUENT_REQUEST_USER_AGENT`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse() {
                Ok(timeout_ms) => config.timeout_ms = timeout_ms,
                Err(err) => warn!(%raw, %err, "ignoring invalid {}", TIMEOUT_ENV),
            }
        }
        if let Some(agent) = lookup(USER_AGENT_ENV) {
            config.user_agent = Some(agent).filter(|a| !a.is_empty());
        }
        config
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = ClientConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.timeout_ms, 0);
        assert!(config.user_agent.unwrap().starts_with("fluent-request/"));
    }

    #[test]
    fn env_overrides_timeout_and_agent() {
        let config = ClientConfig::from_lookup(lookup(&[
            (TIMEOUT_ENV, " 250 "),
            (USER_AGENT_ENV, "tests/1.0"),
        ]));
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.user_agent.as_deref(), Some("tests/1.0"));
    }

    #[test]
    fn invalid_timeout_is_ignored() {
        let config = ClientConfig::from_lookup(lookup(&[(TIMEOUT_ENV, "soon")]));
        assert_eq!(config.timeout_ms, 0);
    }

    #[test]
    fn empty_agent_disables_header() {
        let config = ClientConfig::from_lookup(lookup(&[(USER_AGENT_ENV, "")]));
        assert!(config.user_agent.is_none());
    }
}
