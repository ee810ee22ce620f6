//! Transport Configuration
//!
//! Endpoint, credential and timing knobs for a binding plus the reconnect
//! budget the controller applies on top of it.

use std::fmt;
use std::time::Duration;

use crate::connection::ReconnectPolicy;

/// Default backend endpoint
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:3001/realtime";

/// Opaque authentication credential
///
/// Never printed: `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token, for the binding's handshake only
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(****)")
    }
}

/// Transport configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    /// Backend URL
    pub endpoint: String,

    /// Credential presented during the handshake
    pub credential: Option<Credential>,

    /// Connection timeout in milliseconds
    ///
    /// How long a binding waits for the handshake before reporting failure.
    pub connect_timeout_ms: u64,

    /// Reconnection attempts (0 = no reconnection)
    ///
    /// How many consecutive automatic attempts to make after a failure.
    pub reconnect_attempts: u32,

    /// Base delay between reconnection attempts in milliseconds
    ///
    /// Doubled after every failed attempt.
    pub reconnect_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            credential: None,
            connect_timeout_ms: 5000,
            reconnect_attempts: 5,
            reconnect_delay_ms: 1000,
        }
    }
}

impl TransportConfig {
    /// Configuration for `endpoint` with default timing
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Attach a credential (builder pattern)
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `REALTIME_ENDPOINT`: Backend URL
    /// - `REALTIME_TOKEN`: Authentication token
    /// - `REALTIME_CONNECT_TIMEOUT`: Connection timeout in ms
    /// - `REALTIME_RECONNECT_ATTEMPTS`: Number of reconnection attempts
    /// - `REALTIME_RECONNECT_DELAY`: Base reconnection delay in ms
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Overlay values found through `lookup`, returning whether any applied
    ///
    /// Unparseable numbers are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = false;

        if let Some(endpoint) = lookup("REALTIME_ENDPOINT").filter(|v| !v.is_empty()) {
            self.endpoint = endpoint;
            applied = true;
        }
        if let Some(token) = lookup("REALTIME_TOKEN").filter(|v| !v.is_empty()) {
            self.credential = Some(Credential::new(token));
            applied = true;
        }
        if let Some(ms) = lookup("REALTIME_CONNECT_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.connect_timeout_ms = ms;
            applied = true;
        }
        if let Some(n) = lookup("REALTIME_RECONNECT_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.reconnect_attempts = n;
            applied = true;
        }
        if let Some(ms) = lookup("REALTIME_RECONNECT_DELAY").and_then(|v| v.parse().ok()) {
            self.reconnect_delay_ms = ms;
            applied = true;
        }

        applied
    }

    /// Handshake timeout
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Fresh reconnect policy built from this configuration
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.reconnect_delay_ms),
            self.reconnect_attempts,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.reconnect_attempts, 5);
        assert_eq!(config.reconnect_delay_ms, 1000);
        assert!(config.credential.is_none());
    }

    #[test]
    fn test_credential_is_redacted() {
        let config = TransportConfig::new("ws://x").with_credential(Credential::new("s3cret"));
        let printed = format!("{config:?}");
        assert!(!printed.contains("s3cret"));
        assert!(printed.contains("Credential(****)"));
    }

    #[test]
    fn test_apply_env() {
        let mut config = TransportConfig::default();
        let applied = config.apply_env(env(&[
            ("REALTIME_ENDPOINT", "wss://chat.example.com/rt"),
            ("REALTIME_TOKEN", "abc"),
            ("REALTIME_RECONNECT_ATTEMPTS", "2"),
            ("REALTIME_RECONNECT_DELAY", "not-a-number"),
        ]));

        assert!(applied);
        assert_eq!(config.endpoint, "wss://chat.example.com/rt");
        assert_eq!(config.credential.as_ref().map(Credential::expose), Some("abc"));
        assert_eq!(config.reconnect_attempts, 2);
        assert_eq!(config.reconnect_delay_ms, 1000);
    }

    #[test]
    fn test_apply_env_nothing_set() {
        let mut config = TransportConfig::default();
        assert!(!config.apply_env(env(&[])));
        assert_eq!(config, TransportConfig::default());
    }

    #[test]
    fn test_reconnect_policy_from_config() {
        let config = TransportConfig {
            reconnect_attempts: 2,
            reconnect_delay_ms: 100,
            ..Default::default()
        };
        let policy = config.reconnect_policy();
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.base_delay(), Duration::from_millis(100));
        assert_eq!(policy.attempt_count(), 0);
    }
}
