//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::prompts::DEFAULT_QA_PROMPT;

/// Theme (knowledge context) used when `QA_THEME_ID` is not set.
pub const DEFAULT_THEME_ID: &str = "e072f1d0-d2e9-45e8-a15b-42d2bcb74f18";

/// Overall request timeout used when `QA_TIMEOUT_SECS` is not set.
pub const DEFAULT_QA_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Bot transport address used when `ONEBOT_WS_URL` is not set.
pub const DEFAULT_ONEBOT_WS_URL: &str = "ws://127.0.0.1:6098";

/// QA backend configuration.
#[derive(Debug, Clone)]
pub struct QaConfig {
    /// Target URL for the multipart POST.
    pub api_endpoint: reqwest::Url,
    /// Sent verbatim as the `Authorization` header. `None` omits the header.
    pub token: Option<SecretString>,
    /// QA theme/context identifier.
    pub theme_id: String,
    /// System instruction sent with every request.
    pub prompt: String,
    /// Covers connect, transfer and response read.
    pub timeout: Duration,
}

impl QaConfig {
    /// Build a config with defaults for everything but the endpoint.
    pub fn new(api_endpoint: reqwest::Url) -> Self {
        Self {
            api_endpoint,
            token: None,
            theme_id: DEFAULT_THEME_ID.to_string(),
            prompt: DEFAULT_QA_PROMPT.to_string(),
            timeout: DEFAULT_QA_TIMEOUT,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.is_empty()).then(|| SecretString::from(token));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read `QA_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read `QA_*` variables through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup("QA_API_ENDPOINT")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("QA_API_ENDPOINT".into()))?;
        let api_endpoint =
            reqwest::Url::parse(endpoint.trim()).map_err(|e| ConfigError::InvalidValue {
                key: "QA_API_ENDPOINT".into(),
                message: e.to_string(),
            })?;

        let timeout = match lookup("QA_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "QA_TIMEOUT_SECS".into(),
                    message: format!("expected whole seconds, got {raw:?}"),
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "QA_TIMEOUT_SECS".into(),
                        message: "timeout must be greater than zero".into(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_QA_TIMEOUT,
        };

        let theme_id = lookup("QA_THEME_ID")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_THEME_ID.to_string());

        let prompt = lookup("QA_PROMPT")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_QA_PROMPT.to_string());

        Ok(Self {
            theme_id,
            prompt,
            ..Self::new(api_endpoint)
                .with_token(lookup("QA_TOKEN").unwrap_or_default())
                .with_timeout(timeout)
        })
    }
}

/// OneBot v11 WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct OneBotConfig {
    /// `ws://` or `wss://` address of the bot implementation.
    pub ws_url: String,
    /// Sent as `Authorization: Bearer <token>` on connect.
    pub access_token: Option<SecretString>,
    /// Upper bound for the reconnect backoff.
    pub max_backoff: Duration,
}

impl Default for OneBotConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_ONEBOT_WS_URL.to_string(),
            access_token: None,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl OneBotConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let ws_url = lookup("ONEBOT_WS_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ONEBOT_WS_URL.to_string());
        let access_token = lookup("ONEBOT_ACCESS_TOKEN")
            .filter(|s| !s.is_empty())
            .map(SecretString::from);

        Self {
            ws_url,
            access_token,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn qa_config_requires_endpoint() {
        let err = QaConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "QA_API_ENDPOINT"));
    }

    #[test]
    fn qa_config_rejects_bad_endpoint() {
        let err =
            QaConfig::from_lookup(lookup_from(&[("QA_API_ENDPOINT", "not a url")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn qa_config_defaults() {
        let config =
            QaConfig::from_lookup(lookup_from(&[("QA_API_ENDPOINT", "http://qa.local/ask")]))
                .unwrap();
        assert_eq!(config.api_endpoint.as_str(), "http://qa.local/ask");
        assert!(config.token.is_none());
        assert_eq!(config.theme_id, DEFAULT_THEME_ID);
        assert_eq!(config.prompt, DEFAULT_QA_PROMPT);
        assert_eq!(config.timeout, Duration::from_secs(1800));
    }

    #[test]
    fn qa_config_empty_token_is_omitted() {
        let config = QaConfig::from_lookup(lookup_from(&[
            ("QA_API_ENDPOINT", "http://qa.local/ask"),
            ("QA_TOKEN", ""),
        ]))
        .unwrap();
        assert!(config.token.is_none());
    }

    #[test]
    fn qa_config_overrides() {
        let config = QaConfig::from_lookup(lookup_from(&[
            ("QA_API_ENDPOINT", "http://qa.local/ask"),
            ("QA_TOKEN", "secret-token"),
            ("QA_THEME_ID", "theme-42"),
            ("QA_PROMPT", "be brief"),
            ("QA_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(
            config.token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("secret-token".to_string())
        );
        assert_eq!(config.theme_id, "theme-42");
        assert_eq!(config.prompt, "be brief");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn qa_config_rejects_zero_timeout() {
        let err = QaConfig::from_lookup(lookup_from(&[
            ("QA_API_ENDPOINT", "http://qa.local/ask"),
            ("QA_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "QA_TIMEOUT_SECS"));
    }

    #[test]
    fn onebot_config_defaults() {
        let config = OneBotConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.ws_url, DEFAULT_ONEBOT_WS_URL);
        assert!(config.access_token.is_none());
    }

    #[test]
    fn onebot_config_reads_token() {
        let config = OneBotConfig::from_lookup(lookup_from(&[
            ("ONEBOT_WS_URL", "ws://10.0.0.2:3001"),
            ("ONEBOT_ACCESS_TOKEN", "abc"),
        ]));
        assert_eq!(config.ws_url, "ws://10.0.0.2:3001");
        assert_eq!(
            config.access_token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("abc".to_string())
        );
    }
}
