//! HTTP client for the QA backend.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use secrecy::ExposeSecret;

use crate::config::QaConfig;
use crate::error::{ConfigError, DispatchError};
use crate::qa::request::{Attachment, QaRequest};
use crate::qa::{QaResult, QaService, UDS_CODE_HEADER, UDS_CODE_VALUE, display_text};

/// QA backend client.
///
/// Holds one pooled `reqwest::Client` with the timeout and headers fixed at
/// construction, so a single instance can serve concurrent dispatches.
#[derive(Clone)]
pub struct QaClient {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    prompt: String,
    theme_id: String,
    timeout: Duration,
}

impl QaClient {
    pub fn new(config: &QaConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers(config)?)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "http_client".into(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: config.api_endpoint.clone(),
            prompt: config.prompt.clone(),
            theme_id: config.theme_id.clone(),
            timeout: config.timeout,
        })
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }

    /// Build a request for `question` with a fresh session id.
    pub fn build_request(&self, question: &str) -> QaRequest {
        QaRequest::new(&self.prompt, &self.theme_id, question)
    }

    /// Perform one exchange and classify the outcome. No retry.
    pub async fn exchange(&self, request: QaRequest) -> QaResult {
        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(request.into_form())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(DispatchError::Backend {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn classify(&self, err: reqwest::Error) -> DispatchError {
        if err.is_timeout() {
            DispatchError::Timeout(self.timeout)
        } else {
            DispatchError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl QaService for QaClient {
    async fn dispatch(&self, question: &str, attachment: Option<&Path>) -> String {
        let attachment = match attachment {
            Some(path) => Attachment::load(path).await,
            None => None,
        };
        if let Some(ref file) = attachment {
            tracing::info!(file_name = %file.file_name, "Attaching file to QA request");
        }

        let request = self.build_request(question).with_attachment(attachment);
        let session_id = request.session_id.clone();
        let result = self.exchange(request).await;

        match &result {
            Ok(body) => tracing::info!(
                session_id = %session_id,
                length = body.chars().count(),
                "QA backend answered"
            ),
            Err(DispatchError::Timeout(after)) => tracing::error!(
                session_id = %session_id,
                timeout = ?after,
                "QA backend timed out"
            ),
            Err(DispatchError::Backend { status, body }) => tracing::error!(
                session_id = %session_id,
                status,
                body = %body,
                "QA backend returned an error"
            ),
            Err(DispatchError::Transport(reason)) => tracing::error!(
                session_id = %session_id,
                error = %reason,
                "QA backend call failed"
            ),
        }

        display_text(&result).to_string()
    }
}

fn default_headers(config: &QaConfig) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static(UDS_CODE_HEADER),
        HeaderValue::from_static(UDS_CODE_VALUE),
    );

    if let Some(token) = &config.token {
        let mut value =
            HeaderValue::from_str(token.expose_secret()).map_err(|e| ConfigError::InvalidValue {
                key: "QA_TOKEN".into(),
                message: e.to_string(),
            })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> QaConfig {
        QaConfig::new(reqwest::Url::parse("http://127.0.0.1:9/qa").unwrap())
    }

    #[test]
    fn headers_without_token() {
        let headers = default_headers(&config()).unwrap();
        assert_eq!(headers.get(UDS_CODE_HEADER).unwrap(), UDS_CODE_VALUE);
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn headers_with_token_are_sent_verbatim() {
        let headers = default_headers(&config().with_token("abc123")).unwrap();
        let auth = headers.get(AUTHORIZATION).unwrap();
        assert_eq!(auth, "abc123");
        assert!(auth.is_sensitive());
    }

    #[test]
    fn token_with_newline_is_rejected() {
        let err = QaClient::new(&config().with_token("bad\ntoken")).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "QA_TOKEN"));
    }

    #[test]
    fn build_request_uses_configured_prompt_and_theme() {
        let client = QaClient::new(&config()).unwrap();
        let request = client.build_request("how?");
        assert_eq!(request.theme_id, crate::config::DEFAULT_THEME_ID);
        assert_eq!(request.prompt, crate::prompts::DEFAULT_QA_PROMPT);
        assert_eq!(request.user_message, "how?");
        assert!(request.attachment.is_none());
    }

    #[tokio::test]
    async fn unreachable_backend_yields_unavailable() {
        // Port 9 (discard) is not listening on loopback.
        let client = QaClient::new(&config()).unwrap();
        let reply = client.dispatch("hello", None).await;
        assert_eq!(reply, crate::qa::UNAVAILABLE_REPLY);
    }
}
