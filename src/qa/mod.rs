//! Question-answering backend integration.
//!
//! The backend is a black box reached by one multipart POST per question.
//! [`QaService::dispatch`] never fails: every fault is folded into one of
//! the fixed display strings below.

pub mod client;
pub mod request;

pub use client::QaClient;
pub use request::{Attachment, QaRequest};

use std::path::Path;

use async_trait::async_trait;

use crate::error::DispatchError;

/// Shown when the backend does not answer within the configured timeout.
pub const TIMEOUT_REPLY: &str = "抱歉，AI 服务响应超时，无法生成回复。";

/// Shown for non-success statuses and transport faults.
pub const UNAVAILABLE_REPLY: &str = "抱歉，AI 服务暂时不可用，无法生成回复。";

/// Shown when the backend succeeds with an empty body.
pub const EMPTY_REPLY: &str = "抱歉，我现在无法回复您的问题。";

/// Header carrying the fixed data-source selector.
pub const UDS_CODE_HEADER: &str = "uds_code";

/// Value of [`UDS_CODE_HEADER`], sent on every request.
pub const UDS_CODE_VALUE: &str = r#"{"UdsCode":"hrs_qm","DataUdsCode":""}"#;

/// Raw outcome of one backend exchange.
pub type QaResult = Result<String, DispatchError>;

/// Fold an exchange outcome into a user-presentable string.
pub fn display_text(result: &QaResult) -> &str {
    match result {
        Ok(body) if body.is_empty() => EMPTY_REPLY,
        Ok(body) => body,
        Err(DispatchError::Timeout(_)) => TIMEOUT_REPLY,
        Err(DispatchError::Backend { .. } | DispatchError::Transport(_)) => UNAVAILABLE_REPLY,
    }
}

/// Something that can answer a question.
#[async_trait]
pub trait QaService: Send + Sync {
    /// Ask one question, optionally with a file. Exactly one exchange is
    /// attempted; the returned string is always safe to show in chat.
    async fn dispatch(&self, question: &str, attachment: Option<&Path>) -> String;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn success_body_is_passed_through() {
        let result: QaResult = Ok("answer".into());
        assert_eq!(display_text(&result), "answer");
    }

    #[test]
    fn empty_body_maps_to_cannot_answer() {
        let result: QaResult = Ok(String::new());
        assert_eq!(display_text(&result), EMPTY_REPLY);
    }

    #[test]
    fn failures_map_to_safe_strings() {
        assert_eq!(
            display_text(&Err(DispatchError::Timeout(Duration::from_secs(1)))),
            TIMEOUT_REPLY
        );
        assert_eq!(
            display_text(&Err(DispatchError::Backend {
                status: 500,
                body: "stack trace".into()
            })),
            UNAVAILABLE_REPLY
        );
        assert_eq!(
            display_text(&Err(DispatchError::Transport("refused".into()))),
            UNAVAILABLE_REPLY
        );
    }

    #[test]
    fn uds_code_is_valid_json() {
        let value: serde_json::Value = serde_json::from_str(UDS_CODE_VALUE).unwrap();
        assert_eq!(value["UdsCode"], "hrs_qm");
        assert_eq!(value["DataUdsCode"], "");
    }
}
