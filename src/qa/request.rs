//! Multipart request body for the QA backend.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use uuid::Uuid;

/// A file sent alongside the question.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

impl Attachment {
    /// Read a file for upload. Missing or unreadable files yield `None`.
    pub async fn load(path: &Path) -> Option<Self> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %e,
                    "Attachment not readable, sending without file"
                );
                return None;
            }
        };

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();

        Some(Self { bytes, file_name })
    }
}

/// One question for the QA backend.
#[derive(Debug, Clone)]
pub struct QaRequest {
    /// Fresh for every request.
    pub session_id: String,
    pub prompt: String,
    pub theme_id: String,
    pub user_message: String,
    pub attachment: Option<Attachment>,
}

impl QaRequest {
    pub fn new(
        prompt: impl Into<String>,
        theme_id: impl Into<String>,
        user_message: impl Into<String>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            prompt: prompt.into(),
            theme_id: theme_id.into(),
            user_message: user_message.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Option<Attachment>) -> Self {
        self.attachment = attachment;
        self
    }

    /// Build the multipart body: `sessionId`, `prompt`, `themeId`, `userMsg`
    /// and an optional `file` part.
    pub fn into_form(self) -> Form {
        let form = Form::new()
            .text("sessionId", self.session_id)
            .text("prompt", self.prompt)
            .text("themeId", self.theme_id)
            .text("userMsg", self.user_message);

        match self.attachment {
            Some(Attachment { bytes, file_name }) => {
                form.part("file", Part::bytes(bytes).file_name(file_name))
            }
            None => form,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn each_request_gets_a_fresh_session_id() {
        let a = QaRequest::new("p", "t", "same question");
        let b = QaRequest::new("p", "t", "same question");
        assert_ne!(a.session_id, b.session_id);
        assert!(Uuid::parse_str(&a.session_id).is_ok());
    }

    #[test]
    fn form_has_boundary() {
        let form = QaRequest::new("p", "t", "q").into_form();
        assert!(!form.boundary().is_empty());
    }

    #[tokio::test]
    async fn load_missing_attachment_is_none() {
        let path = Path::new("/nonexistent/path/to/file.txt");
        assert!(Attachment::load(path).await.is_none());
    }

    #[tokio::test]
    async fn load_existing_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"error 42").unwrap();

        let attachment = Attachment::load(&path).await.unwrap();
        assert_eq!(attachment.bytes, b"error 42");
        assert_eq!(attachment.file_name, "log.txt");
    }

    #[tokio::test]
    async fn load_directory_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Attachment::load(dir.path()).await.is_none());
    }
}
