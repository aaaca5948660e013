//! Hosted-model backend: uploads a page image to a remote inference
//! endpoint, with an optional second "table pass" for content that looks
//! like a Markdown table (spec.md §4.2).

use std::sync::Mutex;

use async_trait::async_trait;

use crate::application::backend::retry::with_retry;
use crate::application::backend::{OcrBackend, OcrError};

const TABLE_APPEND_MARKER: &str = "<!-- HTML tables with rowspan/colspan -->";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrMode {
    /// Run the table-detection heuristic and append a second pass when it
    /// fires.
    Auto,
    /// Always return the first pass alone.
    Text,
    /// Always attempt the table pass, regardless of what the first pass's
    /// text looks like.
    Table,
}

impl OcrMode {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "auto" => Ok(OcrMode::Auto),
            "text" => Ok(OcrMode::Text),
            "table" => Ok(OcrMode::Table),
            other => Err(format!("invalid OCR_MODE `{other}`, expected auto|text|table")),
        }
    }
}

/// Holds the hosted inference endpoint and token. The cached
/// `reqwest::Client` is dropped and rebuilt on any retryable failure, per
/// the adapter's resource policy.
pub struct HostedModelBackend {
    endpoint: String,
    token: String,
    mode: OcrMode,
    client: Mutex<Option<reqwest::Client>>,
}

impl HostedModelBackend {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, mode: OcrMode) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            mode,
            client: Mutex::new(None),
        }
    }

    fn client(&self) -> reqwest::Client {
        let mut guard = self.client.lock().expect("client mutex poisoned");
        guard.get_or_insert_with(reqwest::Client::new).clone()
    }

    fn drop_client(&self) {
        self.client.lock().expect("client mutex poisoned").take();
    }

    async fn call_once(&self, image_bytes: &[u8], task: &str) -> Result<String, OcrError> {
        if self.endpoint.is_empty() {
            return Err(OcrError::Configuration(
                "hosted model endpoint not configured: set HOSTED_MODEL_URL".to_string(),
            ));
        }

        let client = self.client();
        let response = client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({
                "task": task,
                "image_base64": base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    image_bytes,
                ),
            }))
            .send()
            .await
            .map_err(|err| OcrError::Transient(err.to_string()))?;

        let response = response
            .error_for_status()
            .map_err(|err| OcrError::Transient(err.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| OcrError::Transient(err.to_string()))?;

        body.get("markdown")
            .or_else(|| body.get("html"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| OcrError::Transient("response missing markdown/html field".to_string()))
    }
}

/// A first-pass result looks like it contains a Markdown table when it
/// has a pipe and either a header separator (`---`) or a left-align
/// marker (`| :`).
fn looks_like_table(markdown: &str) -> bool {
    markdown.contains('|') && (markdown.contains("---") || markdown.contains("| :"))
}

#[async_trait]
impl OcrBackend for HostedModelBackend {
    async fn process_image(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        let first_pass = with_retry(
            |_idx| self.call_once(image_bytes, "text"),
            || self.drop_client(),
        )
        .await?;

        let should_try_table = match self.mode {
            OcrMode::Text => false,
            OcrMode::Table => true,
            OcrMode::Auto => looks_like_table(&first_pass),
        };

        if !should_try_table {
            return Ok(first_pass);
        }

        // Second-pass failures, or output without an actual table, are
        // swallowed: the first pass alone is still a valid result.
        match self.call_once(image_bytes, "table").await {
            Ok(table_html) if table_html.contains("<table") => {
                Ok(format!("{first_pass}\n\n{TABLE_APPEND_MARKER}\n\n{table_html}"))
            }
            _ => Ok(first_pass),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pipe_and_dashes_as_a_table() {
        assert!(looks_like_table("| a | b |\n| --- | --- |\n| 1 | 2 |"));
    }

    #[test]
    fn detects_left_align_marker_as_a_table() {
        assert!(looks_like_table("| a | b |\n| :--- | :--- |"));
    }

    #[test]
    fn plain_text_is_not_a_table() {
        assert!(!looks_like_table("Just some ordinary paragraph text."));
    }

    #[test]
    fn mode_parses_known_values() {
        assert_eq!(OcrMode::parse("auto").unwrap(), OcrMode::Auto);
        assert_eq!(OcrMode::parse("text").unwrap(), OcrMode::Text);
        assert_eq!(OcrMode::parse("table").unwrap(), OcrMode::Table);
        assert!(OcrMode::parse("bogus").is_err());
    }
}
