//! Self-hosted backend: posts a base64-encoded PNG to a configurable
//! OpenAI-compatible chat-completions endpoint; falls back to a simpler
//! `/api/generate`-style endpoint on failure (spec.md §4.2), grounded in
//! the Ollama-style HTTP contract.

use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;

use crate::application::backend::retry::with_retry;
use crate::application::backend::{OcrBackend, OcrError};

const PROMPT: &str = "Extract all text from this image and format it as markdown.";

pub struct SelfHostedBackend {
    base_url: String,
    model: String,
    client: Mutex<Option<reqwest::Client>>,
}

impl SelfHostedBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
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

    async fn call_chat_completions(&self, base64_image: &str) -> Result<String, OcrError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .client()
            .post(&url)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "text", "text": PROMPT},
                        {"type": "image_url", "image_url": {
                            "url": format!("data:image/png;base64,{base64_image}")
                        }},
                    ],
                }],
                "stream": false,
            }))
            .send()
            .await
            .map_err(|err| OcrError::Transient(err.to_string()))?
            .error_for_status()
            .map_err(|err| OcrError::Transient(err.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| OcrError::Transient(err.to_string()))?;

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| OcrError::Transient("missing choices[0].message.content".to_string()))
    }

    async fn call_generate_fallback(&self, base64_image: &str) -> Result<String, OcrError> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let response = self
            .client()
            .post(&url)
            .json(&serde_json::json!({
                "model": self.model,
                "prompt": PROMPT,
                "images": [base64_image],
                "stream": false,
            }))
            .send()
            .await
            .map_err(|err| OcrError::Transient(err.to_string()))?
            .error_for_status()
            .map_err(|err| OcrError::Transient(err.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| OcrError::Transient(err.to_string()))?;

        body.get("response")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| OcrError::Transient("missing 'response' key".to_string()))
    }
}

#[async_trait]
impl OcrBackend for SelfHostedBackend {
    async fn process_image(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        if self.base_url.is_empty() {
            return Err(OcrError::Configuration(
                "self-hosted backend not configured: set OLLAMA_URL".to_string(),
            ));
        }

        let base64_image = base64::engine::general_purpose::STANDARD.encode(image_bytes);

        with_retry(
            |_idx| {
                let base64_image = base64_image.clone();
                async move {
                    match self.call_chat_completions(&base64_image).await {
                        Ok(markdown) => Ok(markdown),
                        Err(_) => self.call_generate_fallback(&base64_image).await,
                    }
                }
            },
            || self.drop_client(),
        )
        .await
    }
}
