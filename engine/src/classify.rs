//! Document classification boundary.
//!
//! The engine does not care how a name suggestion is produced; it talks to a
//! [`Classifier`]. The production implementation, [`ClaudeClient`], sends the
//! PDF bytes together with a deterministic prompt to the Anthropic Messages
//! API in a single request and returns the model's text answer. Tests
//! substitute stub classifiers.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::sanitize::FALLBACK_NAME;
use crate::types::FolderConfig;

/// Default API endpoint; overridable for tests and proxies.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// API version header required by the Messages API.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Token budget for a name suggestion.
const SUGGEST_MAX_TOKENS: u32 = 128;

/// Token budget for the connection check.
const PING_MAX_TOKENS: u32 = 16;

/// HTTP request timeout. Document uploads can be slow on large scans.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Errors from the classification boundary.
#[derive(Error, Debug)]
pub enum ClassifyError {
    /// Network-level failure (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The service answered 2xx but the body was not the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The document could not be read from disk.
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

/// A pluggable document classification service.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Proposes a document name for the PDF at `path`.
    ///
    /// Returns the raw text suggestion; sanitation happens downstream. An
    /// empty answer from the service is mapped to the fallback label rather
    /// than an error.
    async fn suggest_name(
        &self,
        path: &Path,
        folder: &FolderConfig,
    ) -> Result<String, ClassifyError>;

    /// Verifies the service accepts this client's credentials.
    async fn test_connection(&self) -> Result<(), ClassifyError>;
}

/// Classification client for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl ClaudeClient {
    /// Creates a client for the given API key and model identifier.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Posts a Messages API request and checks the response status.
    async fn post_messages(&self, body: serde_json::Value) -> Result<String, ClassifyError> {
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl Classifier for ClaudeClient {
    async fn suggest_name(
        &self,
        path: &Path,
        folder: &FolderConfig,
    ) -> Result<String, ClassifyError> {
        let document = tokio::fs::read(path).await?;
        let prompt = build_prompt(folder);

        debug!(
            path = %path.display(),
            bytes = document.len(),
            model = %self.model,
            "requesting document name"
        );

        let body = json!({
            "model": self.model,
            "max_tokens": SUGGEST_MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "document",
                        "source": {
                            "type": "base64",
                            "media_type": "application/pdf",
                            "data": BASE64.encode(&document),
                        },
                    },
                    { "type": "text", "text": prompt },
                ],
            }],
        });

        let raw = self.post_messages(body).await?;
        let parsed: MessagesResponse = serde_json::from_str(&raw)
            .map_err(|e| ClassifyError::MalformedResponse(e.to_string()))?;

        let answer = parsed
            .content
            .iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text.trim())
            .unwrap_or("");

        if answer.is_empty() {
            return Ok(FALLBACK_NAME.to_string());
        }
        Ok(answer.to_string())
    }

    async fn test_connection(&self) -> Result<(), ClassifyError> {
        let body = json!({
            "model": self.model,
            "max_tokens": PING_MAX_TOKENS,
            "messages": [{ "role": "user", "content": "ping" }],
        });

        self.post_messages(body).await?;
        Ok(())
    }
}

/// Response body of the Messages API, reduced to what the engine reads.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Builds the classification prompt for a folder.
///
/// The base instruction is fixed; `include_names` and a non-empty custom
/// prompt append further instructions. Deterministic for a given config.
fn build_prompt(folder: &FolderConfig) -> String {
    let mut lines = vec![
        "このPDF文書を分析して、適切なファイル名を1つだけ返してください。".to_string(),
        String::new(),
        "ルール:".to_string(),
        "- 文書の種類名やタイトルを短く簡潔に返す（名詞句のみ）".to_string(),
        "- 句読点、説明文、余計な装飾は不要".to_string(),
        "- ファイル名に使えない記号 / \\ : * ? \" < > | は使わない".to_string(),
        "- 日本語の文書なら日本語で返す".to_string(),
        "- 8〜30文字程度が理想".to_string(),
        String::new(),
        "例: 見積書 / 契約書 / 登記事項証明書 / 取締役会議事録 / 確定申告書".to_string(),
    ];

    if folder.include_names {
        lines.push(String::new());
        lines.push(
            "追加指示: 文書に記載の会社名または個人名があれば、種類名の後に「_会社名」または「_氏名」の形で付加してください。"
                .to_string(),
        );
        lines.push("例: 見積書_株式会社ABC / 契約書_田中太郎".to_string());
    }

    if !folder.custom_prompt.trim().is_empty() {
        lines.push(String::new());
        lines.push("ユーザーからの追加指示:".to_string());
        lines.push(folder.custom_prompt.clone());
    }

    lines.join("\n")
}
