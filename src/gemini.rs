//! Gemini REST backend.
//!
//! Implements both [`IndexService`] (file-search stores) and
//! [`GenerativeModel`] (`generateContent`) over blocking HTTP. The API key
//! is read from the environment variable named by `remote.api_key_env`.
//!
//! # Retry Strategy
//!
//! - HTTP 429 and 5xx → retry with exponential backoff
//! - other 4xx → fail immediately
//! - network errors → retry
//! - backoff: 1s, 2s, 4s, … capped at 32s

use anyhow::{bail, Context, Result};
use base64::Engine;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

use crate::config::RemoteConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::remote::{
    mime_for_path, GenerateRequest, GenerateResponse, GenerativeModel, IndexService,
};

const API_VERSION: &str = "v1beta";
const OPERATION_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
    max_polls: u64,
}

impl GeminiClient {
    /// Build a client from config.
    ///
    /// # Errors
    ///
    /// [`HarnessError::NotConfigured`] if the API key variable is unset or
    /// empty; [`HarnessError::TransientIo`] if the HTTP client cannot be
    /// built.
    pub fn new(config: &RemoteConfig) -> HarnessResult<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                HarnessError::NotConfigured(format!(
                    "{} environment variable not set",
                    config.api_key_env
                ))
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(HarnessError::transient)?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            max_polls: (config.timeout_secs / OPERATION_POLL_INTERVAL.as_secs()).max(1),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_VERSION, path)
    }

    fn upload_url(&self, path: &str) -> String {
        format!("{}/upload/{}/{}", self.base_url, API_VERSION, path)
    }

    /// Send a request built by `build`, retrying transient failures.
    fn send_json(&self, what: &str, build: impl Fn() -> RequestBuilder) -> Result<Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(what, attempt, delay_secs = delay.as_secs(), "retrying");
                std::thread::sleep(delay);
            }

            match build().header("x-goog-api-key", &self.api_key).send() {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json::<Value>()
                            .with_context(|| format!("Invalid JSON from Gemini {}", what));
                    }

                    let body_text = response.text().unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow::anyhow!(
                            "Gemini {} error {}: {}",
                            what,
                            status,
                            body_text
                        ));
                        continue;
                    }

                    bail!("Gemini {} error {}: {}", what, status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow::anyhow!("Gemini {} request failed: {}", what, e));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Gemini {} failed after retries", what)))
    }

    /// Poll a long-running operation until it reports `done`.
    fn wait_for_operation(&self, operation: Value) -> Result<()> {
        let mut current = operation;
        for _ in 0..self.max_polls {
            if let Some(err) = current.get("error") {
                bail!("Gemini operation failed: {}", err);
            }
            if current.get("done").and_then(Value::as_bool).unwrap_or(false) {
                return Ok(());
            }
            let name = match current.get("name").and_then(Value::as_str) {
                Some(name) => name.to_string(),
                // Nothing to poll: the upload response was final.
                None => return Ok(()),
            };
            std::thread::sleep(OPERATION_POLL_INTERVAL);
            current = self.send_json("operation", || self.client.get(self.url(&name)))?;
        }
        bail!("Gemini operation did not finish in time")
    }
}

impl IndexService for GeminiClient {
    fn create_index(&self) -> Result<String> {
        let body = json!({ "displayName": "advisory-harness" });
        let resp = self.send_json("create store", || {
            self.client.post(self.url("fileSearchStores")).json(&body)
        })?;
        resp.get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing store name"))
    }

    fn upload_document(&self, index_id: &str, path: &Path) -> Result<()> {
        let data =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let mime = mime_for_path(path);
        let url = self.upload_url(&format!("{}:uploadToFileSearchStore", index_id));

        let operation = self.send_json("upload", || {
            self.client
                .post(&url)
                .query(&[("uploadType", "media")])
                .header("Content-Type", mime)
                .body(data.clone())
        })?;
        self.wait_for_operation(operation)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

impl GenerativeModel for GeminiClient {
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let body = build_generate_body(request);
        let url = self.url(&format!("models/{}:generateContent", request.model));
        let resp = self.send_json("generate", || self.client.post(&url).json(&body))?;
        parse_generate_response(&resp)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// JSON body for `models/{model}:generateContent`.
pub(crate) fn build_generate_body(request: &GenerateRequest) -> Value {
    let engine = base64::engine::general_purpose::STANDARD;

    let mut parts = vec![json!({ "text": request.prompt })];
    for attachment in &request.attachments {
        parts.push(json!({
            "inlineData": {
                "mimeType": attachment.mime_type,
                "data": engine.encode(&attachment.data),
            }
        }));
    }

    let mut body = json!({
        "contents": [{ "role": "user", "parts": parts }],
    });

    let mut tools = Vec::new();
    if request.search_grounding {
        tools.push(json!({ "googleSearch": {} }));
    }
    if !tools.is_empty() {
        body["tools"] = Value::Array(tools);
    }

    if let Some(image) = &request.image_config {
        body["generationConfig"] = json!({
            "responseModalities": ["TEXT", "IMAGE"],
            "imageConfig": {
                "aspectRatio": image.aspect_ratio,
                "imageSize": image.image_size,
            }
        });
    }

    body
}

/// Collect text parts and the first inline image from the first candidate.
pub(crate) fn parse_generate_response(json: &Value) -> Result<GenerateResponse> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array);

    let parts = match parts {
        Some(parts) => parts,
        None => return Ok(GenerateResponse::default()),
    };

    let mut text = String::new();
    let mut image = None;
    for part in parts {
        if let Some(t) = part.get("text").and_then(Value::as_str) {
            text.push_str(t);
        }
        if image.is_none() {
            if let Some(data) = part.pointer("/inlineData/data").and_then(Value::as_str) {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(data)
                    .context("Invalid base64 image data in Gemini response")?;
                image = Some(bytes);
            }
        }
    }

    Ok(GenerateResponse {
        text: (!text.is_empty()).then_some(text),
        image,
    })
}
