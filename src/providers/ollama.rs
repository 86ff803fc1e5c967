/*!
 * Ollama provider.
 *
 * Sends one text per `/api/generate` request (non-streaming) with a system
 * prompt describing the language pair. HTTP and transport failures are
 * mapped onto `ProviderError` so the retry controller can classify them.
 */

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::ProviderError;
use crate::language_utils::language_display_name;
use crate::providers::{TranslationRequest, Translator};

// @const: Default Ollama port when the endpoint omits one
const DEFAULT_PORT: u16 = 11434;

/// Generate request for the Ollama API
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    /// Model name to use for generation
    pub model: String,
    /// Prompt to generate from
    pub prompt: String,
    /// System message to guide the model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerationOptions>,
    /// Whether to stream the response
    pub stream: bool,
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerationOptions {
    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Generation response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Model name
    #[serde(default)]
    pub model: String,
    /// Generated text
    pub response: String,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
}

/// Ollama client for one-text-per-call translation
#[derive(Debug, Clone)]
pub struct OllamaTranslator {
    /// Base URL of the Ollama API, without trailing slash
    base_url: String,
    /// Model name
    model: String,
    /// System prompt template; `{source}` and `{target}` are substituted
    system_prompt: String,
    /// HTTP client for making requests
    client: Client,
}

impl OllamaTranslator {
    /// Create a client for `endpoint` (`host`, `host:port` or a full URL)
    pub fn new(endpoint: &str, model: impl Into<String>, system_prompt: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = normalize_endpoint(endpoint)?;
        let client = Client::builder()
            .timeout(timeout)
            // Ollama speaks HTTP/1.1
            .http1_only()
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url,
            model: model.into(),
            system_prompt: system_prompt.into(),
            client,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the generate request for one text
    pub fn build_request(&self, request: &TranslationRequest) -> GenerationRequest {
        let source = if request.source_language.eq_ignore_ascii_case("auto") {
            "the source language".to_string()
        } else {
            language_display_name(&request.source_language)
        };
        let target = language_display_name(&request.target_language);

        let system = self.system_prompt.replace("{source}", &source).replace("{target}", &target);

        GenerationRequest {
            model: self.model.clone(),
            prompt: request.text.clone(),
            system: Some(system),
            options: Some(GenerationOptions { temperature: Some(0.2) }),
            stream: false,
        }
    }
}

#[async_trait]
impl Translator for OllamaTranslator {
    async fn translate(&self, request: &TranslationRequest) -> Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = self.build_request(request);

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else if e.is_connect() {
                ProviderError::ConnectionError(e.to_string())
            } else {
                ProviderError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("Ollama API returned {}: {}", status, truncate_for_log(&message));
            return Err(classify_status(status, message));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to read response body: {}", e)))?;

        let generated: GenerationResponse = serde_json::from_str(&response_text).map_err(|e| {
            error!("Failed to parse Ollama API response: {}. Raw response: {}", e, truncate_for_log(&response_text));
            ProviderError::ParseError(e.to_string())
        })?;

        let text = generated.response.trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::ParseError("empty response".to_string()));
        }

        debug!("Ollama ({}) translated {} chars", generated.model, request.text.chars().count());
        Ok(text)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Map a non-success HTTP status onto a provider error
pub fn classify_status(status: StatusCode, message: String) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthenticationError(message),
        _ => ProviderError::ApiError {
            status_code: status.as_u16(),
            message,
        },
    }
}

/// Turn `host`, `host:port` or a URL into a base URL with scheme and port
fn normalize_endpoint(endpoint: &str) -> Result<String> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.is_empty() {
        return Err(anyhow!("Endpoint cannot be empty"));
    }

    let url_str = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };

    let url = Url::parse(&url_str).context(format!("Failed to parse endpoint URL: {}", endpoint))?;
    let host = url.host_str().ok_or_else(|| anyhow!("Invalid host in endpoint: {}", endpoint))?;
    let port = url.port().unwrap_or(DEFAULT_PORT);

    Ok(format!("{}://{}:{}", url.scheme(), host, port))
}

fn truncate_for_log(text: &str) -> String {
    if text.chars().count() > 500 {
        text.chars().take(500).collect()
    } else {
        text.to_string()
    }
}
