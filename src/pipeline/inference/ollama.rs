use std::time::Instant;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::types::{InferenceClient, InferenceRequest};
use super::InferenceError;
use crate::pipeline_config::PipelineConfig;

/// Ollama HTTP client for local vision inference.
///
/// Uses `/api/chat`: chat-template vision models (Gemma, LLaVA, Qwen-VL)
/// reject images on `/api/generate`.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl OllamaClient {
    /// Create a client pointing at an Ollama instance.
    ///
    /// No client-wide timeout is set: every request carries its own.
    pub fn new(base_url: &str) -> Result<Self, InferenceError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| InferenceError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Client for the endpoint named in the pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, InferenceError> {
        Self::new(&config.ollama_url)
    }

    /// Default Ollama instance at localhost:11434.
    pub fn default_local() -> Result<Self, InferenceError> {
        Self::new("http://localhost:11434")
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Request body for Ollama `/api/chat`.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    images: Vec<String>,
}

/// Deterministic extraction: catalog data must not vary between runs.
#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

/// Response body from Ollama `/api/chat` (non-streaming).
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

fn build_chat_request<'a>(request: &InferenceRequest<'a>) -> ChatRequest<'a> {
    let image = base64::engine::general_purpose::STANDARD.encode(request.image);
    ChatRequest {
        model: request.model_id,
        messages: vec![ChatMessage {
            role: "user",
            content: request.instruction,
            images: vec![image],
        }],
        stream: false,
        options: ChatOptions { temperature: 0.0 },
    }
}

impl InferenceClient for OllamaClient {
    fn generate(&self, request: &InferenceRequest<'_>) -> Result<String, InferenceError> {
        let _span = tracing::info_span!(
            "ollama_generate",
            model = %request.model_id,
            image_size = request.image.len(),
        )
        .entered();
        let start = Instant::now();

        let url = format!("{}/api/chat", self.base_url);
        let body = build_chat_request(request);

        let response = self
            .client
            .post(&url)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .map_err(|e| {
                InferenceError::from_transport(e, &self.base_url, request.timeout.as_secs())
            })?;

        if !response.status().is_success() {
            return Err(InferenceError::from_response(response));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| InferenceError::Envelope(e.to_string()))?;

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            response_len = parsed.message.content.len(),
            "Ollama inference complete"
        );

        Ok(parsed.message.content)
    }

    fn backend_name(&self) -> &'static str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn ollama_client_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn default_local_uses_standard_port() {
        let client = OllamaClient::default_local().unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.backend_name(), "ollama");
    }

    #[test]
    fn from_config_uses_configured_url() {
        let config = PipelineConfig {
            ollama_url: "http://gpu-box:11434/".into(),
            ..PipelineConfig::default()
        };
        let client = OllamaClient::from_config(&config).unwrap();
        assert_eq!(client.base_url(), "http://gpu-box:11434");
    }

    #[test]
    fn chat_request_carries_base64_image() {
        let request = InferenceRequest {
            model_id: "gemma3:4b",
            image: b"abc",
            mime_type: "image/png",
            instruction: "Describe",
            timeout: Duration::from_secs(5),
        };
        let json = serde_json::to_value(build_chat_request(&request)).unwrap();
        assert_eq!(json["model"], "gemma3:4b");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Describe");
        assert_eq!(json["messages"][0]["images"][0], "YWJj");
    }

    #[test]
    fn unreachable_server_is_connection_or_timeout() {
        // Port 9 (discard) is closed on test machines.
        let client = OllamaClient::new("http://127.0.0.1:9").unwrap();
        let request = InferenceRequest {
            model_id: "m",
            image: b"x",
            mime_type: "image/jpeg",
            instruction: "i",
            timeout: Duration::from_secs(2),
        };
        let err = client.generate(&request).unwrap_err();
        assert!(err.is_transient(), "expected transient error, got {err:?}");
    }
}
