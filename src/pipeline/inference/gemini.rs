use std::fmt;
use std::time::Instant;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::types::{InferenceClient, InferenceRequest};
use super::InferenceError;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables checked (in order) for the API key.
const API_KEY_VARS: &[&str] = &["METATA_GEMINI_API_KEY", "GEMINI_API_KEY"];

/// Hosted Gemini client (`models/{model}:generateContent`).
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

// Hand-written so the API key never reaches logs.
impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Result<Self, InferenceError> {
        Self::with_base_url(GEMINI_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: &str) -> Result<Self, InferenceError> {
        if api_key.trim().is_empty() {
            return Err(InferenceError::missing_credentials("Gemini API key is empty"));
        }
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| InferenceError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            client,
        })
    }

    /// Build from `METATA_GEMINI_API_KEY` or `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self, InferenceError> {
        let key = API_KEY_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok())
            .ok_or_else(|| {
                InferenceError::missing_credentials(
                    "Neither METATA_GEMINI_API_KEY nor GEMINI_API_KEY is set",
                )
            })?;
        Self::new(&key)
    }

    fn endpoint(&self, model_id: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model_id)
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Image { inline_data: InlineData<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Image part first, instruction second, matching the hosted SDK ordering.
fn build_request<'a>(request: &InferenceRequest<'a>) -> GenerateContentRequest<'a> {
    let data = base64::engine::general_purpose::STANDARD.encode(request.image);
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![
                Part::Image {
                    inline_data: InlineData {
                        mime_type: request.mime_type,
                        data,
                    },
                },
                Part::Text {
                    text: request.instruction,
                },
            ],
        }],
        generation_config: GenerationConfig { temperature: 0.0 },
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(response: GenerateContentResponse) -> Result<String, InferenceError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| InferenceError::Envelope("No candidates in response".into()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(InferenceError::Envelope("Candidate has no text parts".into()));
    }
    Ok(text)
}

impl InferenceClient for GeminiClient {
    fn generate(&self, request: &InferenceRequest<'_>) -> Result<String, InferenceError> {
        let _span = tracing::info_span!(
            "gemini_generate",
            model = %request.model_id,
            image_size = request.image.len(),
        )
        .entered();
        let start = Instant::now();

        let response = self
            .client
            .post(self.endpoint(request.model_id))
            .header("x-goog-api-key", &self.api_key)
            .timeout(request.timeout)
            .json(&build_request(request))
            .send()
            .map_err(|e| {
                InferenceError::from_transport(e, &self.base_url, request.timeout.as_secs())
            })?;

        if !response.status().is_success() {
            return Err(InferenceError::from_response(response));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .map_err(|e| InferenceError::Envelope(e.to_string()))?;
        let text = response_text(parsed)?;

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            response_len = text.len(),
            "Gemini inference complete"
        );
        Ok(text)
    }

    fn backend_name(&self) -> &'static str {
        "gemini"
    }
}
