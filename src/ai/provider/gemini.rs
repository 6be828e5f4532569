//! Gemini API Provider
//!
//! LLM provider using the Gemini `generateContent` API with structured
//! output (`response_schema`) and optional search/url-context grounding
//! tools. Returns LlmResponse with token usage metrics.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{
    LlmProvider, LlmResponse, ProviderConfig, ResponseMetadata, ResponseTiming, TokenUsage,
    ToolOptions,
};
use crate::ai::validation::parse_structured;
use crate::types::{ErrorClassifier, ForgeError, Result};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Gemini API provider with secure API key handling
pub struct GeminiProvider {
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
    max_output_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key_str = config
            .api_key
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .ok_or_else(|| {
                ForgeError::Config(
                    "Gemini API key not found. Set GEMINI_API_KEY env var or provide in config"
                        .to_string(),
                )
            })?;

        let api_base = config
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let model = config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(
                crate::constants::network::CONNECTION_TIMEOUT_SECS,
            ))
            .build()
            .map_err(|e| ForgeError::LlmApi(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: SecretString::from(api_key_str),
            api_base,
            model,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            client,
        })
    }

    fn build_request(&self, prompt: &str, schema: &Value, tools: ToolOptions) -> GenerateRequest {
        let mut generation_config = GenerationConfig {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            response_mime_type: None,
            response_schema: None,
        };
        if !schema.is_null() {
            generation_config.response_mime_type = Some("application/json".to_string());
            generation_config.response_schema = Some(schema.clone());
        }

        let mut declared_tools = Vec::new();
        if tools.search {
            declared_tools.push(ToolDeclaration {
                google_search: Some(Value::Object(Default::default())),
                url_context: None,
            });
        }
        if tools.url_context {
            declared_tools.push(ToolDeclaration {
                google_search: None,
                url_context: Some(Value::Object(Default::default())),
            });
        }

        GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config,
            tools: declared_tools,
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate(
        &self,
        prompt: &str,
        schema: &Value,
        tools: ToolOptions,
    ) -> Result<LlmResponse> {
        info!(
            model = %self.model,
            structured = !schema.is_null(),
            grounded = tools.any(),
            "Generating with Gemini"
        );

        let start_time = Instant::now();
        let request = self.build_request(prompt, schema, tools);
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);

        debug!("Sending request to Gemini API");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify(&e.to_string(), "gemini"))?;

        let elapsed = start_time.elapsed();

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(status, &body, "gemini").into());
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ForgeError::LlmApi(format!("Failed to parse Gemini response: {}", e)))?;

        let usage = body
            .usage_metadata
            .map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        let candidate = body
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ForgeError::LlmApi("No candidates in Gemini response".to_string()))?;

        let grounding_count = candidate
            .grounding_metadata
            .as_ref()
            .map(|g| g.grounding_chunks.len())
            .unwrap_or(0);

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
            .unwrap_or_default();
        if text.is_empty() {
            return Err(ForgeError::LlmApi("Empty content in Gemini response".to_string()));
        }

        let content = if schema.is_null() {
            Value::String(text)
        } else {
            debug!("Parsing structured Gemini output");
            let (value, repaired) = parse_structured(&text)?;
            if repaired {
                debug!("Structured output required JSON repair");
            }
            value
        };

        Ok(LlmResponse {
            content,
            usage,
            grounding_count,
            timing: ResponseTiming::from_duration(elapsed),
            metadata: ResponseMetadata {
                model: self.model.clone(),
                provider: "gemini".to_string(),
            },
        })
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDeclaration>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default = "default_role")]
    role: String,
    parts: Vec<Part>,
}

fn default_role() -> String {
    "model".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: usize,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(rename = "responseSchema", skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ToolDeclaration {
    #[serde(skip_serializing_if = "Option::is_none")]
    google_search: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url_context: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(rename = "groundingMetadata")]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize, Default)]
struct GroundingMetadata {
    #[serde(rename = "groundingChunks", default)]
    grounding_chunks: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u32,
}
