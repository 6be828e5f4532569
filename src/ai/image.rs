//! Image Generation
//!
//! Optional hero/mid/bottom article imagery. Every failure here is
//! non-fatal by contract; the pipeline degrades to a text-only article.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::provider::ProviderConfig;
use crate::types::{ForgeError, Result};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// A generated image ready to persist
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl GeneratedImage {
    /// File extension matching the mime type
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &str, aspect_ratio: &str) -> Result<GeneratedImage>;
}

/// Gemini image-model generator
pub struct GeminiImageGenerator {
    api_key: SecretString,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiImageGenerator {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_key_str = config
            .api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .ok_or_else(|| {
                ForgeError::Config("Gemini API key not found for image generation".to_string())
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ForgeError::LlmApi(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: SecretString::from(api_key_str),
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: DEFAULT_IMAGE_MODEL.to_string(),
            client,
        })
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageGenerator {
    async fn generate_image(&self, prompt: &str, aspect_ratio: &str) -> Result<GeneratedImage> {
        debug!(model = %self.model, aspect_ratio, "Generating image");

        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let request = ImageRequest {
            contents: vec![ImageContent {
                parts: vec![ImagePart {
                    text: Some(format!("{} (aspect ratio {})", prompt, aspect_ratio)),
                    inline_data: None,
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ForgeError::LlmApi(format!(
                "Image API error ({}): {}",
                status, body
            )));
        }

        let body: ImageResponse = response
            .json()
            .await
            .map_err(|e| ForgeError::LlmApi(format!("Failed to parse image response: {}", e)))?;

        let inline = body
            .candidates
            .into_iter()
            .flat_map(|c| c.content.map(|c| c.parts).unwrap_or_default())
            .find_map(|p| p.inline_data)
            .ok_or_else(|| ForgeError::LlmApi("No image data in response".to_string()))?;

        let bytes = BASE64
            .decode(inline.data.as_bytes())
            .map_err(|e| ForgeError::LlmApi(format!("Invalid image payload: {}", e)))?;

        Ok(GeneratedImage {
            bytes,
            mime_type: inline.mime_type,
        })
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ImageRequest {
    contents: Vec<ImageContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageContent {
    parts: Vec<ImagePart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ImagePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType", default)]
    mime_type: String,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    candidates: Vec<ImageCandidate>,
}

#[derive(Debug, Deserialize)]
struct ImageCandidate {
    content: Option<ImageContent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_from_mime() {
        let png = GeneratedImage {
            bytes: vec![],
            mime_type: "image/png".into(),
        };
        assert_eq!(png.extension(), "png");
        let jpg = GeneratedImage {
            bytes: vec![],
            mime_type: "image/jpeg".into(),
        };
        assert_eq!(jpg.extension(), "jpg");
    }
}
