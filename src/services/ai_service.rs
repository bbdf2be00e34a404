use std::time::Duration;

use super::anthropic::AnthropicClient;
use super::catalog::{ModelConfig, ProviderKind};
use super::error::ProviderError;
use super::gemini::GeminiClient;
use super::openai::OpenAiClient;
use crate::models::ImagePayload;

/// Instruction sent verbatim to every provider alongside the photo.
pub const ANALYSIS_PROMPT: &str = "Analyze this food image. Respond with ONLY a valid JSON object, nothing else. Use this exact format:\n\n\
{\"name\":\"description of meal\",\"items\":[\"food1\",\"food2\"],\"itemDetails\":[{\"name\":\"food1\",\"quantity_g\":150},{\"name\":\"food2\",\"quantity_g\":80}],\"calories\":400,\"protein\":30,\"carbs\":45,\"fat\":18,\"fiber\":6}\n\n\
All numbers must be integers. No text before or after the JSON.";

/// Token cap for a single analysis reply.
pub const MAX_RESPONSE_TOKENS: u32 = 1000;

/// Send a meal photo to a vision model and get its raw text reply.
#[async_trait::async_trait]
pub trait VisionService: Send + Sync {
    async fn analyze_image(
        &self,
        model: &ModelConfig,
        api_key: &str,
        image: &ImagePayload,
    ) -> Result<String, ProviderError>;
}

/// Base URLs for each provider. Overridable so tests can point at a mock server.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub anthropic: String,
    pub openai: String,
    pub gemini: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            anthropic: "https://api.anthropic.com".to_string(),
            openai: "https://api.openai.com".to_string(),
            gemini: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

/// Dispatches analysis requests to the right provider client.
pub struct ProviderClient {
    anthropic: AnthropicClient,
    openai: OpenAiClient,
    gemini: GeminiClient,
}

impl ProviderClient {
    pub fn new(client: reqwest::Client, endpoints: ProviderEndpoints) -> Self {
        Self {
            anthropic: AnthropicClient::new(client.clone(), endpoints.anthropic),
            openai: OpenAiClient::new(client.clone(), endpoints.openai),
            gemini: GeminiClient::new(client, endpoints.gemini),
        }
    }
}

#[async_trait::async_trait]
impl VisionService for ProviderClient {
    async fn analyze_image(
        &self,
        model: &ModelConfig,
        api_key: &str,
        image: &ImagePayload,
    ) -> Result<String, ProviderError> {
        log::info!("🤖 Sending meal photo to {} ({})", model.provider, model.model);

        match model.provider {
            ProviderKind::Anthropic => {
                self.anthropic
                    .analyze(api_key, model.model, image.base64_data())
                    .await
            }
            ProviderKind::OpenAi => {
                self.openai
                    .analyze(api_key, model.model, &image.data_url())
                    .await
            }
            ProviderKind::Gemini => {
                self.gemini
                    .analyze(api_key, model.model, image.base64_data())
                    .await
            }
        }
    }
}

/// Shared outbound HTTP client with a bounded timeout.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}
