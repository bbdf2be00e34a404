use serde::{Deserialize, Serialize};

use super::ai_service::{ANALYSIS_PROMPT, MAX_RESPONSE_TOKENS};
use super::error::ProviderError;

const PROVIDER: &str = "Anthropic";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: &'static str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic Messages API client
pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Send base64 JPEG data plus the analysis prompt, return the first text block.
    pub async fn analyze(
        &self,
        api_key: &str,
        model: &str,
        base64_data: &str,
    ) -> Result<String, ProviderError> {
        let request = MessagesRequest {
            model,
            max_tokens: MAX_RESPONSE_TOKENS,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            source_type: "base64",
                            media_type: "image/jpeg",
                            data: base64_data,
                        },
                    },
                    ContentBlock::Text {
                        text: ANALYSIS_PROMPT,
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        let status = response.status();
        log::debug!("📥 Anthropic response status: {}", status);

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        if !status.is_success() {
            log::error!("❌ Anthropic API error ({}): {}", status, body);
            return Err(ProviderError::status(PROVIDER, status, &body));
        }

        extract_text(&body)
    }
}

fn extract_text(body: &str) -> Result<String, ProviderError> {
    let parsed: MessagesResponse = serde_json::from_str(body).map_err(|source| ProviderError::Decode {
        provider: PROVIDER,
        source,
    })?;

    Ok(parsed
        .content
        .into_iter()
        .find(|block| block.block_type == "text")
        .and_then(|block| block.text)
        .unwrap_or_default())
}
