use serde::{Deserialize, Serialize};

use super::ai_service::ANALYSIS_PROMPT;
use super::error::ProviderError;

const PROVIDER: &str = "Gemini";

/// Fallback candidates, most preferred first.
pub const FALLBACK_PREFERENCE: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
    "gemini-1.5-flash",
    "gemini-1.5-flash-8b",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'static str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ListedModel>,
}

/// A model entry from the model listing endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedModel {
    pub name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ListedModel {
    /// Model id without the `models/` resource prefix.
    pub fn id(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }

    pub fn supports_generation(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }
}

/// Pick a replacement for a model that came back 404.
///
/// Only models that support content generation and differ from `failed` are
/// considered. The first hit in [`FALLBACK_PREFERENCE`] wins, then any
/// "flash" model, then whatever is listed first.
pub fn select_fallback_model(models: &[ListedModel], failed: &str) -> Option<String> {
    let candidates: Vec<&str> = models
        .iter()
        .filter(|m| m.supports_generation())
        .map(ListedModel::id)
        .filter(|id| *id != failed)
        .collect();

    FALLBACK_PREFERENCE
        .iter()
        .find(|preferred| candidates.contains(preferred))
        .copied()
        .or_else(|| candidates.iter().find(|id| id.contains("flash")).copied())
        .or_else(|| candidates.first().copied())
        .map(str::to_string)
}

/// Progress of one analysis request. Retry is terminal, so a request makes at
/// most one listing call and one extra generation call.
#[derive(Debug)]
enum Attempt {
    Primary,
    Discover { failure: ProviderError },
    Retry { model: String },
}

/// Gemini generateContent client with retired-model fallback
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub async fn analyze(
        &self,
        api_key: &str,
        model: &str,
        base64_data: &str,
    ) -> Result<String, ProviderError> {
        let mut attempt = Attempt::Primary;

        loop {
            attempt = match attempt {
                Attempt::Primary => match self.generate(api_key, model, base64_data).await {
                    Err(failure) if failure.is_not_found() => {
                        log::warn!("⚠️ Gemini model {} not found, looking for a fallback", model);
                        Attempt::Discover { failure }
                    }
                    result => return result,
                },
                Attempt::Discover { failure } => match self.discover_fallback(api_key, model).await {
                    Some(fallback) => Attempt::Retry { model: fallback },
                    None => return Err(failure),
                },
                Attempt::Retry { model: fallback } => {
                    log::info!("🔁 Retrying Gemini analysis with {}", fallback);
                    return self.generate(api_key, &fallback, base64_data).await;
                }
            };
        }
    }

    async fn generate(
        &self,
        api_key: &str,
        model: &str,
        base64_data: &str,
    ) -> Result<String, ProviderError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: ANALYSIS_PROMPT,
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg",
                            data: base64_data,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig { temperature: 0.0 },
        };

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, model
            ))
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        let status = response.status();
        log::debug!("📥 Gemini response status for {}: {}", model, status);

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        if !status.is_success() {
            log::error!("❌ Gemini API error ({}): {}", status, body);
            return Err(ProviderError::status(PROVIDER, status, &body));
        }

        extract_text(&body)
    }

    /// List models visible to this key and choose a fallback. Listing
    /// failures are logged and treated as "no fallback".
    async fn discover_fallback(&self, api_key: &str, failed: &str) -> Option<String> {
        let models = match self.list_models(api_key).await {
            Ok(models) => models,
            Err(e) => {
                log::warn!("⚠️ Could not list Gemini models: {}", e);
                return None;
            }
        };

        let selected = select_fallback_model(&models, failed);
        match &selected {
            Some(model) => log::info!("✅ Gemini fallback model selected: {}", model),
            None => log::warn!("⚠️ No Gemini model available for fallback ({} listed)", models.len()),
        }
        selected
    }

    pub async fn list_models(&self, api_key: &str) -> Result<Vec<ListedModel>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1beta/models", self.base_url))
            .query(&[("pageSize", "1000")])
            .header("x-goog-api-key", api_key)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        if !status.is_success() {
            return Err(ProviderError::status(PROVIDER, status, &body));
        }

        let parsed: ListModelsResponse =
            serde_json::from_str(&body).map_err(|source| ProviderError::Decode {
                provider: PROVIDER,
                source,
            })?;
        Ok(parsed.models)
    }
}

fn extract_text(body: &str) -> Result<String, ProviderError> {
    let parsed: GenerateResponse = serde_json::from_str(body).map_err(|source| ProviderError::Decode {
        provider: PROVIDER,
        source,
    })?;

    Ok(parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
        .unwrap_or_default())
}
