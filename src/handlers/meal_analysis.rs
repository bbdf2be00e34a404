use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::config::SecretStore;
use crate::models::{ImagePayload, NutritionEstimate};
use crate::services::error::{ParseError, ProviderError};
use crate::services::nutrition_parser::parse_nutrition_response;
use crate::services::{ModelCatalog, VisionService};

/// Body of `POST /api/analyze-meal`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyzeMealRequest {
    pub image_data: Option<String>,
    pub model: Option<String>,
}

impl AnalyzeMealRequest {
    /// Pull the known fields out of a JSON body. Fields of the wrong type are
    /// treated as missing.
    pub fn from_json(body: &Value) -> Self {
        let text = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Self {
            image_data: text("imageData"),
            model: text("model"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("No image data provided")]
    MissingImage,

    #[error("{0} not configured")]
    MissingCredential(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Turns a meal photo into a nutrition estimate.
pub struct MealAnalysisHandler {
    catalog: Arc<ModelCatalog>,
    secrets: Arc<dyn SecretStore>,
    vision: Arc<dyn VisionService>,
}

impl MealAnalysisHandler {
    pub fn new(
        catalog: Arc<ModelCatalog>,
        secrets: Arc<dyn SecretStore>,
        vision: Arc<dyn VisionService>,
    ) -> Self {
        Self {
            catalog,
            secrets,
            vision,
        }
    }

    pub async fn analyze(&self, request: AnalyzeMealRequest) -> Result<NutritionEstimate, AnalysisError> {
        let image = request
            .image_data
            .map(ImagePayload::new)
            .ok_or(AnalysisError::MissingImage)?;

        let model = self.catalog.resolve(request.model.as_deref());
        if request.model.as_deref() != Some(model.id) {
            log::debug!("🔀 Requested model {:?} resolved to {}", request.model, model.id);
        }

        let api_key = self.secrets.first_of(model.credential_keys).ok_or_else(|| {
            let label = model.credential_label();
            log::error!("❌ {} not configured", label);
            AnalysisError::MissingCredential(label)
        })?;

        log::info!(
            "📸 Analyzing meal photo with {} ({} bytes)",
            model.id,
            image.encoded_len()
        );

        let response_text = self.vision.analyze_image(model, &api_key, &image).await?;
        log::debug!("💬 Model reply: {}", response_text);

        let estimate = parse_nutrition_response(&response_text)?;
        log::info!("✅ Meal analyzed: {} ({} kcal)", estimate.name, estimate.calories);

        Ok(estimate)
    }
}
