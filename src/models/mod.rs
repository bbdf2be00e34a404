use serde::{Deserialize, Serialize, Serializer};

pub const UNKNOWN_MEAL: &str = "Unknown meal";

/// Nutrition estimate returned to the client for a single photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutritionEstimate {
    pub name: String,
    pub items: Vec<String>,
    #[serde(rename = "itemDetails", skip_serializing_if = "Option::is_none")]
    pub item_details: Option<Vec<ItemDetail>>,
    #[serde(serialize_with = "serialize_number")]
    pub calories: f64,
    #[serde(serialize_with = "serialize_number")]
    pub protein: f64,
    #[serde(serialize_with = "serialize_number")]
    pub carbs: f64,
    #[serde(serialize_with = "serialize_number")]
    pub fat: f64,
    #[serde(serialize_with = "serialize_number")]
    pub fiber: f64,
}

impl Default for NutritionEstimate {
    fn default() -> Self {
        Self {
            name: UNKNOWN_MEAL.to_string(),
            items: Vec::new(),
            item_details: None,
            calories: 0.0,
            protein: 0.0,
            carbs: 0.0,
            fat: 0.0,
            fiber: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetail {
    pub name: String,
    pub quantity_g: u64,
}

/// Whole numbers go out as JSON integers (`150`, not `150.0`).
fn serialize_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// Image payload as sent by the browser: either a data URL or bare base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    raw: String,
}

impl ImagePayload {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The payload with any `data:image/<subtype>;base64,` prefix removed.
    pub fn base64_data(&self) -> &str {
        strip_data_url_prefix(&self.raw)
    }

    /// The payload as a URL. Data URLs pass through untouched, bare base64
    /// is wrapped as JPEG.
    pub fn data_url(&self) -> String {
        if self.raw.starts_with("data:") {
            self.raw.clone()
        } else {
            format!("data:image/jpeg;base64,{}", self.raw)
        }
    }

    /// Size of the payload as received, in bytes.
    pub fn encoded_len(&self) -> usize {
        self.raw.len()
    }
}

fn strip_data_url_prefix(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix("data:image/") else {
        return raw;
    };
    let Some(marker) = rest.find(";base64,") else {
        return raw;
    };

    let subtype = &rest[..marker];
    if subtype.is_empty() || !subtype.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return raw;
    }

    &rest[marker + ";base64,".len()..]
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// One recipient that could not be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedInvite {
    pub email: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InviteReport {
    pub sent: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FailedInvite>,
}

impl InviteReport {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}
