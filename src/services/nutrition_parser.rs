use serde_json::{Map, Value};

use super::error::ParseError;
use crate::models::{ItemDetail, NutritionEstimate, UNKNOWN_MEAL};

/// Parse a model reply into a nutrition estimate.
///
/// The reply may wrap the JSON object in prose or a markdown fence. Only a
/// reply with no `{ ... }` span, or one whose span is not valid JSON, is an
/// error; every field of a parseable object degrades to its default.
pub fn parse_nutrition_response(response: &str) -> Result<NutritionEstimate, ParseError> {
    let cleaned = strip_code_fence(response.trim());

    let start = cleaned.find('{').ok_or(ParseError::NoJsonBoundaries)?;
    let end = cleaned.rfind('}').ok_or(ParseError::NoJsonBoundaries)?;
    if end < start {
        return Err(ParseError::NoJsonBoundaries);
    }

    let value: Value = serde_json::from_str(&cleaned[start..=end])?;
    let empty = Map::new();
    let data = value.as_object().unwrap_or(&empty);

    let item_details = data
        .get("itemDetails")
        .or_else(|| data.get("item_details"))
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(item_detail).collect::<Vec<_>>());

    let items = match data.get("items") {
        Some(Value::Array(items)) => items.iter().filter_map(item_name).collect(),
        Some(_) => Vec::new(),
        None => item_details
            .as_ref()
            .map(|details| details.iter().map(|d| d.name.clone()).collect())
            .unwrap_or_default(),
    };

    let name = data
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(UNKNOWN_MEAL)
        .to_string();

    Ok(NutritionEstimate {
        name,
        items,
        item_details,
        calories: number_field(data, "calories"),
        protein: number_field(data, "protein"),
        carbs: number_field(data, "carbs"),
        fat: number_field(data, "fat"),
        fiber: number_field(data, "fiber"),
    })
}

fn strip_code_fence(text: &str) -> &str {
    let mut text = text;

    if let Some(head) = text.get(..7) {
        if head.eq_ignore_ascii_case("```json") {
            text = text[7..].trim_start();
        }
    }
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim_start();
    }

    let trimmed = text.trim_end();
    trimmed.strip_suffix("```").unwrap_or(trimmed)
}

fn number_field(data: &Map<String, Value>, key: &str) -> f64 {
    data.get(key).map(coerce_number).unwrap_or(0.0)
}

/// Loose numeric coercion: anything that does not read as a finite number is 0.
pub fn coerce_number(value: &Value) -> f64 {
    let number = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().unwrap_or(0.0)
            }
        }
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };

    if number.is_finite() {
        number
    } else {
        0.0
    }
}

fn item_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn item_detail(value: &Value) -> Option<ItemDetail> {
    let entry = value.as_object()?;
    let name = entry.get("name").and_then(Value::as_str)?.trim();
    if name.is_empty() {
        return None;
    }

    let quantity = entry.get("quantity_g").map(coerce_number).unwrap_or(0.0);

    Some(ItemDetail {
        name: name.to_string(),
        quantity_g: quantity.round().max(0.0) as u64,
    })
}
