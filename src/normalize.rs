//! Reply normalization shared by the AI clients.
//!
//! Models occasionally wrap JSON in a markdown fence and quote prices as
//! free text ("NT$1,200 元"). These helpers turn such replies into a
//! well-formed [`AnalysisResult`].

use crate::models::AnalysisResult;
use crate::{Error, Result};
use serde_json::{Map, Value};

const FENCE: &str = "```";

/// Remove a leading ```` ``` ```` / ```` ```json ```` marker and a trailing
/// ```` ``` ```` marker, then trim.
pub fn strip_code_fence(content: &str) -> &str {
    let mut text = content.trim();

    if let Some(rest) = text.strip_prefix(FENCE) {
        text = match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        };
    }
    if let Some(rest) = text.strip_suffix(FENCE) {
        text = rest;
    }

    text.trim()
}

/// Coerce an upstream `recommended_price` value into a non-negative number.
///
/// Text keeps only its decimal digits (in any common script) and `.`
/// characters (so `"NT$1,200 元"` becomes `1200.0`); numbers pass through; everything else, including a missing
/// field, becomes `0.0`.
pub fn normalize_price(value: Option<&Value>) -> f64 {
    let price = match value {
        Some(Value::String(text)) => parse_price_text(text),
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        _ => 0.0,
    };

    if price.is_finite() && price >= 0.0 {
        price
    } else {
        0.0
    }
}

/// Code points of the zero digit in each run of ten decimal digits that a
/// model might quote a price in.
const DIGIT_ZEROS: [u32; 25] = [
    0x0660, // Arabic-Indic
    0x06F0, // Extended Arabic-Indic
    0x07C0, // NKo
    0x0966, // Devanagari
    0x09E6, // Bengali
    0x0A66, // Gurmukhi
    0x0AE6, // Gujarati
    0x0B66, // Oriya
    0x0BE6, // Tamil
    0x0C66, // Telugu
    0x0CE6, // Kannada
    0x0D66, // Malayalam
    0x0DE6, // Sinhala
    0x0E50, // Thai
    0x0ED0, // Lao
    0x0F20, // Tibetan
    0x1040, // Myanmar
    0x17E0, // Khmer
    0x1810, // Mongolian
    0xFF10, // Fullwidth
    0x1D7CE, // Mathematical bold
    0x1D7D8, // Mathematical double-struck
    0x1D7E2, // Mathematical sans-serif
    0x1D7EC, // Mathematical sans-serif bold
    0x1D7F6, // Mathematical monospace
];

/// Value of a decimal digit in any of the scripts above, or ASCII.
fn decimal_digit(c: char) -> Option<u32> {
    if let Some(d) = c.to_digit(10) {
        return Some(d);
    }
    let code = c as u32;
    DIGIT_ZEROS
        .iter()
        .find(|&&zero| (zero..zero + 10).contains(&code))
        .map(|zero| code - zero)
}

fn parse_price_text(text: &str) -> f64 {
    let digits: String = text
        .chars()
        .filter_map(|c| match c {
            '.' => Some('.'),
            _ => decimal_digit(c).and_then(|d| char::from_digit(d, 10)),
        })
        .collect();

    digits.parse().unwrap_or(0.0)
}

const TEXT_FIELDS: [&str; 4] = ["product_name", "description", "category", "target_audience"];
const LIST_FIELDS: [&str; 2] = ["features", "usage_scenarios"];

/// Scalar rendered as text; `None` for arrays and objects.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Bring loosely typed fields into the shape `AnalysisResult` expects.
///
/// Numbers and booleans in text fields become strings. A list field given
/// as one string is split on `、`, `，` and `,`. Arrays and objects in text
/// fields are left alone and fail deserialization.
fn repair_field_types(fields: &mut Map<String, Value>) {
    for key in TEXT_FIELDS {
        if let Some(value) = fields.get_mut(key) {
            if !value.is_string() {
                if let Some(text) = scalar_text(value) {
                    *value = Value::String(text);
                }
            }
        }
    }

    for key in LIST_FIELDS {
        let Some(value) = fields.get_mut(key) else {
            continue;
        };
        let items: Option<Vec<Value>> = match &*value {
            Value::String(text) => Some(
                text.split(['、', '，', ','])
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| Value::String(item.to_string()))
                    .collect(),
            ),
            Value::Number(_) | Value::Bool(_) => {
                scalar_text(value).map(|text| vec![Value::String(text)])
            }
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter(|item| !item.is_null())
                    .map(|item| {
                        scalar_text(item)
                            .map(Value::String)
                            .unwrap_or_else(|| item.clone())
                    })
                    .collect(),
            ),
            _ => None,
        };
        if let Some(items) = items {
            *value = Value::Array(items);
        }
    }
}

/// Parse a vision reply into an [`AnalysisResult`] with a normalized price.
pub fn parse_analysis_reply(content: &str) -> Result<AnalysisResult> {
    let body = strip_code_fence(content);

    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::malformed(format!("invalid JSON: {}", e), content))?;

    let mut fields: Map<String, Value> = match value {
        Value::Object(map) => map,
        other => {
            return Err(Error::malformed(
                format!("expected a JSON object, got {}", json_type_name(&other)),
                content,
            ))
        }
    };

    let raw_price = fields.get("recommended_price").cloned();
    let price = normalize_price(raw_price.as_ref());
    tracing::debug!("Normalized recommended_price {:?} -> {}", raw_price, price);

    fields.retain(|_, v| !v.is_null());
    repair_field_types(&mut fields);
    fields.insert("recommended_price".to_string(), Value::from(price));

    serde_json::from_value(Value::Object(fields))
        .map_err(|e| Error::malformed(format!("unexpected field type: {}", e), content))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
