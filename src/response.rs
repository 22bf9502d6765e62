//! Parsing of the fenced JSON block the model is asked to reply with.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

const OPENING_FENCE: &str = "```json";
const CLOSING_FENCE: &str = "```";

/// Keys the model is asked to fill in
pub const EXPECTED_KEYS: [&str; 3] = ["error", "description", "resolve_technique"];

/// Explanation of a single error message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// The original or model-echoed error text
    pub error: String,
    /// Why the error occurred
    pub description: String,
    /// Steps to resolve it
    pub resolve_technique: String,
}

impl AnalysisResult {
    /// Description used when an error could not be analyzed
    pub const FALLBACK_DESCRIPTION: &'static str = "Failed to analyze error with Gemini API";
    /// Remediation used when an error could not be analyzed
    pub const FALLBACK_RESOLVE_TECHNIQUE: &'static str =
        "Check the Gemini API configuration or try again later.";

    /// The canonical record substituted for a failed analysis
    pub fn fallback(error_message: &str) -> Self {
        Self {
            error: error_message.to_string(),
            description: Self::FALLBACK_DESCRIPTION.to_string(),
            resolve_technique: Self::FALLBACK_RESOLVE_TECHNIQUE.to_string(),
        }
    }
}

/// How strictly the parsed object is checked against [`EXPECTED_KEYS`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchemaMode {
    /// Missing keys become empty strings, non-string values are rendered as JSON
    #[default]
    Lenient,
    /// Every key must be present and hold a string
    Strict,
}

/// Why a model reply could not be turned into an [`AnalysisResult`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    /// Reply was empty or whitespace only
    #[error("Gemini API returned empty response")]
    EmptyResponse,
    /// Opening or closing fence missing
    #[error("No valid JSON found in Gemini response")]
    MalformedFence,
    /// Fenced block is not the expected JSON object
    #[error("Failed to parse Gemini API response: {0}")]
    InvalidJson(String),
}

impl ParseFailure {
    /// Stable tag for log records
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyResponse => "empty_response",
            Self::MalformedFence => "malformed_fence",
            Self::InvalidJson(_) => "invalid_json",
        }
    }
}

/// Extracts and parses the JSON object fenced by "```json" and the last "```"
pub fn parse_analysis(raw: &str, mode: SchemaMode) -> Result<AnalysisResult, ParseFailure> {
    if raw.trim().is_empty() {
        return Err(ParseFailure::EmptyResponse);
    }

    let json_str = fenced_block(raw).ok_or(ParseFailure::MalformedFence)?;
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| ParseFailure::InvalidJson(e.to_string()))?;

    match value {
        Value::Object(object) => from_object(&object, mode),
        other => Err(ParseFailure::InvalidJson(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
    }
}

/// Returns the trimmed text between the fences, if both are present.
/// The closing fence must come after the opening one.
fn fenced_block(raw: &str) -> Option<&str> {
    let start = raw.find(OPENING_FENCE)? + OPENING_FENCE.len();
    let end = start + raw[start..].rfind(CLOSING_FENCE)?;
    Some(raw[start..end].trim())
}

fn from_object(object: &Map<String, Value>, mode: SchemaMode) -> Result<AnalysisResult, ParseFailure> {
    if !EXPECTED_KEYS.iter().any(|key| object.contains_key(*key)) {
        return Err(ParseFailure::InvalidJson(
            "object contains none of the expected keys".to_string(),
        ));
    }

    let field = |key: &str| -> Result<String, ParseFailure> {
        match (object.get(key), mode) {
            (Some(Value::String(text)), _) => Ok(text.clone()),
            (None, SchemaMode::Lenient) => Ok(String::new()),
            (Some(other), SchemaMode::Lenient) => Ok(other.to_string()),
            (None, SchemaMode::Strict) => {
                Err(ParseFailure::InvalidJson(format!("missing field `{}`", key)))
            }
            (Some(other), SchemaMode::Strict) => Err(ParseFailure::InvalidJson(format!(
                "field `{}` must be a string, found {}",
                key,
                json_kind(other)
            ))),
        }
    };

    Ok(AnalysisResult {
        error: field(EXPECTED_KEYS[0])?,
        description: field(EXPECTED_KEYS[1])?,
        resolve_technique: field(EXPECTED_KEYS[2])?,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
