// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Defensive parsing of language-model output into a JSON object.

use std::sync::LazyLock;

use fieldscan_core::error::{FieldscanError, Result};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

static TRAILING_COMMA_OBJECT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r",\s*\}").ok());
static TRAILING_COMMA_ARRAY: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r",\s*\]").ok());

/// Recover the JSON object a model answered with.
///
/// Tries the first balanced `{...}` span, then the whole answer with code
/// fences removed. Smart quotes, non-breaking spaces and trailing commas are
/// repaired first. A parsed value that is not an object counts as an empty
/// answer.
pub fn parse_model_response(raw: &str) -> Result<Map<String, Value>> {
    let repaired = repair_json(raw);

    let mut candidates = Vec::with_capacity(2);
    if let Some(span) = first_json_object(&repaired) {
        candidates.push(span.to_string());
    }
    candidates.push(strip_code_fences(&repaired));

    let mut last_error = String::from("no JSON object found");
    for candidate in &candidates {
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(object)) => return Ok(object),
            Ok(other) => {
                debug!(kind = json_kind(&other), "Model answered with a non-object; ignoring it");
                return Ok(Map::new());
            }
            Err(err) => last_error = err.to_string(),
        }
    }

    Err(FieldscanError::ModelResponseUnparseable {
        reason: last_error,
        raw_output: raw.to_string(),
    })
}

/// Replace typographic quotes and non-breaking spaces, and drop trailing
/// commas before closing brackets.
pub fn repair_json(text: &str) -> String {
    let mut repaired = text
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ");
    if let Some(re) = TRAILING_COMMA_OBJECT.as_ref() {
        repaired = re.replace_all(&repaired, "}").into_owned();
    }
    if let Some(re) = TRAILING_COMMA_ARRAY.as_ref() {
        repaired = re.replace_all(&repaired, "]").into_owned();
    }
    repaired.trim().to_string()
}

/// The first brace-balanced `{...}` span, ignoring braces inside strings.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
