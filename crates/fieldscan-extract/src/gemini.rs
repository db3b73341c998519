// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Language-model backend for the Gemini `generateContent` REST API.
//
// Only available with the `gemini` feature. The API key is read from
// `GEMINI_API_KEY` and the model from `GEMINI_MODEL_NAME`; no key is ever
// compiled in.

use std::time::Duration;

use fieldscan_core::error::{FieldscanError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::model::LanguageModel;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const MODEL_ENV: &str = "GEMINI_MODEL_NAME";
pub const DEFAULT_MODEL: &str = "models/gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Connection settings for [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Model resource name, e.g. `models/gemini-2.5-flash`.
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Key from `GEMINI_API_KEY`, model from `GEMINI_MODEL_NAME` when set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                FieldscanError::CapabilityUnavailable(format!("{API_KEY_ENV} is not set"))
            })?;
        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var(MODEL_ENV) {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `{base_url}/models/<name>:generateContent`.
    fn endpoint(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }
}

/// Blocking Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::blocking::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| {
                FieldscanError::CapabilityUnavailable(format!("failed to build HTTP client: {}", err))
            })?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env()?)
    }
}

// -- Wire types -------------------------------------------------------------

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Concatenated text parts of the first candidate.
fn response_text(response: GenerateResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default()
}

impl LanguageModel for GeminiClient {
    #[instrument(skip_all, fields(model = %self.config.model, prompt_chars = prompt.len()))]
    fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: [Content {
                parts: [RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.config.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .map_err(|err| FieldscanError::ModelCallFailure(format!("Gemini request failed: {}", err)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FieldscanError::ModelCallFailure(format!(
                "Gemini API error {}: {}",
                status, body
            )));
        }

        let parsed: GenerateResponse = response.json().map_err(|err| {
            FieldscanError::ModelCallFailure(format!("failed to parse Gemini response: {}", err))
        })?;
        let text = response_text(parsed);
        debug!(chars = text.chars().count(), "Gemini response received");
        Ok(text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_accepts_bare_and_prefixed_model_names() {
        let prefixed = GeminiConfig::new("k");
        assert_eq!(
            prefixed.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        let bare = GeminiConfig::new("k").with_model("gemini-pro");
        assert!(bare.endpoint().ends_with("/models/gemini-pro:generateContent"));
    }

    #[test]
    fn request_shape() {
        let request = GenerateRequest {
            contents: [Content {
                parts: [RequestPart { text: "hi" }],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn response_parts_are_concatenated() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"A\":"},{"text":"\"1\"}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response_text(parsed), r#"{"A":"1"}"#);
    }

    #[test]
    fn blocked_response_is_empty_text() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert_eq!(response_text(parsed), "");
    }
}
