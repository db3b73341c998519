// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cloud OCR backend speaking the Google Vision `images:annotate` REST API.
//
// Only available with the `vision` feature. Text mode maps to
// `TEXT_DETECTION`, document mode to `DOCUMENT_TEXT_DETECTION`.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use fieldscan_core::error::FieldscanError;
use fieldscan_core::RecognitionMode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::scan::ocr::{OcrClient, OcrOutput};

/// Public Vision endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GOOGLE_VISION_API_KEY";

/// Connection settings for [`VisionClient`].
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_key: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl VisionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Read the API key from `GOOGLE_VISION_API_KEY`.
    pub fn from_env() -> Result<Self, FieldscanError> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key)),
            _ => Err(FieldscanError::CapabilityUnavailable(format!(
                "{API_KEY_ENV} is not set"
            ))),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Blocking `images:annotate` client.
#[derive(Debug, Clone)]
pub struct VisionClient {
    config: VisionConfig,
    client: reqwest::blocking::Client,
}

impl VisionClient {
    pub fn new(config: VisionConfig) -> Result<Self, FieldscanError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| {
                FieldscanError::CapabilityUnavailable(format!("failed to build HTTP client: {}", err))
            })?;
        Ok(Self { config, client })
    }
}

// -- Wire types -------------------------------------------------------------

#[derive(Serialize)]
struct AnnotateRequest<'a> {
    requests: [ImageRequest<'a>; 1],
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    image: ImageContent,
    features: [Feature<'a>; 1],
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    full_text_annotation: Option<FullTextAnnotation>,
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    error: Option<Status>,
}

#[derive(Debug, Default, Deserialize)]
struct FullTextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
}

fn feature_for(mode: RecognitionMode) -> &'static str {
    match mode {
        RecognitionMode::Text => "TEXT_DETECTION",
        RecognitionMode::Document => "DOCUMENT_TEXT_DETECTION",
    }
}

/// Pick the text out of one image response: the full-text annotation when
/// present, else the first text annotation.
fn output_from(response: ImageResponse) -> OcrOutput {
    if let Some(status) = response.error.filter(|s| !s.message.is_empty()) {
        return OcrOutput {
            text: String::new(),
            error: Some(status.message),
        };
    }
    let text = match response.full_text_annotation {
        Some(full) if !full.text.is_empty() => full.text,
        _ => response
            .text_annotations
            .into_iter()
            .next()
            .map(|a| a.description)
            .unwrap_or_default(),
    };
    OcrOutput::text(text)
}

impl OcrClient for VisionClient {
    #[instrument(skip_all, fields(bytes = image_bytes.len(), %mode))]
    fn recognize(&self, image_bytes: &[u8], mode: RecognitionMode) -> Result<OcrOutput, FieldscanError> {
        let request = AnnotateRequest {
            requests: [ImageRequest {
                image: ImageContent {
                    content: BASE64.encode(image_bytes),
                },
                features: [Feature {
                    kind: feature_for(mode),
                }],
            }],
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .map_err(|err| FieldscanError::RecognitionFailure(format!("vision request failed: {}", err)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FieldscanError::RecognitionFailure(format!(
                "vision API error {}: {}",
                status, body
            )));
        }

        let parsed: AnnotateResponse = response.json().map_err(|err| {
            FieldscanError::RecognitionFailure(format!("failed to parse vision response: {}", err))
        })?;

        let output = parsed
            .responses
            .into_iter()
            .next()
            .map(output_from)
            .unwrap_or_default();
        debug!(chars = output.text.chars().count(), "Vision response received");
        Ok(output)
    }

    fn name(&self) -> &str {
        "vision"
    }
}
