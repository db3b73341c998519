// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collaborator selection — which OCR backend and language model the binary
// was built with, and which of them are configured at runtime.

use std::path::Path;
use std::sync::Arc;

use fieldscan_core::error::Result;
use fieldscan_document::OcrClient;
use fieldscan_extract::FieldReconciler;

/// The OCR backend to use: the cloud client when a key is available,
/// otherwise the local engine.
pub fn ocr_client(vision_key: Option<&str>, model_dir: Option<&Path>) -> Result<Arc<dyn OcrClient>> {
    if let Some(client) = cloud_ocr(vision_key)? {
        return Ok(client);
    }
    local_ocr(model_dir)
}

#[cfg(feature = "vision")]
fn cloud_ocr(vision_key: Option<&str>) -> Result<Option<Arc<dyn OcrClient>>> {
    use fieldscan_document::scan::vision::{VisionClient, VisionConfig, API_KEY_ENV};

    let key = vision_key
        .map(str::to_string)
        .or_else(|| std::env::var(API_KEY_ENV).ok())
        .filter(|key| !key.trim().is_empty());
    let Some(key) = key else {
        return Ok(None);
    };
    tracing::info!("Using cloud vision OCR");
    Ok(Some(Arc::new(VisionClient::new(VisionConfig::new(key))?)))
}

#[cfg(not(feature = "vision"))]
fn cloud_ocr(vision_key: Option<&str>) -> Result<Option<Arc<dyn OcrClient>>> {
    if vision_key.is_some() {
        tracing::warn!("--vision-key ignored: built without the `vision` feature");
    }
    Ok(None)
}

#[cfg(feature = "ocr")]
fn local_ocr(model_dir: Option<&Path>) -> Result<Arc<dyn OcrClient>> {
    use fieldscan_document::OcrsEngine;

    let engine = match model_dir {
        Some(dir) => OcrsEngine::from_model_dir(dir)?,
        None => OcrsEngine::with_defaults()?,
    };
    tracing::info!("Using local ocrs engine");
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "ocr"))]
fn local_ocr(_model_dir: Option<&Path>) -> Result<Arc<dyn OcrClient>> {
    Err(fieldscan_core::FieldscanError::CapabilityUnavailable(
        "no OCR backend available; build with the `ocr` feature or use `vision` with an API key"
            .into(),
    ))
}

/// A reconciler backed by the language model the binary was built with.
#[cfg(feature = "gemini")]
pub fn model_reconciler() -> Result<FieldReconciler> {
    let client = fieldscan_extract::GeminiClient::from_env()?;
    tracing::info!("Using Gemini for field reconciliation");
    Ok(FieldReconciler::new(client))
}

#[cfg(not(feature = "gemini"))]
pub fn model_reconciler() -> Result<FieldReconciler> {
    Err(fieldscan_core::FieldscanError::CapabilityUnavailable(
        "no language model available; build with the `gemini` feature or pass --deterministic-only"
            .into(),
    ))
}
