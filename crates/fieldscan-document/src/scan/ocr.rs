// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR collaborator contract.
//
// The pipeline does not recognise text itself. It hands JPEG-encoded images
// to an `OcrClient` together with a recognition-mode hint, and degrades from
// a failed call to one document-mode attempt before giving up on that unit.
//
// Concrete backends live behind feature gates:
//
// - `ocr`    — `OcrsEngine`, a local pure-Rust engine (`ocrs` + `rten`).
// - `vision` — `VisionClient`, a cloud `images:annotate` REST client.

use std::sync::{Arc, RwLock};

use fieldscan_core::error::{FieldscanError, Result};
use fieldscan_core::RecognitionMode;
use tracing::{debug, warn};

/// What an OCR backend returned for one image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OcrOutput {
    pub text: String,
    /// Error message reported inside an otherwise successful response.
    pub error: Option<String>,
}

impl OcrOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            error: None,
        }
    }
}

/// Image-in / text-out recognition collaborator.
pub trait OcrClient: Send + Sync {
    /// Recognise the text in an encoded image (JPEG, PNG, ...).
    fn recognize(&self, image_bytes: &[u8], mode: RecognitionMode) -> Result<OcrOutput>;

    /// Short backend name for logs.
    fn name(&self) -> &str {
        "ocr"
    }
}

/// Outcome of recognising one unit (region or page).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recognition {
    /// Recognised text; empty on failure.
    pub text: String,
    /// Mode of the call that produced `text`.
    pub mode: RecognitionMode,
    /// Why recognition produced nothing, if it failed.
    pub error: Option<String>,
}

/// Recognise `image_bytes`, preferring `mode`.
///
/// A failed primary call is retried once in document mode. A response that
/// carries an error message yields empty text with the message recorded.
/// Never fails; failures surface through [`Recognition::error`].
pub fn recognize_with_fallback(
    client: &dyn OcrClient,
    image_bytes: &[u8],
    mode: RecognitionMode,
) -> Recognition {
    let (result, mode_used) = match client.recognize(image_bytes, mode) {
        Ok(output) => (Ok(output), mode),
        Err(primary) => {
            warn!(
                backend = client.name(),
                %mode,
                error = %primary,
                "Primary recognition failed; retrying in document mode"
            );
            (
                client.recognize(image_bytes, RecognitionMode::Document),
                RecognitionMode::Document,
            )
        }
    };

    match result {
        Ok(OcrOutput { error: Some(message), .. }) if !message.trim().is_empty() => {
            warn!(backend = client.name(), %message, "OCR backend reported an error");
            Recognition {
                text: String::new(),
                mode: mode_used,
                error: Some(message),
            }
        }
        Ok(output) => {
            debug!(chars = output.text.chars().count(), mode = %mode_used, "Recognition complete");
            Recognition {
                text: output.text,
                mode: mode_used,
                error: None,
            }
        }
        Err(err) => {
            warn!(backend = client.name(), error = %err, "Recognition failed");
            Recognition {
                text: String::new(),
                mode: mode_used,
                error: Some(err.to_string()),
            }
        }
    }
}

/// The single active OCR client, swappable at runtime.
///
/// Writers replace the client under an exclusive lock; readers take a cheap
/// `Arc` snapshot and release the lock before doing any work, so a page is
/// always recognised by one client from start to finish.
#[derive(Clone, Default)]
pub struct OcrClientSlot {
    inner: Arc<RwLock<Option<Arc<dyn OcrClient>>>>,
}

impl OcrClientSlot {
    /// An empty slot; extraction fails until a client is installed.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: impl OcrClient + 'static) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(Arc::new(client)))),
        }
    }

    /// Install (or replace) the active client.
    pub fn install(&self, client: Arc<dyn OcrClient>) -> Result<()> {
        let mut guard = self.inner.write().map_err(|_| poisoned())?;
        debug!(backend = client.name(), "Installing OCR client");
        *guard = Some(client);
        Ok(())
    }

    /// Remove the active client.
    pub fn clear(&self) -> Result<()> {
        let mut guard = self.inner.write().map_err(|_| poisoned())?;
        *guard = None;
        Ok(())
    }

    /// Snapshot of the active client.
    pub fn current(&self) -> Result<Arc<dyn OcrClient>> {
        let guard = self.inner.read().map_err(|_| poisoned())?;
        guard.clone().ok_or_else(|| {
            FieldscanError::CapabilityUnavailable("OCR client not configured".into())
        })
    }

    pub fn is_configured(&self) -> bool {
        self.inner.read().map(|g| g.is_some()).unwrap_or(false)
    }
}

fn poisoned() -> FieldscanError {
    FieldscanError::CapabilityUnavailable("OCR client lock poisoned".into())
}
