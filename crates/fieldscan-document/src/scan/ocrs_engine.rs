// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Local OCR backend built on the `ocrs` crate, a pure-Rust OCR engine backed
// by neural network models executed via `rten`.
//
// # Feature Gate
//
// Only available with the `ocr` feature:
//
// ```toml
// fieldscan-document = { path = "crates/fieldscan-document", features = ["ocr"] }
// ```
//
// # Model Setup
//
// The engine needs two model files in one directory:
//
// - `text-detection.rten`   — locates words in the image.
// - `text-recognition.rten` — decodes characters from detected lines.
//
// Running `ocrs-cli` once downloads both into `$XDG_CACHE_HOME/ocrs`
// (typically `~/.cache/ocrs`), which is the default lookup location.

use std::path::{Path, PathBuf};

use fieldscan_core::error::FieldscanError;
use fieldscan_core::RecognitionMode;
use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, OcrInput};
use rten::Model;
use tracing::{debug, info, instrument};

use crate::image::processor::ImageProcessor;
use crate::scan::ocr::{OcrClient, OcrOutput};

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// `$XDG_CACHE_HOME/ocrs`, falling back to `~/.cache/ocrs`.
fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Where to find the detection and recognition models.
#[derive(Debug, Clone)]
pub struct OcrsModelPaths {
    pub detection: PathBuf,
    pub recognition: PathBuf,
}

impl Default for OcrsModelPaths {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrsModelPaths {
    /// Both models inside `dir`, under their well-known filenames.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection: dir.join(DETECTION_MODEL_FILENAME),
            recognition: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    /// Fail with `CapabilityUnavailable` unless both model files exist.
    pub fn validate(&self) -> Result<(), FieldscanError> {
        for (what, path) in [("detection", &self.detection), ("recognition", &self.recognition)] {
            if !path.exists() {
                return Err(FieldscanError::CapabilityUnavailable(format!(
                    "{what} model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Local OCR backend.
///
/// Model loading is the expensive step; build one engine and reuse it for
/// every region and page.
pub struct OcrsEngine {
    engine: OcrEngine,
}

impl OcrsEngine {
    #[instrument(skip_all, fields(
        detection = %paths.detection.display(),
        recognition = %paths.recognition.display(),
    ))]
    pub fn new(paths: OcrsModelPaths) -> Result<Self, FieldscanError> {
        paths.validate()?;

        info!("Loading OCR detection model");
        let detection_model = Model::load_file(&paths.detection).map_err(|err| {
            FieldscanError::CapabilityUnavailable(format!(
                "failed to load detection model from {}: {}",
                paths.detection.display(),
                err
            ))
        })?;

        info!("Loading OCR recognition model");
        let recognition_model = Model::load_file(&paths.recognition).map_err(|err| {
            FieldscanError::CapabilityUnavailable(format!(
                "failed to load recognition model from {}: {}",
                paths.recognition.display(),
                err
            ))
        })?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| {
            FieldscanError::CapabilityUnavailable(format!("failed to initialise OCR engine: {}", err))
        })?;

        info!("OCR engine initialised");
        Ok(Self { engine })
    }

    /// Load models from the default cache directory.
    pub fn with_defaults() -> Result<Self, FieldscanError> {
        Self::new(OcrsModelPaths::default())
    }

    pub fn from_model_dir(dir: impl AsRef<Path>) -> Result<Self, FieldscanError> {
        Self::new(OcrsModelPaths::from_dir(dir))
    }

    /// Recognise text in a decoded image.
    ///
    /// Document mode reads the whole image as a page. Text mode runs the
    /// word and line stages explicitly and keeps only non-empty lines, which
    /// suits short single-block crops.
    #[instrument(skip_all, fields(width = image.width(), height = image.height(), %mode))]
    pub fn recognize_image(
        &self,
        image: &DynamicImage,
        mode: RecognitionMode,
    ) -> Result<String, FieldscanError> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            FieldscanError::RecognitionFailure(format!(
                "failed to create image source ({}x{}): {}",
                width, height, err
            ))
        })?;
        let input = self.engine.prepare_input(source).map_err(|err| {
            FieldscanError::RecognitionFailure(format!("OCR preprocessing failed: {}", err))
        })?;

        let text = match mode {
            RecognitionMode::Document => self.engine.get_text(&input).map_err(|err| {
                FieldscanError::RecognitionFailure(format!("OCR text recognition failed: {}", err))
            })?,
            RecognitionMode::Text => self.recognize_lines(&input)?.join("\n"),
        };

        debug!(lines = text.lines().count(), chars = text.chars().count(), "OCR complete");
        Ok(text)
    }

    fn recognize_lines(&self, input: &OcrInput) -> Result<Vec<String>, FieldscanError> {
        let word_rects = self.engine.detect_words(input).map_err(|err| {
            FieldscanError::RecognitionFailure(format!("word detection failed: {}", err))
        })?;
        let line_rects = self.engine.find_text_lines(input, &word_rects);
        debug!(words = word_rects.len(), lines = line_rects.len(), "Text lines found");

        let line_texts = self
            .engine
            .recognize_text(input, &line_rects)
            .map_err(|err| {
                FieldscanError::RecognitionFailure(format!("line recognition failed: {}", err))
            })?;

        Ok(line_texts
            .iter()
            .flatten()
            .map(|line| line.to_string())
            .filter(|text| !text.trim().is_empty())
            .collect())
    }
}

impl OcrClient for OcrsEngine {
    fn recognize(&self, image_bytes: &[u8], mode: RecognitionMode) -> Result<OcrOutput, FieldscanError> {
        let image = ImageProcessor::from_bytes(image_bytes)?.into_dynamic();
        self.recognize_image(&image, mode).map(OcrOutput::text)
    }

    fn name(&self) -> &str {
        "ocrs"
    }
}
