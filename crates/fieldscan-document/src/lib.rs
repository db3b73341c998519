// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// fieldscan-document — Scanned page to layout-annotated text.
//
// Provides image handling (decode, crop, encode), adaptive enhancement ahead
// of OCR, optional layout-region detection, OCR orchestration with a
// text/document mode switch, and marker-preserving text normalization.

pub mod image;
pub mod scan;
pub mod text;

// Re-export the primary structs so callers can use `fieldscan_document::ExtractionOrchestrator` etc.
pub use image::processor::ImageProcessor;
pub use scan::{
    DetectedBlock, DocumentExtractor, DocumentText, ExtractionOrchestrator, ImageEnhancer,
    LayoutCapability, OcrClient, OcrClientSlot, OcrOutput, RegionDetector,
};
pub use text::normalize::TextNormalizer;

#[cfg(feature = "ocr")]
pub use scan::OcrsEngine;

#[cfg(feature = "vision")]
pub use scan::VisionClient;
