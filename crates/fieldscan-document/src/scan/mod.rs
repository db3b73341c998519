// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline — image enhancement, layout regions, OCR orchestration
// and multi-page document extraction.

pub mod document;
pub mod enhance;
pub mod layout;
pub mod ocr;
pub mod orchestrator;

#[cfg(feature = "ocr")]
pub mod ocrs_engine;

#[cfg(feature = "vision")]
pub mod vision;

#[cfg(test)]
pub(crate) mod testing;

pub use document::{DocumentExtractor, DocumentText, PageRegion, PageSummary};
pub use enhance::ImageEnhancer;
pub use layout::{DetectedBlock, LayoutCapability, RegionDetector, RegionGeometry};
pub use ocr::{OcrClient, OcrClientSlot, OcrOutput};
pub use orchestrator::ExtractionOrchestrator;

#[cfg(feature = "ocr")]
pub use ocrs_engine::OcrsEngine;

#[cfg(feature = "vision")]
pub use vision::VisionClient;
