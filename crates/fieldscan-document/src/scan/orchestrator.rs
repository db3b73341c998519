// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-page extraction: layout detection, per-region enhancement and
// recognition, marker-annotated text assembly and normalization.

use std::sync::Arc;

use fieldscan_core::config::{LayoutConfig, OrchestratorConfig, PipelineConfig};
use fieldscan_core::error::{FieldscanError, Result};
use fieldscan_core::{BoundingBox, PageResult, RecognitionMode, Region, RegionKind};
use image::DynamicImage;
use tracing::{debug, info, instrument, warn};

use crate::image::processor::ImageProcessor;
use crate::scan::enhance::ImageEnhancer;
use crate::scan::layout::{crop_regions, LayoutCapability, RegionCrop};
use crate::scan::ocr::{recognize_with_fallback, OcrClient, OcrClientSlot};
use crate::text::normalize::TextNormalizer;

/// Separator between text blocks in the combined page text.
const BLOCK_SEPARATOR: &str = "\n\n";

/// Turns one page image into a [`PageResult`].
///
/// ```ignore
/// let orchestrator = ExtractionOrchestrator::new(OcrClientSlot::with_client(engine))
///     .with_layout(LayoutCapability::detector(my_detector));
/// let page = orchestrator.extract(&image);
/// println!("{}", page.cleaned_text);
/// ```
pub struct ExtractionOrchestrator {
    layout: LayoutCapability,
    enhancer: ImageEnhancer,
    ocr: OcrClientSlot,
    normalizer: TextNormalizer,
    layout_config: LayoutConfig,
    config: OrchestratorConfig,
}

impl ExtractionOrchestrator {
    // -- Construction ---------------------------------------------------------

    /// Orchestrator with default settings and no layout detector.
    pub fn new(ocr: OcrClientSlot) -> Self {
        Self::from_config(&PipelineConfig::default(), ocr)
    }

    pub fn from_config(config: &PipelineConfig, ocr: OcrClientSlot) -> Self {
        Self {
            layout: LayoutCapability::NoDetector,
            enhancer: ImageEnhancer::new(config.enhancer.clone()),
            ocr,
            normalizer: TextNormalizer::new(),
            layout_config: config.layout.clone(),
            config: config.orchestrator.clone(),
        }
    }

    pub fn with_layout(mut self, layout: LayoutCapability) -> Self {
        self.layout = layout;
        self
    }

    /// The shared OCR client slot; swapping its client affects later pages.
    pub fn ocr_slot(&self) -> &OcrClientSlot {
        &self.ocr
    }

    pub fn has_layout_detector(&self) -> bool {
        self.layout.is_available()
    }

    // -- Extraction -----------------------------------------------------------

    /// Extract the text of one page.
    ///
    /// Never fails: a page that cannot be processed yields an empty result
    /// with [`PageResult::error`] set.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn extract(&self, image: &DynamicImage) -> PageResult {
        match self.try_extract(image) {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "Page extraction failed");
                PageResult::failed(err.to_string())
            }
        }
    }

    fn try_extract(&self, image: &DynamicImage) -> Result<PageResult> {
        if image.width() == 0 || image.height() == 0 {
            return Err(FieldscanError::PageExtractionFailure(
                "page image has zero size".into(),
            ));
        }
        // One client for the whole page, even if the slot is swapped meanwhile.
        let client = self.ocr.current()?;

        let geometries = self.layout.detect_regions(image);
        let crops = crop_regions(image, &geometries, &self.layout_config);

        let (blocks, regions) = if crops.is_empty() {
            if geometries.is_empty() {
                info!("No layout regions; using full-page OCR");
            } else {
                warn!(
                    detected = geometries.len(),
                    "Every detected region was degenerate; using full-page OCR"
                );
            }
            self.recognize_full_page(&client, image)
        } else {
            info!(regions = crops.len(), "Recognising text regions");
            self.recognize_regions(&client, crops)
        };

        let raw_text = blocks.join(BLOCK_SEPARATOR);
        let cleaned_text = self.normalizer.clean(&raw_text);
        info!(
            blocks = blocks.len(),
            raw_chars = raw_text.chars().count(),
            cleaned_chars = cleaned_text.chars().count(),
            "Page extracted"
        );

        Ok(PageResult {
            raw_text,
            cleaned_text,
            blocks_processed: blocks.len(),
            regions,
            error: None,
        })
    }

    fn recognize_regions(
        &self,
        client: &Arc<dyn OcrClient>,
        crops: Vec<RegionCrop>,
    ) -> (Vec<String>, Vec<Region>) {
        let mut blocks = Vec::new();
        let mut regions = Vec::with_capacity(crops.len());

        for crop in crops {
            let rescued = self.enhancer.rescue_region(&crop.image);
            let processed = self.enhancer.preprocess(&rescued);
            let mode = self.mode_for(&processed);

            let geometry = crop.geometry;
            let (region, block) =
                self.recognize_unit(client, processed, mode, geometry.index, geometry.kind, geometry.bbox);
            info!(
                index = region.index,
                kind = %region.kind,
                chars = region.char_count,
                %mode,
                "Region recognised"
            );
            blocks.extend(block);
            regions.push(region);
        }
        (blocks, regions)
    }

    fn recognize_full_page(
        &self,
        client: &Arc<dyn OcrClient>,
        image: &DynamicImage,
    ) -> (Vec<String>, Vec<Region>) {
        let processed = self.enhancer.preprocess(image);
        let (region, block) = self.recognize_unit(
            client,
            processed,
            RecognitionMode::Document,
            1,
            RegionKind::FullPage,
            BoundingBox::full_page(),
        );
        debug!(chars = region.char_count, "Full page recognised");
        (block.into_iter().collect(), vec![region])
    }

    /// Encode and recognise one unit, returning its region record and, if
    /// any text came back, its marker-annotated block.
    fn recognize_unit(
        &self,
        client: &Arc<dyn OcrClient>,
        image: DynamicImage,
        mode: RecognitionMode,
        index: usize,
        kind: RegionKind,
        bbox: BoundingBox,
    ) -> (Region, Option<String>) {
        let cap = self.config.region_text_cap;
        let bytes = match ImageProcessor::from_dynamic(image).to_jpeg_bytes(self.config.jpeg_quality) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(index, error = %err, "Could not encode region for recognition");
                let region = Region::new(index, kind, bbox, "", cap).with_error(Some(err.to_string()));
                return (region, None);
            }
        };

        let recognition = recognize_with_fallback(client.as_ref(), &bytes, mode);
        let region = Region::new(index, kind, bbox, &recognition.text, cap)
            .with_error(recognition.error);
        let block = (!recognition.text.trim().is_empty())
            .then(|| region.marker().annotate(&recognition.text));
        (region, block)
    }

    /// Short or narrow crops read better in text mode.
    fn mode_for(&self, image: &DynamicImage) -> RecognitionMode {
        if image.height() < self.config.short_text_max_height
            || image.width() < self.config.short_text_max_width
        {
            RecognitionMode::Text
        } else {
            RecognitionMode::Document
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::layout::DetectedBlock;
    use crate::scan::ocr::OcrOutput;
    use crate::scan::testing::{blank_page, FakeDetector, FakeOcr};

    fn orchestrator(ocr: &Arc<FakeOcr>) -> ExtractionOrchestrator {
        let slot = OcrClientSlot::new();
        slot.install(ocr.clone()).unwrap();
        ExtractionOrchestrator::new(slot)
    }

    fn block(label: &str, x1: u32, y1: u32, x2: u32, y2: u32) -> DetectedBlock {
        DetectedBlock {
            label: label.into(),
            bbox: BoundingBox::new(x1, y1, x2, y2),
        }
    }

    #[test]
    fn without_detector_page_is_one_full_page_region() {
        let ocr = Arc::new(FakeOcr::new(vec![Ok(OcrOutput::text("RFI No: 0000220949"))]));
        let page = orchestrator(&ocr).extract(&blank_page(400, 300));

        assert_eq!(page.raw_text, "[REGION:FULL_PAGE|1|bbox:0,0,0,0]\nRFI No: 0000220949");
        assert_eq!(page.cleaned_text, page.raw_text);
        assert_eq!(page.blocks_processed, 1);
        assert_eq!(page.regions.len(), 1);
        assert_eq!(page.regions[0].kind, RegionKind::FullPage);
        assert!(page.regions[0].bbox.is_full_page());
        assert_eq!(ocr.modes(), vec![RecognitionMode::Document]);
        assert!(page.error.is_none());
    }

    #[test]
    fn regions_are_joined_in_reading_order() {
        let ocr = Arc::new(FakeOcr::new(vec![
            Ok(OcrOutput::text("Date: 12.05.2024")),
            Ok(OcrOutput::text("RFI No:  0000220949\nCH211")),
        ]));
        let detector = FakeDetector::new(vec![
            block("Text", 20, 200, 380, 260),
            block("Title", 20, 20, 380, 80),
        ]);
        let page = orchestrator(&ocr)
            .with_layout(LayoutCapability::detector(detector))
            .extract(&blank_page(400, 300));

        assert_eq!(
            page.raw_text,
            "[REGION:Title|1|bbox:20,20,380,80]\nDate: 12.05.2024\n\n\
             [REGION:Text|2|bbox:20,200,380,260]\nRFI No:  0000220949\nCH211"
        );
        assert_eq!(
            page.cleaned_text,
            "[REGION:Title|1|bbox:20,20,380,80]\nDate: 12/05/2024\n\n\
             [REGION:Text|2|bbox:20,200,380,260]\nRFI No: 0000220949\nCH211"
        );
        assert_eq!(page.blocks_processed, 2);
    }

    #[test]
    fn crop_size_selects_recognition_mode() {
        let ocr = Arc::new(FakeOcr::new(vec![
            Ok(OcrOutput::text("big")),
            Ok(OcrOutput::text("small")),
        ]));
        let detector = FakeDetector::new(vec![
            block("Text", 0, 0, 700, 400),
            block("Text", 0, 500, 200, 540),
        ]);
        orchestrator(&ocr)
            .with_layout(LayoutCapability::detector(detector))
            .extract(&blank_page(800, 700));

        assert_eq!(
            ocr.modes(),
            vec![RecognitionMode::Document, RecognitionMode::Text]
        );
        // Padded by 5% on each side and clipped to the page.
        assert_eq!(ocr.sizes()[0], (735, 420));
    }

    #[test]
    fn empty_regions_are_recorded_but_not_joined() {
        let ocr = Arc::new(FakeOcr::new(vec![
            Ok(OcrOutput::text("   ")),
            Ok(OcrOutput::text("CH211")),
        ]));
        let detector = FakeDetector::new(vec![
            block("Text", 10, 10, 200, 50),
            block("Text", 10, 100, 200, 140),
        ]);
        let page = orchestrator(&ocr)
            .with_layout(LayoutCapability::detector(detector))
            .extract(&blank_page(400, 300));

        assert_eq!(page.blocks_processed, 1);
        assert_eq!(page.regions.len(), 2);
        assert_eq!(page.raw_text, "[REGION:Text|2|bbox:10,100,200,140]\nCH211");
    }

    #[test]
    fn degenerate_regions_do_not_count_as_blocks() {
        let ocr = Arc::new(FakeOcr::new(vec![Ok(OcrOutput::text("kept"))]));
        let detector = FakeDetector::new(vec![
            block("Text", 900, 900, 950, 950),
            block("Text", 10, 10, 200, 50),
        ]);
        let page = orchestrator(&ocr)
            .with_layout(LayoutCapability::detector(detector))
            .extract(&blank_page(400, 300));

        assert_eq!(page.blocks_processed, 1);
        assert_eq!(page.regions.len(), 1);
        assert_eq!(page.regions[0].index, 1);
        assert_eq!(ocr.modes().len(), 1);
    }

    #[test]
    fn inverted_detector_box_is_recognized_not_fatal() {
        let ocr = Arc::new(FakeOcr::new(vec![Ok(OcrOutput::text("Span P17-P18"))]));
        let detector = FakeDetector::new(vec![DetectedBlock {
            label: "Text".into(),
            bbox: BoundingBox { x1: 300, y1: 100, x2: 50, y2: 150 },
        }]);
        let page = orchestrator(&ocr)
            .with_layout(LayoutCapability::detector(detector))
            .extract(&blank_page(400, 300));

        assert!(page.error.is_none());
        assert_eq!(page.regions[0].bbox, BoundingBox::new(50, 100, 300, 150));
        assert_eq!(
            page.raw_text,
            "[REGION:Text|1|bbox:50,100,300,150]\nSpan P17-P18"
        );
        assert_eq!(ocr.sizes(), vec![(274, 54)]);
    }

    #[test]
    fn all_degenerate_regions_fall_back_to_full_page() {
        let ocr = Arc::new(FakeOcr::new(vec![Ok(OcrOutput::text("whole page"))]));
        let detector = FakeDetector::new(vec![block("Text", 900, 900, 950, 950)]);
        let page = orchestrator(&ocr)
            .with_layout(LayoutCapability::detector(detector))
            .extract(&blank_page(400, 300));

        assert_eq!(page.regions[0].kind, RegionKind::FullPage);
        assert_eq!(page.blocks_processed, 1);
    }

    #[test]
    fn region_text_is_capped_in_metadata_only() {
        let long = "x".repeat(3500);
        let ocr = Arc::new(FakeOcr::new(vec![Ok(OcrOutput::text(long.clone()))]));
        let page = orchestrator(&ocr).extract(&blank_page(400, 300));

        assert_eq!(page.regions[0].text.chars().count(), 3000);
        assert_eq!(page.regions[0].char_count, 3500);
        assert!(page.raw_text.ends_with(&long));
    }

    #[test]
    fn recognition_failure_is_recorded_per_region() {
        let ocr = Arc::new(FakeOcr::new(vec![
            Err(FieldscanError::RecognitionFailure("timeout".into())),
            Err(FieldscanError::RecognitionFailure("timeout again".into())),
        ]));
        let page = orchestrator(&ocr).extract(&blank_page(400, 300));

        assert!(page.error.is_none());
        assert_eq!(page.blocks_processed, 0);
        assert_eq!(page.raw_text, "");
        assert!(page.regions[0].error.as_deref().unwrap().contains("timeout again"));
    }

    #[test]
    fn missing_ocr_client_fails_the_page_softly() {
        let page = ExtractionOrchestrator::new(OcrClientSlot::new()).extract(&blank_page(50, 50));
        assert_eq!(page.blocks_processed, 0);
        assert!(page.error.unwrap().contains("not configured"));
    }

    #[test]
    fn zero_size_page_fails_softly() {
        let ocr = Arc::new(FakeOcr::new(Vec::new()));
        let page = orchestrator(&ocr).extract(&DynamicImage::new_luma8(0, 0));
        assert!(page.error.is_some());
        assert!(page.regions.is_empty());
    }
}
