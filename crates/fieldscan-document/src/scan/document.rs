// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Multi-page extraction: runs the orchestrator over every page and folds the
// page results into one document text.

use std::path::Path;

use fieldscan_core::{PageResult, Region};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::image::processor::ImageProcessor;
use crate::scan::orchestrator::ExtractionOrchestrator;

/// Outcome of one page within a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    /// 1-based page number.
    pub page: usize,
    pub blocks_processed: usize,
    /// Characters of cleaned text the page contributed.
    pub chars: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A region together with the page it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRegion {
    pub page: usize,
    #[serde(flatten)]
    pub region: Region,
}

/// Combined text of a multi-page document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentText {
    /// Cleaned page texts joined by a blank line.
    pub text: String,
    pub blocks_processed: usize,
    pub pages: Vec<PageSummary>,
    pub regions: Vec<PageRegion>,
}

impl DocumentText {
    /// No page produced any text.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Regions of all pages in document order, for the reconciler's summary.
    pub fn region_summaries(&self) -> Vec<Region> {
        self.regions.iter().map(|r| r.region.clone()).collect()
    }

    pub fn failed_pages(&self) -> impl Iterator<Item = &PageSummary> {
        self.pages.iter().filter(|p| p.error.is_some())
    }
}

/// Extracts text from every page of a document, in order.
pub struct DocumentExtractor {
    orchestrator: ExtractionOrchestrator,
}

impl DocumentExtractor {
    pub fn new(orchestrator: ExtractionOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &ExtractionOrchestrator {
        &self.orchestrator
    }

    /// Extract already-decoded pages. A failed page never aborts the rest.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub fn extract_pages(&self, pages: &[DynamicImage]) -> DocumentText {
        let results = pages.iter().map(|page| self.orchestrator.extract(page));
        fold_pages(results)
    }

    /// Load and extract page images from disk. An unreadable file is
    /// recorded as a failed page.
    #[instrument(skip_all, fields(pages = paths.len()))]
    pub fn extract_files<P: AsRef<Path>>(&self, paths: &[P]) -> DocumentText {
        let results = paths.iter().map(|path| match ImageProcessor::open(path) {
            Ok(image) => self.orchestrator.extract(image.as_dynamic()),
            Err(err) => {
                warn!(path = %path.as_ref().display(), error = %err, "Could not load page image");
                PageResult::failed(err.to_string())
            }
        });
        fold_pages(results)
    }
}

fn fold_pages(results: impl Iterator<Item = PageResult>) -> DocumentText {
    let mut document = DocumentText::default();
    let mut texts = Vec::new();

    for (i, result) in results.enumerate() {
        let page = i + 1;
        document.blocks_processed += result.blocks_processed;
        document.pages.push(PageSummary {
            page,
            blocks_processed: result.blocks_processed,
            chars: result.cleaned_text.chars().count(),
            error: result.error,
        });
        document
            .regions
            .extend(result.regions.into_iter().map(|region| PageRegion { page, region }));
        if !result.cleaned_text.is_empty() {
            texts.push(result.cleaned_text);
        }
    }

    document.text = texts.join("\n\n").trim().to_string();
    info!(
        pages = document.pages.len(),
        blocks = document.blocks_processed,
        chars = document.text.chars().count(),
        "Document extracted"
    );
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fieldscan_core::FieldscanError;

    use crate::scan::ocr::{OcrClientSlot, OcrOutput};
    use crate::scan::testing::{blank_page, FakeOcr};

    fn extractor(ocr: FakeOcr) -> DocumentExtractor {
        let slot = OcrClientSlot::new();
        slot.install(Arc::new(ocr)).unwrap();
        DocumentExtractor::new(ExtractionOrchestrator::new(slot))
    }

    #[test]
    fn pages_are_joined_in_order() {
        let doc = extractor(FakeOcr::new(vec![
            Ok(OcrOutput::text("page one")),
            Ok(OcrOutput::text("page two")),
        ]))
        .extract_pages(&[blank_page(100, 100), blank_page(100, 100)]);

        assert_eq!(
            doc.text,
            "[REGION:FULL_PAGE|1|bbox:0,0,0,0]\npage one\n\n[REGION:FULL_PAGE|1|bbox:0,0,0,0]\npage two"
        );
        assert_eq!(doc.blocks_processed, 2);
        assert_eq!(doc.regions.iter().map(|r| r.page).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn a_failed_page_does_not_abort_the_document() {
        let doc = extractor(FakeOcr::new(vec![Ok(OcrOutput::text("survivor"))]))
            .extract_pages(&[DynamicImage::new_luma8(0, 0), blank_page(100, 100)]);

        assert_eq!(doc.pages.len(), 2);
        assert!(doc.pages[0].error.is_some());
        assert_eq!(doc.pages[1].page, 2);
        assert!(doc.text.ends_with("survivor"));
        assert_eq!(doc.failed_pages().count(), 1);
    }

    #[test]
    fn no_text_means_empty_document() {
        let doc = extractor(FakeOcr::new(vec![
            Err(FieldscanError::RecognitionFailure("down".into())),
            Err(FieldscanError::RecognitionFailure("down".into())),
        ]))
        .extract_pages(&[blank_page(100, 100)]);

        assert!(doc.is_empty());
        assert_eq!(doc.region_summaries().len(), 1);
    }

    #[test]
    fn page_files_are_loaded_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page-1.png");
        blank_page(120, 80).save(&path).unwrap();

        let doc = extractor(FakeOcr::new(vec![Ok(OcrOutput::text("from disk"))]))
            .extract_files(&[&path]);
        assert!(doc.text.ends_with("from disk"));
        assert!(doc.failed_pages().next().is_none());
    }

    #[test]
    fn regions_serialize_with_their_page() {
        let doc = extractor(FakeOcr::new(vec![Ok(OcrOutput::text("x"))]))
            .extract_pages(&[blank_page(100, 100)]);
        let json = serde_json::to_value(&doc.regions[0]).unwrap();
        assert_eq!(json["page"], 1);
        assert_eq!(json["index"], 1);
    }

    #[test]
    fn unreadable_files_are_failed_pages() {
        let doc = extractor(FakeOcr::new(Vec::new())).extract_files(&["/nonexistent/page.png"]);
        assert!(doc.is_empty());
        assert!(doc.pages[0].error.is_some());
    }
}
