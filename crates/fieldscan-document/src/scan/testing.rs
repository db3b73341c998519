// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory collaborators for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use fieldscan_core::error::{FieldscanError, Result};
use fieldscan_core::RecognitionMode;
use image::{DynamicImage, GrayImage, Luma};

use crate::image::processor::ImageProcessor;
use crate::scan::layout::{DetectedBlock, RegionDetector};
use crate::scan::ocr::{OcrClient, OcrOutput};

/// Answers recognition calls from a queue and records every call.
pub struct FakeOcr {
    responses: Mutex<VecDeque<Result<OcrOutput>>>,
    calls: Mutex<Vec<(RecognitionMode, (u32, u32))>>,
}

impl FakeOcr {
    pub fn new(responses: Vec<Result<OcrOutput>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn modes(&self) -> Vec<RecognitionMode> {
        self.calls.lock().unwrap().iter().map(|(mode, _)| *mode).collect()
    }

    pub fn sizes(&self) -> Vec<(u32, u32)> {
        self.calls.lock().unwrap().iter().map(|(_, size)| *size).collect()
    }
}

impl OcrClient for FakeOcr {
    fn recognize(&self, image_bytes: &[u8], mode: RecognitionMode) -> Result<OcrOutput> {
        let decoded = ImageProcessor::from_bytes(image_bytes)?;
        self.calls
            .lock()
            .unwrap()
            .push((mode, (decoded.width(), decoded.height())));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FieldscanError::RecognitionFailure("no scripted response".into())))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Reports the same blocks for every page.
pub struct FakeDetector(Vec<DetectedBlock>);

impl FakeDetector {
    pub fn new(blocks: Vec<DetectedBlock>) -> Self {
        Self(blocks)
    }
}

impl RegionDetector for FakeDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<DetectedBlock>> {
        Ok(self.0.clone())
    }
}

pub fn blank_page(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([255u8])))
}
