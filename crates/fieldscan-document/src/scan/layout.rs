// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layout capability — optional region detection and padded region cropping.
//
// A layout detector is a pluggable collaborator. Whether one is present is
// decided once, when the `LayoutCapability` is built; the extraction loop
// never re-checks a global flag.

use fieldscan_core::config::LayoutConfig;
use fieldscan_core::error::{FieldscanError, Result};
use fieldscan_core::{BoundingBox, RegionKind};
use image::DynamicImage;
use tracing::{debug, info, instrument, warn};

/// A raw block reported by a layout detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedBlock {
    /// Detector label, e.g. `"Text"`, `"Title"`, `"Figure"`.
    pub label: String,
    pub bbox: BoundingBox,
}

/// Layout detection collaborator.
pub trait RegionDetector: Send + Sync {
    /// Detect layout blocks in `image`, in any order.
    fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectedBlock>>;
}

/// Geometry and type of one text-bearing region, before recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionGeometry {
    /// 1-based position in reading order.
    pub index: usize,
    pub kind: RegionKind,
    pub bbox: BoundingBox,
}

/// A region crop ready for enhancement and recognition.
pub struct RegionCrop {
    pub geometry: RegionGeometry,
    pub image: DynamicImage,
}

/// Region detection capability, selected once at startup.
pub enum LayoutCapability {
    /// A layout detector is available.
    Detector(Box<dyn RegionDetector>),
    /// No detector; every page is processed whole.
    NoDetector,
}

impl LayoutCapability {
    pub fn detector(detector: impl RegionDetector + 'static) -> Self {
        Self::Detector(Box::new(detector))
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Detector(_))
    }

    /// Detect text-bearing regions in reading order (top-to-bottom, then
    /// left-to-right).
    ///
    /// Non-text blocks are discarded and boxes are put in corner order. A
    /// detector failure is logged and reported as "no regions", never as an
    /// error.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect_regions(&self, image: &DynamicImage) -> Vec<RegionGeometry> {
        let detector = match self {
            Self::Detector(detector) => detector,
            Self::NoDetector => return Vec::new(),
        };

        let blocks = match detector.detect(image) {
            Ok(blocks) => blocks,
            Err(err) => {
                warn!(error = %err, "Layout detection failed; treating page as having no regions");
                return Vec::new();
            }
        };

        let mut regions: Vec<(RegionKind, BoundingBox)> = blocks
            .into_iter()
            .filter_map(|block| {
                RegionKind::from_label(&block.label).map(|kind| (kind, block.bbox.normalized()))
            })
            .collect();
        regions.sort_by_key(|(_, bbox)| bbox.reading_order_key());

        debug!(regions = regions.len(), "Text regions detected");
        regions
            .into_iter()
            .enumerate()
            .map(|(i, (kind, bbox))| RegionGeometry {
                index: i + 1,
                kind,
                bbox,
            })
            .collect()
    }
}

/// Crop every region out of `image`, padded on each side by
/// `config.crop_padding` of the region's own size and clipped to the image.
///
/// Regions whose clipped box has no area are dropped; the indices of the
/// remaining regions are left untouched.
#[instrument(skip_all, fields(regions = regions.len()))]
pub fn crop_regions(
    image: &DynamicImage,
    regions: &[RegionGeometry],
    config: &LayoutConfig,
) -> Vec<RegionCrop> {
    let crops: Vec<RegionCrop> = regions
        .iter()
        .filter_map(|geometry| {
            let padded = match padded_box(
                geometry.bbox,
                image.width(),
                image.height(),
                config.crop_padding,
            ) {
                Ok(padded) => padded,
                Err(err) => {
                    debug!(index = geometry.index, error = %err, "Dropping region");
                    return None;
                }
            };
            Some(RegionCrop {
                geometry: *geometry,
                image: image.crop_imm(padded.x1, padded.y1, padded.width(), padded.height()),
            })
        })
        .collect();
    info!(kept = crops.len(), dropped = regions.len() - crops.len(), "Regions cropped");
    crops
}

/// Pad `bbox` by `padding` of its width/height (truncated to whole pixels)
/// and clip to a `width x height` image.
///
/// # Errors
///
/// [`FieldscanError::RegionGeometryDegenerate`] when the clipped box has no
/// area.
pub fn padded_box(bbox: BoundingBox, width: u32, height: u32, padding: f32) -> Result<BoundingBox> {
    let bbox = bbox.normalized();
    let pad_x = (bbox.width() as f32 * padding) as u32;
    let pad_y = (bbox.height() as f32 * padding) as u32;

    let x1 = bbox.x1.saturating_sub(pad_x);
    let y1 = bbox.y1.saturating_sub(pad_y);
    let x2 = bbox.x2.saturating_add(pad_x).min(width);
    let y2 = bbox.y2.saturating_add(pad_y).min(height);

    if x2 <= x1 || y2 <= y1 {
        return Err(FieldscanError::RegionGeometryDegenerate(format!(
            "bbox {} has no area inside a {}x{} page",
            bbox, width, height
        )));
    }
    Ok(BoundingBox { x1, y1, x2, y2 })
}
