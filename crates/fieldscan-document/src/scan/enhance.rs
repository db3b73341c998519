// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Adaptive image enhancement ahead of OCR — contrast rescue for faint or
// handwritten content, tiled adaptive equalization for well-exposed scans,
// median denoising and contrast-dependent unsharp masking.

use fieldscan_core::config::{ContrastRescue, EnhancerConfig};
use fieldscan_core::error::{FieldscanError, Result};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::equalize_histogram;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use tracing::{debug, instrument, warn};

/// Enhances page images and region crops for recognition.
///
/// Both passes are infallible from the caller's point of view: if anything
/// goes wrong the input image is returned unchanged, since a degraded OCR
/// result is preferable to losing the page.
#[derive(Debug, Clone, Default)]
pub struct ImageEnhancer {
    config: EnhancerConfig,
}

impl ImageEnhancer {
    pub fn new(config: EnhancerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnhancerConfig {
        &self.config
    }

    // -- Quick pass -----------------------------------------------------------

    /// Quick single-pass rescue applied to freshly cropped regions.
    ///
    /// Faint crops (standard deviation under `region_rescue.std_threshold`)
    /// are equalized and boosted; anything else is returned as-is.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn rescue_region(&self, image: &DynamicImage) -> DynamicImage {
        match self.try_rescue_region(image) {
            Ok(Some(rescued)) => DynamicImage::ImageLuma8(rescued),
            Ok(None) => image.clone(),
            Err(err) => {
                warn!(error = %err, "Region contrast rescue failed; keeping original crop");
                image.clone()
            }
        }
    }

    fn try_rescue_region(&self, image: &DynamicImage) -> Result<Option<GrayImage>> {
        let gray = non_empty_luma(image)?;
        let std_dev = intensity_std(&gray);
        if std_dev >= self.config.region_rescue.std_threshold {
            return Ok(None);
        }
        debug!(std_dev, "Low-contrast region; applying equalization boost");
        Ok(Some(rescue_contrast(&gray, &self.config.region_rescue)))
    }

    // -- Full pass ------------------------------------------------------------

    /// Full preprocessing: grayscale, contrast rescue or adaptive
    /// equalization, median denoise, then adaptive unsharp masking.
    ///
    /// Always returns an 8-bit grayscale image unless enhancement failed, in
    /// which case the input is returned unchanged.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn preprocess(&self, image: &DynamicImage) -> DynamicImage {
        match self.try_preprocess(image) {
            Ok(enhanced) => DynamicImage::ImageLuma8(enhanced),
            Err(err) => {
                warn!(error = %err, "Preprocessing failed; using original image");
                image.clone()
            }
        }
    }

    fn try_preprocess(&self, image: &DynamicImage) -> Result<GrayImage> {
        let config = &self.config;
        let gray = non_empty_luma(image)?;
        let std_dev = intensity_std(&gray);

        let equalized = if std_dev < config.page_rescue.std_threshold {
            debug!(std_dev, "Faint page; global equalization with boost");
            rescue_contrast(&gray, &config.page_rescue)
        } else {
            debug!(std_dev, "Applying tiled adaptive equalization");
            clahe(&gray, config.clahe_clip_limit, config.clahe_tiles)?
        };

        let denoised = median_filter(&equalized, config.median_radius, config.median_radius);

        let sigma = if std_dev > config.sharp_std_threshold {
            config.sharp_sigma
        } else {
            config.soft_sigma
        };
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(FieldscanError::EnhancementFailure(format!(
                "invalid blur sigma {sigma}"
            )));
        }
        let blurred = gaussian_blur_f32(&denoised, sigma);

        Ok(weighted_difference(
            &denoised,
            &blurred,
            config.sharpen_gain,
            config.blur_weight,
        ))
    }
}

// -- Statistics ---------------------------------------------------------------

/// Population standard deviation of pixel intensities.
pub fn intensity_std(gray: &GrayImage) -> f32 {
    let count = gray.width() as f64 * gray.height() as f64;
    if count == 0.0 {
        return 0.0;
    }
    let (sum, sum_sq) = gray.pixels().fold((0f64, 0f64), |(s, sq), p| {
        let v = p.0[0] as f64;
        (s + v, sq + v * v)
    });
    let mean = sum / count;
    ((sum_sq / count - mean * mean).max(0.0)).sqrt() as f32
}

fn non_empty_luma(image: &DynamicImage) -> Result<GrayImage> {
    if image.width() == 0 || image.height() == 0 {
        return Err(FieldscanError::EnhancementFailure(format!(
            "empty image ({}x{})",
            image.width(),
            image.height()
        )));
    }
    Ok(image.to_luma8())
}

// -- Pixel operations ---------------------------------------------------------

/// Global histogram equalization followed by `saturate(|gain * v + offset|)`.
fn rescue_contrast(gray: &GrayImage, rescue: &ContrastRescue) -> GrayImage {
    let equalized = equalize_histogram(gray);
    linear_boost(&equalized, rescue.gain, rescue.offset)
}

fn linear_boost(gray: &GrayImage, gain: f32, offset: f32) -> GrayImage {
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        let v = (gain * pixel.0[0] as f32 + offset).abs().round();
        pixel.0[0] = v.min(255.0) as u8;
    }
    out
}

/// `clip(gain * base + weight * blurred)`, per pixel.
fn weighted_difference(base: &GrayImage, blurred: &GrayImage, gain: f32, weight: f32) -> GrayImage {
    GrayImage::from_fn(base.width(), base.height(), |x, y| {
        let b = base.get_pixel(x, y).0[0] as f32;
        let g = blurred.get_pixel(x, y).0[0] as f32;
        Luma([(gain * b + weight * g).round().clamp(0.0, 255.0) as u8])
    })
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into a `tiles x tiles` grid; each tile gets its own
/// clipped equalization table and every pixel is mapped by bilinear
/// interpolation between the four nearest tile tables.
fn clahe(gray: &GrayImage, clip_limit: f32, tiles: u32) -> Result<GrayImage> {
    if tiles == 0 {
        return Err(FieldscanError::EnhancementFailure(
            "adaptive equalization needs at least one tile".into(),
        ));
    }
    let (w, h) = gray.dimensions();
    let tile_w = w.div_ceil(tiles).max(1);
    let tile_h = h.div_ceil(tiles).max(1);
    let tiles_x = w.div_ceil(tile_w);
    let tiles_y = h.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let (x0, x1) = (tx * tile_w, ((tx + 1) * tile_w).min(w));
            let (y0, y1) = (ty * tile_h, ((ty + 1) * tile_h).min(h));
            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[gray.get_pixel(x, y).0[0] as usize] += 1;
                }
            }
            luts.push(clipped_equalization_table(&mut hist, (x1 - x0) * (y1 - y0), clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32, v: usize| luts[(ty * tiles_x + tx) as usize][v] as f32;

    Ok(GrayImage::from_fn(w, h, |x, y| {
        let v = gray.get_pixel(x, y).0[0] as usize;
        let (tx0, tx1, ax) = neighbour_tiles((x as f32 + 0.5) / tile_w as f32 - 0.5, tiles_x);
        let (ty0, ty1, ay) = neighbour_tiles((y as f32 + 0.5) / tile_h as f32 - 0.5, tiles_y);

        let top = lut_at(tx0, ty0, v) * (1.0 - ax) + lut_at(tx1, ty0, v) * ax;
        let bottom = lut_at(tx0, ty1, v) * (1.0 - ax) + lut_at(tx1, ty1, v) * ax;
        Luma([(top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8])
    }))
}

/// Indices of the two tiles surrounding fractional tile coordinate `f`, and
/// the interpolation weight of the second one.
fn neighbour_tiles(f: f32, count: u32) -> (u32, u32, f32) {
    let base = f.floor();
    let weight = f - base;
    let last = count as i64 - 1;
    let i0 = (base as i64).clamp(0, last) as u32;
    let i1 = (base as i64 + 1).clamp(0, last) as u32;
    (i0, i1, weight)
}

/// Clip a tile histogram at `clip_limit * area / 256`, redistribute the
/// excess uniformly, and return the cumulative equalization table.
fn clipped_equalization_table(hist: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);

    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    let batch = excess / 256;
    let mut residual = excess % 256;
    for bin in hist.iter_mut() {
        *bin += batch;
    }
    if residual > 0 {
        let step = (256 / residual).max(1) as usize;
        for bin in hist.iter_mut().step_by(step) {
            if residual == 0 {
                break;
            }
            *bin += 1;
            residual -= 1;
        }
    }

    let scale = 255.0 / area.max(1) as f32;
    let mut table = [0u8; 256];
    let mut cdf = 0u32;
    for (slot, &count) in table.iter_mut().zip(hist.iter()) {
        cdf += count;
        *slot = (cdf as f32 * scale).round().min(255.0) as u8;
    }
    table
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Vertical stripes alternating between two close gray levels.
    fn faint_stripes(w: u32, h: u32, lo: u8, hi: u8) -> GrayImage {
        GrayImage::from_fn(w, h, |x, _| Luma([if (x / 4) % 2 == 0 { lo } else { hi }]))
    }

    /// Light paper with a 4-pixel dark stroke every 40 columns.
    fn faint_strokes(w: u32, h: u32, paper: u8, ink: u8) -> GrayImage {
        GrayImage::from_fn(w, h, |x, _| Luma([if x % 40 < 4 { ink } else { paper }]))
    }

    #[test]
    fn std_of_uniform_image_is_zero() {
        let img = GrayImage::from_pixel(20, 10, Luma([77u8]));
        assert_eq!(intensity_std(&img), 0.0);
    }

    #[test]
    fn std_of_two_levels() {
        let img = faint_stripes(64, 8, 120, 130);
        assert!((intensity_std(&img) - 5.0).abs() < 1e-3);
    }

    #[test]
    fn faint_image_is_rescued_by_full_pass() {
        let img = DynamicImage::ImageLuma8(faint_strokes(80, 40, 130, 120));
        let out = ImageEnhancer::default().preprocess(&img).to_luma8();
        assert_eq!(out.dimensions(), (80, 40));
        assert!(
            intensity_std(&out) > 25.0,
            "expected a rescued contrast, got std {}",
            intensity_std(&out)
        );
    }

    #[test]
    fn quick_pass_leaves_contrasty_crops_alone() {
        let img = DynamicImage::ImageLuma8(faint_stripes(32, 32, 10, 240));
        let out = ImageEnhancer::default().rescue_region(&img);
        assert_eq!(out.to_luma8(), img.to_luma8());
    }

    #[test]
    fn quick_pass_rescues_faint_crops() {
        let img = DynamicImage::ImageLuma8(faint_stripes(32, 32, 120, 130));
        let out = ImageEnhancer::default().rescue_region(&img).to_luma8();
        assert!(intensity_std(&out) > intensity_std(&img.to_luma8()));
    }

    #[test]
    fn empty_image_is_returned_unchanged() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        let enhancer = ImageEnhancer::default();
        assert_eq!(enhancer.preprocess(&img).width(), 0);
        assert_eq!(enhancer.rescue_region(&img).height(), 0);
    }

    #[test]
    fn color_input_becomes_grayscale() {
        let rgb = image::RgbImage::from_pixel(40, 30, image::Rgb([200, 10, 10]));
        let out = ImageEnhancer::default().preprocess(&DynamicImage::ImageRgb8(rgb));
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
        assert_eq!((out.width(), out.height()), (40, 30));
    }

    #[test]
    fn clahe_spreads_a_narrow_range() {
        // 41 gray levels (100..=140), equally populated, one tile.
        let img = GrayImage::from_fn(164, 10, |x, _| Luma([100 + (x / 4) as u8]));
        let out = clahe(&img, 5.0, 1).unwrap();
        let min = out.pixels().map(|p| p.0[0]).min().unwrap();
        let max = out.pixels().map(|p| p.0[0]).max().unwrap();
        assert!(min < 100, "min {min}");
        assert!(max > 140, "max {max}");
    }

    #[test]
    fn clahe_handles_images_smaller_than_grid() {
        let img = GrayImage::from_fn(3, 2, |x, y| Luma([(x * 40 + y * 10) as u8]));
        let out = clahe(&img, 5.0, 6).unwrap();
        assert_eq!(out.dimensions(), (3, 2));
    }

    #[test]
    fn clahe_rejects_zero_tiles() {
        let img = GrayImage::from_pixel(4, 4, Luma([1u8]));
        assert!(clahe(&img, 5.0, 0).is_err());
    }

    #[test]
    fn equalization_table_is_monotonic() {
        let mut hist = [0u32; 256];
        hist[10] = 500;
        hist[200] = 12;
        let table = clipped_equalization_table(&mut hist, 512, 5.0);
        assert!(table.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(table[255], 255);
    }

    #[test]
    fn boost_saturates() {
        let img = GrayImage::from_pixel(2, 2, Luma([200u8]));
        assert_eq!(linear_boost(&img, 1.8, 10.0).get_pixel(0, 0).0[0], 255);
        let dark = GrayImage::from_pixel(2, 2, Luma([10u8]));
        assert_eq!(linear_boost(&dark, 1.5, 8.0).get_pixel(1, 1).0[0], 23);
    }
}
