// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.
//
// Every tunable constant of the pipeline lives here. Collaborator credentials
// (OCR / language-model API keys) are read from the environment by the
// backends themselves and never stored in this file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FieldscanError, Result};

/// Top-level pipeline settings. Missing keys in a config file take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub enhancer: EnhancerConfig,
    pub layout: LayoutConfig,
    pub orchestrator: OrchestratorConfig,
    pub reconciler: ReconcilerConfig,
}

impl PipelineConfig {
    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|err| {
            FieldscanError::Config(format!("failed to read {}: {}", path.display(), err))
        })?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write settings to a JSON file (pretty-printed).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Reject values the pipeline cannot operate with.
    pub fn validate(&self) -> Result<()> {
        let e = &self.enhancer;
        if e.sharp_sigma <= 0.0 || e.soft_sigma <= 0.0 {
            return Err(FieldscanError::Config(
                "sharpening sigmas must be positive".into(),
            ));
        }
        if e.clahe_tiles == 0 {
            return Err(FieldscanError::Config("clahe_tiles must be at least 1".into()));
        }
        if !(0.0..0.5).contains(&self.layout.crop_padding) {
            return Err(FieldscanError::Config(format!(
                "crop_padding must be in [0, 0.5), got {}",
                self.layout.crop_padding
            )));
        }
        if !(1..=100).contains(&self.orchestrator.jpeg_quality) {
            return Err(FieldscanError::Config(format!(
                "jpeg_quality must be in 1..=100, got {}",
                self.orchestrator.jpeg_quality
            )));
        }
        Ok(())
    }
}

/// Global-equalization rescue for faint / low-contrast images.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContrastRescue {
    /// Apply the rescue when the intensity standard deviation is below this.
    pub std_threshold: f32,
    /// Multiplicative gain of the post-equalization boost.
    pub gain: f32,
    /// Additive offset of the post-equalization boost.
    pub offset: f32,
}

/// Image enhancement settings.
///
/// The quick per-region pass and the full preprocessing pass each carry their
/// own [`ContrastRescue`]; they are tuned independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancerConfig {
    pub region_rescue: ContrastRescue,
    pub page_rescue: ContrastRescue,
    pub clahe_clip_limit: f32,
    /// Tiles per axis for adaptive equalization.
    pub clahe_tiles: u32,
    pub median_radius: u32,
    /// Blur sigma for high-contrast sources.
    pub sharp_sigma: f32,
    /// Blur sigma for low-contrast sources.
    pub soft_sigma: f32,
    /// Standard deviation above which `sharp_sigma` is used.
    pub sharp_std_threshold: f32,
    pub sharpen_gain: f32,
    pub blur_weight: f32,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self {
            region_rescue: ContrastRescue {
                std_threshold: 30.0,
                gain: 1.5,
                offset: 8.0,
            },
            page_rescue: ContrastRescue {
                std_threshold: 25.0,
                gain: 1.8,
                offset: 10.0,
            },
            clahe_clip_limit: 5.0,
            clahe_tiles: 6,
            median_radius: 1,
            sharp_sigma: 1.5,
            soft_sigma: 1.0,
            sharp_std_threshold: 40.0,
            sharpen_gain: 1.5,
            blur_weight: -0.5,
        }
    }
}

/// Region cropping settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Padding added on every side, as a fraction of the region's size.
    pub crop_padding: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self { crop_padding: 0.05 }
    }
}

/// Per-page extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Crops shorter than this (pixels) use the text recognition mode.
    pub short_text_max_height: u32,
    /// Crops narrower than this (pixels) use the text recognition mode.
    pub short_text_max_width: u32,
    /// Maximum characters of region text kept in region metadata.
    pub region_text_cap: usize,
    /// JPEG quality used when handing images to the OCR collaborator.
    pub jpeg_quality: u8,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            short_text_max_height: 300,
            short_text_max_width: 600,
            region_text_cap: 3000,
            jpeg_quality: 95,
        }
    }
}

/// Prompt budget settings for field reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Maximum characters of document text included in the prompt.
    pub text_budget: usize,
    pub max_summary_regions: usize,
    /// Maximum characters of each summarised region's text.
    pub summary_chars: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            text_budget: 6000,
            max_summary_regions: 5,
            summary_chars: 200,
        }
    }
}
