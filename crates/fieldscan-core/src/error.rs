// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for fieldscan.

use thiserror::Error;

/// Top-level error type for all fieldscan operations.
#[derive(Debug, Error)]
pub enum FieldscanError {
    // -- Capabilities --
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    // -- Image / OCR --
    #[error("degenerate region geometry: {0}")]
    RegionGeometryDegenerate(String),

    #[error("image enhancement failed: {0}")]
    EnhancementFailure(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("text recognition failed: {0}")]
    RecognitionFailure(String),

    #[error("page extraction failed: {0}")]
    PageExtractionFailure(String),

    // -- Field reconciliation --
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unparseable model response: {reason}")]
    ModelResponseUnparseable { reason: String, raw_output: String },

    #[error("language model call failed: {0}")]
    ModelCallFailure(String),

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FieldscanError {
    /// Whether the pipeline recovers from this error locally (reduced output
    /// plus a diagnostic) rather than failing the call that raised it.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::CapabilityUnavailable(_)
            | Self::RegionGeometryDegenerate(_)
            | Self::EnhancementFailure(_)
            | Self::RecognitionFailure(_)
            | Self::PageExtractionFailure(_) => true,

            Self::InvalidInput(_)
            | Self::ModelResponseUnparseable { .. }
            | Self::ModelCallFailure(_)
            | Self::ImageError(_)
            | Self::Config(_)
            | Self::Serialization(_) => false,

            Self::Io(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::Interrupted
            ),
        }
    }

    /// Raw model output attached to the error, if any (for diagnostics).
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::ModelResponseUnparseable { raw_output, .. } => Some(raw_output),
            _ => None,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FieldscanError>;
