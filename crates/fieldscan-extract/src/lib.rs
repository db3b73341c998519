// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// fieldscan-extract — Field reconciliation over cleaned document text.
//
// Combines a deterministic, rule-driven prefill pass with a language-model
// pass and merges the two into a flat field → value map, one entry per
// requested field.

pub mod model;
pub mod prefill;
pub mod prompt;
pub mod reconciler;
pub mod response;

#[cfg(feature = "gemini")]
pub mod gemini;

pub use model::LanguageModel;
pub use prefill::{PrefillRule, PrefillRules};
pub use reconciler::FieldReconciler;

#[cfg(feature = "gemini")]
pub use gemini::GeminiClient;
