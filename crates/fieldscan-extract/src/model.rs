// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Language-model collaborator contract.

use std::sync::Arc;

use fieldscan_core::error::Result;

/// Prompt-in / text-out generation collaborator.
///
/// The returned text is expected to contain a JSON object mapping field
/// names to values, but may wrap it in prose or code fences.
pub trait LanguageModel: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;

    /// Short backend name for logs.
    fn name(&self) -> &str {
        "model"
    }
}

impl<M: LanguageModel + ?Sized> LanguageModel for Arc<M> {
    fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
