// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Field reconciler — deterministic prefill, language-model pass and merge.

use fieldscan_core::config::ReconcilerConfig;
use fieldscan_core::error::{FieldscanError, Result};
use fieldscan_core::{FieldMap, PrefillMap, Region};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::model::LanguageModel;
use crate::prefill::PrefillRules;
use crate::prompt::{build_prompt, pre_clean, PromptInput};
use crate::response::parse_model_response;

/// Maps cleaned document text onto a caller-chosen list of fields.
///
/// ```ignore
/// let reconciler = FieldReconciler::new(GeminiClient::from_env()?);
/// let fields = reconciler.extract_fields(&doc.text, &["RFI No", "Span ID"], Some(&regions))?;
/// println!("{}", serde_json::to_string_pretty(&fields)?);
/// ```
pub struct FieldReconciler {
    model: Option<Box<dyn LanguageModel>>,
    rules: PrefillRules,
    config: ReconcilerConfig,
}

impl FieldReconciler {
    // -- Construction ---------------------------------------------------------

    pub fn new(model: impl LanguageModel + 'static) -> Self {
        Self {
            model: Some(Box::new(model)),
            rules: PrefillRules::default(),
            config: ReconcilerConfig::default(),
        }
    }

    /// A reconciler without a language model; only
    /// [`extract_fields_deterministic`](Self::extract_fields_deterministic)
    /// produces values.
    pub fn deterministic() -> Self {
        Self {
            model: None,
            rules: PrefillRules::default(),
            config: ReconcilerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_rules(mut self, rules: PrefillRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    // -- Extraction -----------------------------------------------------------

    /// Deterministic values found in `text`, after the pre-prompt clean.
    pub fn prefill(&self, text: &str) -> PrefillMap {
        self.rules.apply(&pre_clean(text))
    }

    /// Extract `fields` from `text` using prefill and the language model.
    ///
    /// Every requested field appears in the result exactly once; a model
    /// value wins when non-empty, then the prefill value, then `""`.
    ///
    /// # Errors
    ///
    /// - [`FieldscanError::InvalidInput`] for blank text or no fields.
    /// - [`FieldscanError::CapabilityUnavailable`] without a model.
    /// - [`FieldscanError::ModelCallFailure`] when the model call fails or
    ///   returns nothing.
    /// - [`FieldscanError::ModelResponseUnparseable`] when no JSON object can
    ///   be recovered; the raw answer is attached.
    #[instrument(skip_all, fields(chars = text.len(), requested = fields.len()))]
    pub fn extract_fields<S: AsRef<str>>(
        &self,
        text: &str,
        fields: &[S],
        regions: Option<&[Region]>,
    ) -> Result<FieldMap> {
        let fields = requested_fields(text, fields)?;
        let model = self.model.as_deref().ok_or_else(|| {
            FieldscanError::CapabilityUnavailable("no language model configured".into())
        })?;

        let cleaned = pre_clean(text);
        let prefill = self.rules.apply(&cleaned);
        debug!(?prefill, "Prefill");

        let prompt = build_prompt(
            &PromptInput {
                text: &cleaned,
                prefill: &prefill,
                regions: regions.unwrap_or_default(),
                fields: &fields,
            },
            &self.config,
        );
        debug!(
            prompt_head = %prompt.chars().take(4000).collect::<String>(),
            "Prompt built"
        );

        let raw = model.generate(&prompt).map_err(|err| match err {
            FieldscanError::ModelCallFailure(_) => err,
            other => FieldscanError::ModelCallFailure(other.to_string()),
        })?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(FieldscanError::ModelCallFailure(format!(
                "empty response from {}",
                model.name()
            )));
        }
        debug!(raw_output = %raw, "Model answered");

        let answer = parse_model_response(raw).inspect_err(|err| {
            warn!(error = %err, "Model response could not be parsed");
        })?;

        let merged = merge(&fields, &answer, &prefill);
        info!(
            requested = merged.len(),
            filled = merged.iter().filter(|f| !f.value.is_empty()).count(),
            prefilled = prefill.len(),
            "Fields reconciled"
        );
        Ok(merged)
    }

    /// Extract `fields` from prefill alone, as if the model had found
    /// nothing.
    #[instrument(skip_all, fields(chars = text.len(), requested = fields.len()))]
    pub fn extract_fields_deterministic<S: AsRef<str>>(
        &self,
        text: &str,
        fields: &[S],
    ) -> Result<FieldMap> {
        let fields = requested_fields(text, fields)?;
        let prefill = self.prefill(text);
        let merged = merge(&fields, &Map::new(), &prefill);
        info!(requested = merged.len(), prefilled = prefill.len(), "Fields prefilled");
        Ok(merged)
    }
}

/// Validate the inputs and return the requested fields, deduplicated in
/// request order. Names are compared trimmed but kept as the caller spelled
/// them.
fn requested_fields<S: AsRef<str>>(text: &str, fields: &[S]) -> Result<Vec<String>> {
    if text.trim().is_empty() {
        return Err(FieldscanError::InvalidInput(
            "empty or invalid document text".into(),
        ));
    }
    let mut unique: Vec<String> = Vec::with_capacity(fields.len());
    for field in fields {
        let field = field.as_ref();
        let name = field.trim();
        if !name.is_empty() && !unique.iter().any(|f| f.trim() == name) {
            unique.push(field.to_string());
        }
    }
    if unique.is_empty() {
        return Err(FieldscanError::InvalidInput("no fields provided".into()));
    }
    Ok(unique)
}

/// Model value if non-empty, else prefill value, else `""`.
fn merge(fields: &[String], answer: &Map<String, Value>, prefill: &PrefillMap) -> FieldMap {
    let mut merged = FieldMap::new();
    for field in fields {
        let name = field.trim();
        let value = answer
            .get(field)
            .or_else(|| answer.get(name))
            .and_then(model_value)
            .or_else(|| prefill.get(name).cloned())
            .unwrap_or_default();
        merged.insert(field.clone(), value);
    }
    merged
}

/// Render a model value as text; empty and falsy values count as absent.
fn model_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null | Value::Bool(false) => return None,
        Value::Bool(true) => "true".to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) if n.as_f64() == Some(0.0) => return None,
        Value::Number(n) => n.to_string(),
        Value::Array(items) if items.is_empty() => return None,
        Value::Object(map) if map.is_empty() => return None,
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}
