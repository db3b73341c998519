// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Deterministic prefill — an ordered table of pattern rules, each filling at
// most one named field from the first match in the text.

use fieldscan_core::error::{FieldscanError, Result};
use fieldscan_core::PrefillMap;
use regex::Regex;
use tracing::{debug, warn};

/// Which part of a match becomes the field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    Whole,
    Group(usize),
}

/// One deterministic extraction rule.
#[derive(Debug, Clone)]
pub struct PrefillRule {
    field: String,
    pattern: Regex,
    capture: Capture,
    remove_spaces: bool,
    only_if_absent: bool,
}

impl PrefillRule {
    /// A rule filling `field` with the whole first match of `pattern`.
    pub fn new(field: impl Into<String>, pattern: &str) -> Result<Self> {
        let field = field.into();
        let pattern = Regex::new(pattern).map_err(|err| {
            FieldscanError::Config(format!("invalid prefill pattern for {field:?}: {err}"))
        })?;
        Ok(Self {
            field,
            pattern,
            capture: Capture::Whole,
            remove_spaces: false,
            only_if_absent: false,
        })
    }

    /// Take the value from capture group `group` instead of the whole match.
    pub fn group(mut self, group: usize) -> Self {
        self.capture = Capture::Group(group);
        self
    }

    /// Strip spaces out of the value (`CH 211` → `CH211`).
    pub fn remove_spaces(mut self) -> Self {
        self.remove_spaces = true;
        self
    }

    /// Only fill the field if an earlier rule has not.
    pub fn only_if_absent(mut self) -> Self {
        self.only_if_absent = true;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// The value this rule extracts from `text`, if any.
    pub fn find(&self, text: &str) -> Option<String> {
        let caps = self.pattern.captures(text)?;
        let matched = match self.capture {
            Capture::Whole => caps.get(0),
            Capture::Group(group) => caps.get(group),
        }?;
        let value = if self.remove_spaces {
            matched.as_str().replace(' ', "")
        } else {
            matched.as_str().to_string()
        };
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    }
}

/// The ordered prefill rule table.
#[derive(Debug, Clone)]
pub struct PrefillRules {
    rules: Vec<PrefillRule>,
}

impl Default for PrefillRules {
    /// Rules for engineering inspection forms, in priority order: date,
    /// labelled RFI number, structure code, span code, bare RFI number.
    fn default() -> Self {
        let table = [
            PrefillRule::new(
                "Date of Installation",
                r"\b(\d{1,2}[/\-.\s]\d{1,2}[/\-.\s]\d{2,4})\b",
            )
            .map(|r| r.group(1)),
            PrefillRule::new("RFI No", r"(?i)RFI\s*No[:\s-]*([A-Za-z0-9\-/]+)").map(|r| r.group(1)),
            PrefillRule::new("Structure ID", r"(?i)\bCH\s*\d{1,5}\b").map(|r| r.remove_spaces()),
            PrefillRule::new("Span ID", r"(?i)\bP\d{1,3}-P\d{1,3}\b"),
            PrefillRule::new("RFI No", r"\b0{3,}\d{4,10}\b").map(|r| r.only_if_absent()),
        ];

        let rules = table
            .into_iter()
            .filter_map(|rule| match rule {
                Ok(rule) => Some(rule),
                Err(err) => {
                    warn!(error = %err, "Skipping prefill rule");
                    None
                }
            })
            .collect();
        Self { rules }
    }
}

impl PrefillRules {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule with the lowest priority.
    pub fn push(&mut self, rule: PrefillRule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule over `text`. Each rule is independent; a miss never
    /// affects the others.
    pub fn apply(&self, text: &str) -> PrefillMap {
        let mut prefill = PrefillMap::new();
        for rule in &self.rules {
            if rule.only_if_absent && prefill.contains_key(&rule.field) {
                continue;
            }
            if let Some(value) = rule.find(text) {
                debug!(field = %rule.field, %value, "Prefill hit");
                prefill.insert(rule.field.clone(), value);
            }
        }
        prefill
    }
}
