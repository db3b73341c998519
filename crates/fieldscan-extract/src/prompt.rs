// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Prompt assembly for the language-model pass.

use std::sync::LazyLock;

use fieldscan_core::config::ReconcilerConfig;
use fieldscan_core::{PrefillMap, Region};
use regex::Regex;

const CONTEXT_HEADER: &str = "\
You are an intelligent field extraction system.
You are reading OCR text that represents an engineering form or checklist.
Treat the text as a structured document, not plain text.
Infer logical groupings even when alignment or OCR spacing is broken.

Typical document content includes:
- Project metadata (project name, client, contractor, location, chainage)
- Component details (structure ID, span ID, bearing IDs)
- Measurement results and tolerances
- Engineer sign-offs and dates

Think like an engineer reading the checklist.
Associate field labels and nearby values even if on separate lines.
Never hallucinate; leave blank if uncertain.
Preserve exact formatting (including leading zeros).
Output valid JSON only.";

const RULES: &str = "\
Rules:
1) Prefer deterministic regex results when clearly valid.
2) CH### → Structure ID, P##-P## → Span ID.
3) Never invent data; leave field empty if unsure.
4) Prefer values from same region as label.
5) Preserve number formats and units.";

const ONE_SHOT_EXAMPLE: &str = "\
Example:
Input:
[1] Text: RFI No: 0000220949\\n[2] Text: CH211 P17-P18
Output JSON: {\"RFI No\":\"0000220949\",\"Structure ID\":\"CH211\",\"Span ID\":\"P17-P18\"}";

static CARRIAGE_RETURNS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\r+").ok());
static NEWLINE_BURST: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\n{3,}").ok());
static LONG_SPACE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[^\S\n]{3,}").ok());

/// Final light pass over already-cleaned text before prompting: drop
/// carriage returns, cap blank-line runs at one and shorten long horizontal
/// gaps to two spaces.
pub fn pre_clean(text: &str) -> String {
    let steps: [(&LazyLock<Option<Regex>>, &str); 3] = [
        (&CARRIAGE_RETURNS, ""),
        (&NEWLINE_BURST, "\n\n"),
        (&LONG_SPACE, "  "),
    ];
    steps
        .iter()
        .fold(text.to_string(), |acc, (pattern, replacement)| match pattern.as_ref() {
            Some(re) => re.replace_all(&acc, *replacement).into_owned(),
            None => acc,
        })
        .trim()
        .to_string()
}

/// One line per region, `[index] Type: text`, for at most
/// `config.max_summary_regions` regions.
pub fn region_summary(regions: &[Region], config: &ReconcilerConfig) -> String {
    regions
        .iter()
        .take(config.max_summary_regions)
        .map(|region| {
            let text: String = region.text.chars().take(config.summary_chars).collect();
            format!(
                "[{}] {}: {}",
                region.index,
                region.kind,
                text.replace('\n', "\\n")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Everything that goes into one reconciliation prompt.
pub struct PromptInput<'a> {
    pub text: &'a str,
    pub prefill: &'a PrefillMap,
    pub regions: &'a [Region],
    pub fields: &'a [String],
}

/// Compose the full prompt for `input`.
pub fn build_prompt(input: &PromptInput<'_>, config: &ReconcilerConfig) -> String {
    let mut prompt = String::with_capacity(config.text_budget + 2048);

    prompt.push_str(CONTEXT_HEADER);
    prompt.push_str("\n\n");

    if !input.prefill.is_empty() {
        let hint = serde_json::to_string(input.prefill).unwrap_or_default();
        prompt.push_str("Already found (regex prefill): ");
        prompt.push_str(&hint);
        prompt.push('\n');
    }

    let bounded: String = input.text.chars().take(config.text_budget).collect();
    prompt.push_str("OCR Text (truncated):\n");
    prompt.push_str(&bounded);
    prompt.push_str("\n\n");

    prompt.push_str(&format!(
        "Region summary (top {} regions):\n",
        config.max_summary_regions
    ));
    prompt.push_str(&region_summary(input.regions, config));
    prompt.push_str("\n\n");

    prompt.push_str(RULES);
    prompt.push_str("\n\n");
    prompt.push_str(ONE_SHOT_EXAMPLE);
    prompt.push_str("\n\n");

    prompt.push_str("Fields to extract:\n");
    let fields: Vec<String> = input.fields.iter().map(|f| format!("- {f}")).collect();
    prompt.push_str(&fields.join("\n"));
    prompt.push_str("\n\nOutput only valid JSON mapping each field to its value.");

    prompt
}
