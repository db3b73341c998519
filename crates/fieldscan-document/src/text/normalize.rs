// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR text normalizer.
//
// Cleans combined page text while keeping `[REGION:...]` markers
// byte-identical and the blank-line gap between regions intact. Cleaning is
// idempotent: `clean(clean(x)) == clean(x)`.
//
// Adjacent digit groups separated by whitespace are never merged; multi-token
// numbers (e.g. `0000 220949`) must reach the field reconciler as written.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{instrument, warn};

/// OCR misread corrections, applied in order.
const CORRECTIONS: &[(&str, &str)] = &[
    // Letter O / I read in place of a leading digit.
    (r"\bO(\d)", "0${1}"),
    (r"\bI(\d)", "1${1}"),
    (r"\b0I\b", "01"),
    // Span codes with the hyphen read as a zero.
    (r"\bP16017\b", "P16-P17"),
    (r"\bP(\d{2})0(\d{2})\b", "P${1}-${2}"),
    (r"\\[lI]\b", "1"),
    // Ring-shaped noise read as brackets and o's.
    (r"[\[\]oO]{3,}", "0"),
];

/// Upper bound on passes over the correction table. Every rule shortens the
/// text or removes a misread letter, so the table settles well before this.
const MAX_CORRECTION_PASSES: usize = 8;

/// Private-use delimiters around a protected marker's index.
const PLACEHOLDER_OPEN: char = '\u{E000}';
const PLACEHOLDER_CLOSE: char = '\u{E001}';

/// Anything outside word characters, whitespace, layout punctuation and the
/// placeholder delimiters.
const DISALLOWED: &str = r"[^\w\s.\-/@:,%()#&\[\]|\x{E000}\x{E001}]";

static MARKER: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"\[REGION:[^\]]+\]"));
static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"\x{E000}(\d+)\x{E001}"));
static NEWLINE_BURST: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"\n{3,}"));
static DISALLOWED_CHARS: LazyLock<Option<Regex>> = LazyLock::new(|| compile(DISALLOWED));
static CONTROL_CHARS: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"[\x00-\x1F\x7F]+"));
static DATE: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(\b\d{1,2})[./-](\d{1,2})[./-](\d{2,4}\b)"));

static CORRECTION_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    CORRECTIONS
        .iter()
        .filter_map(|(pattern, replacement)| compile(pattern).map(|re| (re, *replacement)))
        .collect()
});

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            warn!(pattern, error = %err, "Skipping text rule that failed to compile");
            None
        }
    }
}

/// Cleans recognised text for downstream field extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Clean `text`. Empty input yields an empty string.
    #[instrument(skip_all, fields(chars = text.len()))]
    pub fn clean(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let (protected, markers) = protect_markers(text);
        let corrected = apply_corrections(&protected);
        let settled = settle_whitespace(&corrected);
        let stripped = strip_disallowed(&settled);
        let restored = restore_markers(&stripped, &markers);
        let dated = normalize_dates(&restored);

        dated.trim().to_string()
    }
}

// -- Steps ------------------------------------------------------------------

/// Swap every marker for a numbered placeholder, returning the markers in
/// order of appearance. Stray delimiter characters in the input become
/// spaces so only real placeholders are restored.
fn protect_markers(text: &str) -> (String, Vec<String>) {
    let text = text.replace([PLACEHOLDER_OPEN, PLACEHOLDER_CLOSE], " ");
    let Some(marker) = MARKER.as_ref() else {
        return (text, Vec::new());
    };
    let mut markers = Vec::new();
    let protected = marker.replace_all(&text, |caps: &Captures| {
        let placeholder = format!("{PLACEHOLDER_OPEN}{}{PLACEHOLDER_CLOSE}", markers.len());
        markers.push(caps[0].to_string());
        placeholder
    });
    (protected.into_owned(), markers)
}

fn restore_markers(text: &str, markers: &[String]) -> String {
    if markers.is_empty() {
        return text.to_string();
    }
    let Some(placeholder) = PLACEHOLDER.as_ref() else {
        return text.to_string();
    };
    placeholder
        .replace_all(text, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| markers.get(i))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Run the correction table until a pass changes nothing, so the output of
/// a late rule (ring noise becoming `0`) is seen by the earlier ones.
fn apply_corrections(text: &str) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_CORRECTION_PASSES {
        let next = correction_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn correction_pass(text: &str) -> String {
    CORRECTION_RULES
        .iter()
        .fold(text.to_string(), |acc, (pattern, replacement)| {
            pattern.replace_all(&acc, *replacement).into_owned()
        })
}

/// Collapse whitespace runs within each line to one space, trim every line,
/// then cap blank-line runs at one.
///
/// Lines are trimmed before newline bursts are collapsed so that lines
/// emptied by trimming cannot leave a burst behind.
fn settle_whitespace(text: &str) -> String {
    let lines: Vec<String> = text
        .split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect();
    let joined = lines.join("\n");
    match NEWLINE_BURST.as_ref() {
        Some(burst) => burst.replace_all(&joined, "\n\n").into_owned(),
        None => joined,
    }
}

/// Replace disallowed characters with a space and re-settle whitespace.
fn strip_disallowed(text: &str) -> String {
    let pattern = DISALLOWED_CHARS.as_ref().or(CONTROL_CHARS.as_ref());
    match pattern {
        Some(pattern) => settle_whitespace(&pattern.replace_all(text, " ")),
        None => text.to_string(),
    }
}

fn normalize_dates(text: &str) -> String {
    match DATE.as_ref() {
        Some(date) => date.replace_all(text, "${1}/${2}/${3}").into_owned(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "[REGION:Text|1|bbox:10,20,300,80]\nDate:   12.05.2024  \n\n\n\n\
                        [REGION:Table|2|bbox:10,100,300,160]\nRFI No: 0000220949   CH211 P17-P18\n";

    fn markers_of(text: &str) -> Vec<String> {
        MARKER
            .as_ref()
            .unwrap()
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    #[test]
    fn cleans_a_two_region_page() {
        let cleaned = TextNormalizer::new().clean(PAGE);
        assert_eq!(
            cleaned,
            "[REGION:Text|1|bbox:10,20,300,80]\nDate: 12/05/2024\n\n\
             [REGION:Table|2|bbox:10,100,300,160]\nRFI No: 0000220949 CH211 P17-P18"
        );
    }

    #[test]
    fn markers_survive_byte_identical_and_in_order() {
        let input = "[REGION:Text|1|bbox:0,0,5,5]\nab*c ~ oOo\n\n\
                     [REGION:FULL_PAGE|1|bbox:0,0,0,0]\nx\n\n\
                     [REGION:We!rd  type*|7|bbox:9,9,9,9]\ny";
        let cleaned = TextNormalizer::new().clean(input);
        assert_eq!(markers_of(&cleaned), markers_of(input));
        assert_eq!(markers_of(&cleaned).len(), 3);
    }

    #[test]
    fn cleaning_is_idempotent() {
        let normalizer = TextNormalizer::new();
        let samples = [
            PAGE,
            "  \n \n \n a \n \t \n \n b  ",
            "O5 I7 0I P16017 P17018 \\l ]]] \u{00a0}caf\u{00e9}",
            "x\n\n*\n\n*\n\ny",
            "[REGION:Title|3|bbox:1,2,3,4]\n\n\n\u{2028}  12-5-24 & 50%  (a|b) #9",
            "[REGION:Text|1|bbox:0,0,5,5]\nRFI oooI",
            "P16ooo17",
            "Iooo",
            "span P16[]o17 and O]]]5",
            "",
        ];
        for sample in samples {
            let once = normalizer.clean(sample);
            let twice = normalizer.clean(&once);
            assert_eq!(once, twice, "not idempotent for {sample:?}");
            assert_eq!(markers_of(&once), markers_of(&twice));
        }
    }

    #[test]
    fn ring_noise_feeds_earlier_corrections() {
        let normalizer = TextNormalizer::new();
        assert_eq!(normalizer.clean("RFI oooI"), "RFI 01");
        assert_eq!(normalizer.clean("P16ooo17"), "P16-P17");
        assert_eq!(normalizer.clean("Iooo"), "10");
    }

    #[test]
    fn literal_placeholder_text_is_not_a_marker() {
        let input = "[REGION:Text|1|bbox:0,0,5,5]\nsee __REGION_0__ and \u{E000}0\u{E001}";
        let cleaned = TextNormalizer::new().clean(input);
        assert_eq!(markers_of(&cleaned), markers_of(input));
        assert_eq!(
            cleaned,
            "[REGION:Text|1|bbox:0,0,5,5]\nsee __REGION_0__ and 0"
        );
    }

    #[test]
    fn applies_misread_corrections() {
        let normalizer = TextNormalizer::new();
        assert_eq!(normalizer.clean("RFI O0220949"), "RFI 00220949");
        assert_eq!(normalizer.clean("I2 units"), "12 units");
        assert_eq!(normalizer.clean("span P16017"), "span P16-P17");
        assert_eq!(normalizer.clean("span P17018"), "span P17-18");
        assert_eq!(normalizer.clean("ring ooOo here"), "ring 0 here");
        assert_eq!(normalizer.clean("Good book"), "Good book");
    }

    #[test]
    fn keeps_lines_separate() {
        let cleaned = TextNormalizer::new().clean("a   b \t c\n  d\n\n\n\ne");
        assert_eq!(cleaned, "a b c\nd\n\ne");
    }

    #[test]
    fn strips_symbols_outside_allow_list() {
        let cleaned = TextNormalizer::new().clean("Cost: $5 * 3 = 15 \u{20ac}\nkeep: a/b-c@d,e%(f)#g&h[i]|j.");
        assert_eq!(cleaned, "Cost: 5 3 15\nkeep: a/b-c@d,e%(f)#g&h[i]|j.");
    }

    #[test]
    fn strips_control_characters() {
        let cleaned = TextNormalizer::new().clean("bell\u{7}here");
        assert_eq!(cleaned, "bell here");
    }

    #[test]
    fn normalizes_dates_to_slashes() {
        let normalizer = TextNormalizer::new();
        assert_eq!(normalizer.clean("on 1-2-24"), "on 1/2/24");
        assert_eq!(normalizer.clean("on 12.05.2024"), "on 12/05/2024");
        assert_eq!(normalizer.clean("on 12/05/2024"), "on 12/05/2024");
    }

    #[test]
    fn never_merges_separated_digits() {
        let cleaned = TextNormalizer::new().clean("RFI 0000 220949\n12 34");
        assert_eq!(cleaned, "RFI 0000 220949\n12 34");
    }

    #[test]
    fn empty_and_blank_inputs() {
        let normalizer = TextNormalizer::new();
        assert_eq!(normalizer.clean(""), "");
        assert_eq!(normalizer.clean(" \n\n\t "), "");
    }
}
