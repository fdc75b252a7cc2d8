//! Post-processing: deterministic cleanup of model replies.
//!
//! Even well-prompted models wrap answers in markdown fences, quote their
//! captions, prefix them with "Caption:", or sprinkle zero-width characters.
//! These cheap string rules strip those quirks without touching content.
//!
//! Caption rules (applied in order by [`clean_caption`]):
//! 1. Strip outer markdown fences
//! 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 3. Collapse all whitespace runs, including newlines, to one space
//! 4. Drop a leading `Caption:` label
//! 5. Strip one pair of wrapping quotes

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a captioner reply into a single trimmed line.
pub fn clean_caption(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = remove_invisible_chars(&s);
    let s = collapse_whitespace(&s);
    let s = strip_caption_label(&s);
    strip_wrapping_quotes(&s).to_string()
}

/// Isolate the JSON payload of a reply: fences removed, trimmed to the
/// outermost `[` … `]`. Returns `None` when there is no array at all.
pub fn json_array_slice(input: &str) -> Option<String> {
    let s = strip_markdown_fences(input);
    let start = s.find('[')?;
    let end = s.rfind(']')?;
    if end < start {
        return None;
    }
    Some(s[start..=end].to_string())
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\n(.*?)\n?```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(caps) = RE_OUTER_FENCES.captures(trimmed) {
        caps[1].to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Rule 2: Strip invisible Unicode ──────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
            )
        })
        .collect()
}

// ── Rule 3: Collapse whitespace ──────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input.trim(), " ").to_string()
}

// ── Rule 4: Drop "Caption:" label ────────────────────────────────────────────

static RE_CAPTION_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?i)caption\s*:\s*").unwrap());

fn strip_caption_label(input: &str) -> String {
    RE_CAPTION_LABEL.replace(input, "").to_string()
}

// ── Rule 5: Strip wrapping quotes ────────────────────────────────────────────

fn strip_wrapping_quotes(input: &str) -> &str {
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”')] {
        if input.len() >= 2 && input.starts_with(open) && input.ends_with(close) {
            let inner = &input[open.len_utf8()..input.len() - close.len_utf8()];
            return inner.trim();
        }
    }
    input
}
