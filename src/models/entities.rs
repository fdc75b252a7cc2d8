//! Entity extraction backends.
//!
//! [`RegexEntityExtractor`] is the offline default: a small set of patterns
//! tuned for figure captions in ML papers (method acronyms, dataset names,
//! capitalised multi-word names, percentages, years, quantities with units).
//! [`LlmEntityExtractor`] delegates to a text model instead.
//!
//! Both return spans in order of appearance and keep duplicates.

use super::vlm::VlmClient;
use super::{Entity, EntityExtractor};
use crate::error::ModelError;
use crate::pipeline::postprocess;
use crate::prompts::{entity_user_prompt, ENTITY_SYSTEM_PROMPT};
use edgequake_llm::ChatMessage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

// ============================================================================
// RegexEntityExtractor
// ============================================================================

/// One alternation per label. At any position the first alternative that
/// matches wins, so quantities beat bare years ("2000 frames").
static ENTITY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?P<QUANTITY>\b\d+(?:\.\d+)?\s?(?:ms|fps|frames|tokens|layers|epochs|px|GB|MB)\b)",
        r"|(?P<PERCENT>\b\d+(?:\.\d+)?\s?%)",
        r"|(?P<DATE>\b(?:19|20)\d{2}\b)",
        r"|(?P<NAME>\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+\b)",
        r"|(?P<ACRONYM>\b[A-Z][A-Za-z0-9]*[A-Z0-9][A-Za-z0-9\-]*\b)",
    ))
    .expect("entity pattern should compile")
});

const LABELS: [&str; 5] = ["QUANTITY", "PERCENT", "DATE", "NAME", "ACRONYM"];

/// Pattern-based extractor; no model, no network.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexEntityExtractor;

impl RegexEntityExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl EntityExtractor for RegexEntityExtractor {
    fn extract(&self, text: &str) -> Result<Vec<Entity>, ModelError> {
        Ok(ENTITY_PATTERN
            .captures_iter(text)
            .filter_map(|caps| {
                LABELS.iter().find_map(|label| {
                    caps.name(label).map(|m| Entity {
                        text: m.as_str().to_string(),
                        label: Some((*label).to_string()),
                    })
                })
            })
            .collect())
    }
}

// ============================================================================
// LlmEntityExtractor
// ============================================================================

/// Extractor that asks a text model for a JSON array of entity strings.
pub struct LlmEntityExtractor {
    client: Arc<VlmClient>,
}

impl LlmEntityExtractor {
    pub fn new(client: Arc<VlmClient>) -> Self {
        Self { client }
    }
}

impl EntityExtractor for LlmEntityExtractor {
    fn extract(&self, text: &str) -> Result<Vec<Entity>, ModelError> {
        let messages = vec![
            ChatMessage::system(ENTITY_SYSTEM_PROMPT),
            ChatMessage::user(entity_user_prompt(text)),
        ];
        let reply = self.client.chat(&messages)?;
        parse_entity_reply(&reply)
    }
}

/// Parse a JSON array of strings. Blank entries are dropped.
pub fn parse_entity_reply(reply: &str) -> Result<Vec<Entity>, ModelError> {
    let json = postprocess::json_array_slice(reply)
        .ok_or_else(|| ModelError::MalformedResponse(format!("no JSON array in: {reply:.80}")))?;
    let words: Vec<String> =
        serde_json::from_str(&json).map_err(|e| ModelError::MalformedResponse(e.to_string()))?;

    Ok(words
        .into_iter()
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
        .map(|text| Entity { text, label: None })
        .collect())
}
