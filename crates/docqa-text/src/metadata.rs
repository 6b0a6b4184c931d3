use serde_json::{json, Value};

use docqa_core::types::Metadata;

use crate::patterns::{BULLET_ITEM, HEADER_LINE, NUMBERED_ITEM, URL};

/// Content statistics attached when enrichment is on.
pub(crate) fn enrichment(content: &str, processed_at: &str) -> Metadata {
    let words: Vec<&str> = content.split_whitespace().collect();
    let word_chars: usize = words.iter().map(|w| w.chars().count()).sum();
    let avg_word_length = if words.is_empty() {
        0.0
    } else {
        word_chars as f64 / words.len() as f64
    };

    let mut meta = Metadata::new();
    meta.insert("word_count".into(), json!(words.len()));
    meta.insert("char_count".into(), json!(content.chars().count()));
    meta.insert("avg_word_length".into(), json!((avg_word_length * 100.0).round() / 100.0));
    meta.insert("has_numbers".into(), json!(content.chars().any(|c| c.is_ascii_digit())));
    meta.insert("has_urls".into(), json!(URL.is_match(content)));
    meta.insert("processed_at".into(), Value::String(processed_at.to_string()));
    meta
}

/// Markdown structure flags attached when structure preservation is on.
pub(crate) fn structure(content: &str) -> Metadata {
    let header_level = HEADER_LINE.captures_iter(content).map(|c| c[1].len()).min();

    let mut meta = Metadata::new();
    meta.insert("has_header".into(), json!(header_level.is_some()));
    if let Some(level) = header_level {
        meta.insert("header_level".into(), json!(level));
    }
    meta.insert("has_list".into(), json!(BULLET_ITEM.is_match(content)));
    meta.insert("has_numbered_list".into(), json!(NUMBERED_ITEM.is_match(content)));
    meta
}

pub(crate) fn has_code(content: &str) -> bool {
    content.contains("```") || content.contains("~~~")
}
