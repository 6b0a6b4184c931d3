use once_cell::sync::Lazy;
use regex::Regex;

/// Terminal punctuation followed by whitespace. The match end is the start of
/// the next sentence.
pub(crate) static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+\s+").expect("sentence regex"));

/// ATX markdown header at the start of a line.
pub(crate) static HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})[ \t]").expect("header regex"));

pub(crate) static HEADER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(#{1,6})[ \t]").expect("header line regex"));

pub(crate) static BULLET_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*[-*+][ \t]+\S").expect("bullet regex"));

pub(crate) static NUMBERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*\d+[.)][ \t]+\S").expect("numbered regex"));

pub(crate) static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+").expect("url regex"));

/// Fenced code blocks, backtick or tilde fenced, matched lazily.
pub(crate) static FENCED_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```.*?```|~~~.*?~~~").expect("code fence regex"));
