/// Lowercase, trim and de-duplicate keywords, dropping empty ones.
/// First-seen order is kept.
pub fn normalize_keywords<S: AsRef<str>>(keywords: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(keywords.len());
    for k in keywords {
        let k = k.as_ref().trim().to_lowercase();
        if !k.is_empty() && !out.contains(&k) {
            out.push(k);
        }
    }
    out
}

/// Fraction of `keywords` found in `content` as case-insensitive substrings.
///
/// `keywords` must already be normalised. No keywords scores 0.
pub fn keyword_score(content: &str, keywords: &[String]) -> f32 {
    if keywords.is_empty() {
        return 0.0;
    }
    let haystack = content.to_lowercase();
    let found = keywords.iter().filter(|k| haystack.contains(k.as_str())).count();
    found as f32 / keywords.len() as f32
}
