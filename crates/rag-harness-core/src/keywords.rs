//! Frequency-based keyword extraction and text metadata.
//!
//! Keywords here are whitespace-delimited words, not [`tokenize`] tokens:
//! text is lowercased, every character other than ASCII letters, digits, CJK
//! ideographs, and whitespace becomes a space, and words of one character
//! are dropped. Keywords are ranked by raw frequency; ties keep first-seen
//! order.
//!
//! [`tokenize`]: crate::tokenize::tokenize

use std::collections::{HashMap, HashSet};

use crate::models::ContentMetadata;
use crate::tokenize::is_cjk;

/// Keywords kept in [`ContentMetadata::keywords`].
pub const METADATA_KEYWORDS: usize = 10;

/// Keywords compared by [`keyword_match`].
pub const MATCH_KEYWORDS: usize = 20;

/// A keyword match must have a ratio strictly above this.
pub const MATCH_THRESHOLD: f64 = 0.2;

/// Share of CJK ideographs above which text is tagged `zh`.
const CJK_LANGUAGE_RATIO: f64 = 0.3;

/// Top `count` keywords of `text` by frequency.
pub fn extract_keywords(text: &str, count: usize) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || is_cjk(c) || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut freq: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    for word in cleaned.split_whitespace().filter(|w| w.chars().count() > 1) {
        let n = freq.entry(word).or_insert(0);
        if *n == 0 {
            first_seen.push(word);
        }
        *n += 1;
    }

    // Stable sort: equal counts stay in first-seen order.
    first_seen.sort_by(|a, b| freq[b].cmp(&freq[a]));
    first_seen
        .into_iter()
        .take(count)
        .map(str::to_string)
        .collect()
}

/// Fraction of the query's keywords found among the text's keywords.
///
/// Both sides use the top `count` keywords. A query without keywords
/// matches nothing.
pub fn match_ratio(query: &str, text: &str, count: usize) -> f64 {
    let query_keywords = extract_keywords(query, count);
    if query_keywords.is_empty() {
        return 0.0;
    }
    let text_keywords: HashSet<String> = extract_keywords(text, count).into_iter().collect();
    let hits = query_keywords
        .iter()
        .filter(|k| text_keywords.contains(*k))
        .count();
    hits as f64 / query_keywords.len() as f64
}

/// The match ratio of `query` against `text` when it clears
/// [`MATCH_THRESHOLD`].
pub fn keyword_match(query: &str, text: &str) -> Option<f64> {
    let ratio = match_ratio(query, text, MATCH_KEYWORDS);
    (ratio > MATCH_THRESHOLD).then_some(ratio)
}

/// Word, character, and line counts plus language and top keywords.
pub fn extract_metadata(text: &str) -> ContentMetadata {
    let char_count = text.chars().count();
    let cjk = text.chars().filter(|c| is_cjk(*c)).count();
    let language = if char_count > 0 && cjk as f64 / char_count as f64 > CJK_LANGUAGE_RATIO {
        "zh"
    } else {
        "en"
    };

    ContentMetadata {
        word_count: text.split_whitespace().count(),
        char_count,
        line_count: text.split('\n').count(),
        language: language.to_string(),
        keywords: extract_keywords(text, METADATA_KEYWORDS),
        degraded_reason: None,
        description: None,
    }
}
