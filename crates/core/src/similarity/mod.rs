//! Similarity primitives shared by both matching modes.
//!
//! Two scales are in use and never mixed: title similarity is an
//! edit-distance ratio on 0-100, everything else (names, affiliations)
//! lives on 0.0-1.0.

mod affiliation;

pub use affiliation::{
    AffiliationScorer, EmbedderError, EmbeddingAffiliationScorer, FuzzyAffiliationScorer,
    TextEmbedder,
};

use deunicode::deunicode;

/// Character-level similarity ratio between two strings, 0-100.
///
/// Levenshtein-based and symmetric. Both inputs are expected to be
/// normalized already (see `normalizer::normalize_text`); the ratio is
/// computed on the strings as given.
pub fn title_ratio(a: &str, b: &str) -> u8 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 100;
    }
    let distance = strsim::levenshtein(a, b);
    let ratio = ((total - distance.min(total)) as f64 / total as f64) * 100.0;
    ratio.round() as u8
}

/// Name similarity ratio between two person-name strings, 0.0-1.0.
///
/// Jaro-Winkler: favors agreement on the common prefix, which is where
/// transcription noise in surnames is rarest. Symmetric.
pub fn name_ratio(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(a, b)
}

/// Lowercase ASCII form used before comparing names or affiliations.
pub fn ascii_fold(text: &str) -> String {
    let ascii = deunicode(&text.to_lowercase());
    let mut out = String::with_capacity(ascii.len());
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() || c.is_ascii_whitespace() {
            out.push(c);
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cosine similarity between two embedding vectors, clamped to [0, 1].
/// Mismatched or empty vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}
