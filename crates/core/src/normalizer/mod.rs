//! Title normalization for catalog search.
//!
//! Free-text grant/publication titles carry dates, report numbers,
//! subtitles and formatting noise that wreck both search recall and
//! similarity scoring. This module turns a raw title into a stable,
//! lowercase ASCII form through a fixed-order pipeline. The pipeline is
//! idempotent: normalizing an already-clean title is a no-op.

mod dates;

pub use dates::{extract_date_from_title, parse_date_string, DateFormat, ExtractedDate};

use std::sync::LazyLock;

use deunicode::deunicode;
use regex_lite::Regex;
use serde::Serialize;

/// Output of [`normalize_title`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedTitle {
    /// Lowercase ASCII title with noise removed, ready for search.
    pub cleaned: String,
    /// Date found embedded in the title, if any.
    pub extracted_date: Option<ExtractedDate>,
    /// Textual shape the embedded date was written in.
    pub date_format: Option<DateFormat>,
}

/// Fixed English stopword set used by aggressive normalization.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how",
    "i", "if", "in", "into", "is", "it", "its", "just", "more", "most", "my", "no", "nor", "not",
    "now", "of", "off", "on", "once", "only", "or", "other", "our", "out", "over", "own", "same",
    "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "then", "there", "these", "they", "this", "those", "through", "to", "too", "under", "until",
    "up", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "you", "your", "yours",
];

static HTML_ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&[a-z]+;").unwrap());

/// Lowercase, transliterate to ASCII, strip punctuation and collapse
/// whitespace. With `aggressive` set, English stopwords are removed as
/// well (broader recall, at the cost of precision).
pub fn normalize_text(text: &str, aggressive: bool) -> String {
    if text.is_empty() {
        return String::new();
    }

    let lowered = text.to_lowercase();
    let ascii = deunicode(&lowered);
    let no_entities = HTML_ENTITY.replace_all(&ascii, " ");

    let mut out = String::with_capacity(no_entities.len());
    for c in no_entities.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push(' ');
        }
    }

    let words = out.split_whitespace();
    let joined: Vec<&str> = if aggressive {
        words.filter(|w| !STOPWORDS.contains(w)).collect()
    } else {
        words.collect()
    };

    joined.join(" ")
}

/// Trailing-noise patterns, applied in order against the end of the
/// title. Each targets a suffix that never belongs to the work's name.
static END_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\s*\[[^\]]*\]\s*$",
        r"\s*\([^)]*\)\s*$",
        r"\s+[-–—]\s+.*$",
        r"\s*:\s+.*$",
        r"\s+[A-Z]{2,}[-\d][-\d\w]*$",
        r"\s+\d{4}[-/]\d+$",
        r"(?i)\s+v\d+$",
        r"(?i)\s+vol[\s.]+\d+.*$",
        r"(?i)\s+part[\s.]+[IVX\d]+.*$",
        r"(?i)\s+chapter[\s.]+\d+.*$",
        r"(?i)\s+\(?abstract\)?$",
        r"(?i)\s+\(?summary\)?$",
        r"(?i)\s+\(?preprint\)?$",
        r"(?i)\s+\(?poster\)?$",
        r"(?i)\s+\(?presentation\)?$",
        r"(?i)\s+\(?paper\)?$",
        r"(?i)\s+\(?thesis\)?$",
        r"(?i)\s+\(?dissertation\)?$",
        r"(?i)\s+\(?conference\)?$",
        r"(?i)\s+\(?proceedings?\)?$",
        r"(?i)\s+\(?workshop\)?$",
        r"(?i)\s+\(?symposium\)?$",
        r"(?i)\s+\(?extended\)?$",
        r"(?i)\s+\(?revised\)?$",
        r"(?i)\s+\(?updated\)?$",
        r"(?i)\s+\(?final\)?$",
        r"(?i)\s+\(?draft\)?$",
        r"\s*[.?!]+$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Strip subtitles, bracketed spans, report numbers and descriptor
/// suffixes from a title. Any embedded date is removed first. The pass
/// over the suffix patterns repeats until nothing changes, so stacked
/// suffixes ("... abstract (revised)") are fully consumed.
///
/// Falls back to the input when stripping would leave an empty string.
pub fn extract_main_title(title: &str) -> String {
    if title.is_empty() {
        return String::new();
    }

    let original = title;
    let (mut title, _, _) = extract_date_from_title(title);

    loop {
        let before = title.clone();
        for re in END_PATTERNS.iter() {
            title = re.replace(&title, "").into_owned();
        }
        if title == before {
            break;
        }
    }

    if let Some(head) = title.split(';').next() {
        title = head.to_string();
    }
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");

    if title.is_empty() {
        return original.trim().to_string();
    }
    title
}

/// Full cleaning pipeline: date removal, main-title extraction, then
/// text normalization.
pub fn clean_title_for_search(title: &str, aggressive: bool) -> String {
    if title.is_empty() {
        return String::new();
    }
    let (title, _, _) = extract_date_from_title(title);
    let title = extract_main_title(&title);
    normalize_text(&title, aggressive)
}

/// Normalize a title for matching, keeping the extracted date.
pub fn normalize_title(title: &str) -> NormalizedTitle {
    let (rest, extracted_date, date_format) = extract_date_from_title(title);
    let main = extract_main_title(&rest);
    NormalizedTitle {
        cleaned: normalize_text(&main, false),
        extracted_date,
        date_format,
    }
}

/// Drop characters the catalog's search parser treats as operators.
pub fn sanitize_for_search(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        match c {
            '|' | '+' => out.push(' '),
            '*' | '?' | '~' | '^' | '\\' | '{' | '}' | '[' | ']' => {}
            _ => out.push(c),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_example() {
        let n = normalize_title("9 July 2019, Climate Change Report");
        assert_eq!(n.cleaned, "climate change report");
        assert_eq!(n.extracted_date.unwrap().to_string(), "2019-07-09");
        assert_eq!(n.date_format, Some(DateFormat::FullDate));
    }

    #[test]
    fn test_idempotent() {
        let titles = [
            "9 July 2019, Climate Change Report",
            "Ocean Acidification: A Review (preprint)",
            "Étude des résonances [v2] NASA-TM-12345",
            "Deep Learning Abstract Abstract",
            "A Survey of the Arctic; with notes",
        ];
        for t in titles {
            let once = normalize_title(t).cleaned;
            let twice = normalize_title(&once).cleaned;
            assert_eq!(once, twice, "not idempotent for {t:?}");
        }
    }

    #[test]
    fn test_subtitle_stripped() {
        assert_eq!(
            extract_main_title("Ocean Acidification: A Global Review"),
            "Ocean Acidification"
        );
        assert_eq!(
            extract_main_title("Ocean Acidification - A Global Review"),
            "Ocean Acidification"
        );
    }

    #[test]
    fn test_report_number_and_version_stripped() {
        assert_eq!(extract_main_title("Sea Ice Trends NASA-TM-12345"), "Sea Ice Trends");
        assert_eq!(extract_main_title("Sea Ice Trends v2"), "Sea Ice Trends");
    }

    #[test]
    fn test_suffix_words_stripped_to_fixpoint() {
        assert_eq!(extract_main_title("Sea Ice Trends (abstract)"), "Sea Ice Trends");
        assert_eq!(extract_main_title("Sea Ice Trends abstract preprint"), "Sea Ice Trends");
    }

    #[test]
    fn test_brackets_stripped() {
        assert_eq!(extract_main_title("Sea Ice Trends [dataset]"), "Sea Ice Trends");
    }

    #[test]
    fn test_empty_result_falls_back_to_original() {
        // A title that is nothing but noise keeps its original form
        assert_eq!(extract_main_title("(abstract)"), "(abstract)");
    }

    #[test]
    fn test_normalize_text_transliterates() {
        assert_eq!(normalize_text("Étude de l'élévation", false), "etude de l elevation");
    }

    #[test]
    fn test_normalize_text_aggressive_removes_stopwords() {
        assert_eq!(
            normalize_text("The impact of warming on the Arctic", true),
            "impact warming arctic"
        );
        assert_eq!(normalize_text("The impact of warming", false), "the impact of warming");
    }

    #[test]
    fn test_sanitize_for_search() {
        assert_eq!(sanitize_for_search("a|b+c*d?e[f]"), "a b cdef");
        assert_eq!(sanitize_for_search("alpha | beta"), "alpha beta");
    }

    #[test]
    fn test_clean_title_full_pipeline() {
        assert_eq!(
            clean_title_for_search("28 November 2018. Élevation Report: Part II (draft)", false),
            "elevation report"
        );
    }
}
