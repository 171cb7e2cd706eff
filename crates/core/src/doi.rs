//! DOI extraction from URLs and free-form identifier strings.

use std::sync::LazyLock;

use regex_lite::Regex;

// Registrant prefix "10.NNNN[.N]*" followed by a suffix of DOI-safe chars.
static DOI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"10\.\d{4,}(?:\.\d+)*/[-._;()/:A-Za-z0-9]+").unwrap());

static DOI_EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^10\.\d{4,}(?:\.\d+)*/[-._;()/:A-Za-z0-9]+$").unwrap());

/// Pull a DOI out of a URL or identifier string.
///
/// Handles bare DOIs, `doi:` prefixes, resolver URLs and publisher
/// landing-page URLs, with percent-encoding undone first.
pub fn extract_doi(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let decoded = urlencoding::decode(trimmed)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| trimmed.to_string());

    DOI_PATTERN
        .find(&decoded)
        .map(|m| m.as_str().to_string())
}

/// True when the whole string is a well-formed DOI.
pub fn is_valid_doi(input: &str) -> bool {
    DOI_EXACT.is_match(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_doi() {
        assert_eq!(
            extract_doi("10.1038/s41586-020-2649-2"),
            Some("10.1038/s41586-020-2649-2".to_string())
        );
    }

    #[test]
    fn test_resolver_urls() {
        for url in [
            "https://doi.org/10.1000/182",
            "http://dx.doi.org/10.1000/182",
            "doi:10.1000/182",
        ] {
            assert_eq!(extract_doi(url), Some("10.1000/182".to_string()));
        }
    }

    #[test]
    fn test_publisher_url() {
        assert_eq!(
            extract_doi("https://link.springer.com/article/10.1007/s00382-019-04984-x"),
            Some("10.1007/s00382-019-04984-x".to_string())
        );
    }

    #[test]
    fn test_percent_encoded() {
        assert_eq!(
            extract_doi("https://doi.org/10.1175%2FJCLI-D-19-0123.1"),
            Some("10.1175/JCLI-D-19-0123.1".to_string())
        );
    }

    #[test]
    fn test_no_doi() {
        assert_eq!(extract_doi("https://example.com/article/42"), None);
        assert_eq!(extract_doi(""), None);
        assert_eq!(extract_doi("   "), None);
    }

    #[test]
    fn test_is_valid_doi() {
        assert!(is_valid_doi("10.1038/s41586-020-2649-2"));
        assert!(is_valid_doi("10.1175/JCLI-D-19-0123.1"));
        assert!(!is_valid_doi("doi:10.1038/xyz"));
        assert!(!is_valid_doi("11.1038/xyz"));
        assert!(!is_valid_doi(""));
    }
}
