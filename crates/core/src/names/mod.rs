//! Author name parsing.
//!
//! Input files carry author names in whatever shape the grant system
//! exported: "Smith, John", "John Smith", "Smith J", sometimes with
//! compound surnames ("De La Cruz Pech-Canul Á."). The configured style
//! tells the parser where the surname boundary is; when no boundary is
//! determinable the parse fails rather than guessing, and the caller
//! marks the record failed.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::similarity::ascii_fold;

/// How raw author names are written in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NameStyle {
    /// Guess from the shape of the string.
    #[default]
    Auto,
    /// "John Smith"
    FirstLast,
    /// "Smith, John"
    LastCommaFirst,
    /// "Smith John"
    LastFirst,
    /// "Smith J" (compound-surname aware)
    LastInitial,
    /// "J. Smith"
    FirstInitialLast,
}

/// Errors from name parsing.
#[derive(Debug, Error)]
pub enum NameParseError {
    #[error("empty author name")]
    Empty,

    #[error("cannot determine surname boundary in '{0}'")]
    Ambiguous(String),
}

/// A parsed person name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedName {
    /// Family name, particles included ("van der Berg").
    pub surname: String,
    /// Given name or initial; may be empty for surname-only styles.
    pub given: String,
    /// Lowercase ASCII "given surname" form used for scoring.
    pub normalized: String,
}

impl ParsedName {
    fn build(surname: &str, given: &str) -> Self {
        let normalized = ascii_fold(&format!("{given} {surname}"));
        Self {
            surname: surname.trim().to_string(),
            given: given.trim().to_string(),
            normalized,
        }
    }
}

/// Surname particles kept attached to the family name.
const SURNAME_PARTICLES: &[&str] = &[
    "de", "del", "della", "di", "da", "van", "von", "der", "den", "ter", "le", "la", "les", "du",
    "des", "mac", "mc", "o'", "d'", "al", "el", "ibn", "bin", "abu", "dos", "das", "do", "san",
    "santa", "santo", "st", "saint",
];

fn is_particle(token: &str) -> bool {
    SURNAME_PARTICLES.contains(&token.to_lowercase().as_str())
}

/// A token that looks like an initial block: "J", "J.", "JA".
fn is_initial(token: &str) -> bool {
    let clean = token.replace('.', "");
    !clean.is_empty()
        && (clean.chars().count() == 1
            || (clean.chars().count() <= 3 && clean.chars().all(|c| c.is_uppercase())))
}

/// Split a multi-author field on the configured separator.
pub fn split_authors(field: &str, separator: &str) -> Vec<String> {
    field
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Take the surname off the end of a token list, absorbing any particles
/// that precede it ("Ludwig van der Berg" -> given "Ludwig", surname
/// "van der Berg").
fn split_trailing_surname(tokens: &[&str]) -> (String, String) {
    let mut idx = tokens.len() - 1;
    while idx > 0 && is_particle(tokens[idx - 1]) {
        idx -= 1;
    }
    // Never let particles swallow the whole name
    if idx == 0 && tokens.len() > 1 {
        idx = tokens.len() - 1;
    }
    (tokens[..idx].join(" "), tokens[idx..].join(" "))
}

/// Parse one raw author name according to `style`.
pub fn parse_name(raw: &str, style: NameStyle) -> Result<ParsedName, NameParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(NameParseError::Empty);
    }

    match style {
        NameStyle::LastCommaFirst => {
            let Some((last, first)) = raw.split_once(',') else {
                return Err(NameParseError::Ambiguous(raw.to_string()));
            };
            Ok(ParsedName::build(last, first))
        }
        NameStyle::LastFirst => {
            let tokens: Vec<&str> = raw.split_whitespace().collect();
            match tokens.as_slice() {
                [] => Err(NameParseError::Empty),
                [only] => Err(NameParseError::Ambiguous(only.to_string())),
                [last, rest @ ..] => Ok(ParsedName::build(last, &rest.join(" "))),
            }
        }
        NameStyle::LastInitial => {
            let tokens: Vec<&str> = raw.split_whitespace().collect();
            match tokens.as_slice() {
                [] => Err(NameParseError::Empty),
                // A bare surname is unambiguous under this style
                [only] => Ok(ParsedName::build(only, "")),
                _ => {
                    let (surname_tokens, initial) = if is_initial(tokens[tokens.len() - 1]) {
                        (&tokens[..tokens.len() - 1], tokens[tokens.len() - 1])
                    } else {
                        (&tokens[..], "")
                    };
                    Ok(ParsedName::build(&surname_tokens.join(" "), initial))
                }
            }
        }
        NameStyle::FirstInitialLast => {
            let tokens: Vec<&str> = raw.split_whitespace().collect();
            if tokens.is_empty() {
                return Err(NameParseError::Empty);
            }
            let surname_start = tokens.iter().position(|t| !is_initial(t));
            match surname_start {
                Some(i) => {
                    let initials = tokens[..i].join(" ").replace('.', "");
                    Ok(ParsedName::build(&tokens[i..].join(" "), &initials))
                }
                None => Err(NameParseError::Ambiguous(raw.to_string())),
            }
        }
        NameStyle::FirstLast => {
            let tokens: Vec<&str> = raw.split_whitespace().collect();
            match tokens.as_slice() {
                [] => Err(NameParseError::Empty),
                [only] => Ok(ParsedName::build(only, "")),
                _ => {
                    let (given, surname) = split_trailing_surname(&tokens);
                    Ok(ParsedName::build(&surname, &given))
                }
            }
        }
        NameStyle::Auto => {
            if raw.contains(',') {
                return parse_name(raw, NameStyle::LastCommaFirst);
            }
            let tokens: Vec<&str> = raw.split_whitespace().collect();
            match tokens.as_slice() {
                [] => Err(NameParseError::Empty),
                // One token and no style hint: no surname boundary exists
                [only] => Err(NameParseError::Ambiguous(only.to_string())),
                _ => parse_name(raw, NameStyle::FirstLast),
            }
        }
    }
}

static MERGED_CASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").unwrap());

fn repair_merged_case(name: &str) -> String {
    MERGED_CASE.replace_all(name, "$1 $2").into_owned()
}

/// Convert a raw name to "Given Surname" order for catalog search
/// queries, repairing merged compound given names on the way
/// ("SchroderAdams, Claudia" -> "Claudia Schroder Adams").
pub fn display_order(raw: &str, style: NameStyle) -> String {
    let raw = raw.trim();
    let had_comma = raw.contains(',');

    let converted = match style {
        NameStyle::LastCommaFirst | NameStyle::Auto if had_comma => {
            match raw.split_once(',') {
                Some((last, first)) => {
                    format!("{} {}", repair_merged_case(first.trim()), last.trim())
                }
                None => raw.to_string(),
            }
        }
        NameStyle::LastFirst => {
            let mut tokens = raw.split_whitespace();
            match (tokens.next(), tokens.clone().next()) {
                (Some(last), Some(_)) => {
                    let rest: Vec<&str> = tokens.collect();
                    format!("{} {}", repair_merged_case(&rest.join(" ")), last)
                }
                _ => raw.to_string(),
            }
        }
        NameStyle::LastInitial => {
            let tokens: Vec<&str> = raw.split_whitespace().collect();
            if tokens.len() >= 2 {
                let (surname, initial) = tokens.split_at(tokens.len() - 1);
                format!("{} {}", initial[0], surname.join(" "))
            } else {
                raw.to_string()
            }
        }
        _ => repair_merged_case(raw),
    };

    if had_comma {
        repair_merged_case(&converted)
    } else {
        converted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_comma_first() {
        let n = parse_name("Smith, John", NameStyle::LastCommaFirst).unwrap();
        assert_eq!(n.surname, "Smith");
        assert_eq!(n.given, "John");
        assert_eq!(n.normalized, "john smith");
    }

    #[test]
    fn test_last_comma_first_without_comma_fails() {
        assert!(matches!(
            parse_name("Smith John", NameStyle::LastCommaFirst),
            Err(NameParseError::Ambiguous(_))
        ));
    }

    #[test]
    fn test_first_last_with_particles() {
        let n = parse_name("Ludwig van der Berg", NameStyle::FirstLast).unwrap();
        assert_eq!(n.surname, "van der Berg");
        assert_eq!(n.given, "Ludwig");
    }

    #[test]
    fn test_last_initial_compound_surname() {
        let n = parse_name("De La Cruz Pech-Canul Á", NameStyle::LastInitial).unwrap();
        assert_eq!(n.surname, "De La Cruz Pech-Canul");
        assert_eq!(n.given, "Á");
    }

    #[test]
    fn test_last_initial_bare_surname() {
        let n = parse_name("Mitchell", NameStyle::LastInitial).unwrap();
        assert_eq!(n.surname, "Mitchell");
        assert_eq!(n.given, "");
    }

    #[test]
    fn test_first_initial_last() {
        let n = parse_name("J. A. Smith", NameStyle::FirstInitialLast).unwrap();
        assert_eq!(n.surname, "Smith");
        assert_eq!(n.given, "J A");
    }

    #[test]
    fn test_auto_single_token_fails() {
        assert!(matches!(
            parse_name("Smith", NameStyle::Auto),
            Err(NameParseError::Ambiguous(_))
        ));
    }

    #[test]
    fn test_auto_with_comma() {
        let n = parse_name("García, María", NameStyle::Auto).unwrap();
        assert_eq!(n.surname, "García");
        assert_eq!(n.normalized, "maria garcia");
    }

    #[test]
    fn test_empty_fails() {
        assert!(matches!(parse_name("   ", NameStyle::Auto), Err(NameParseError::Empty)));
    }

    #[test]
    fn test_split_authors() {
        let authors = split_authors("Smith, J; García, M;; ", ";");
        assert_eq!(authors, vec!["Smith, J", "García, M"]);
    }

    #[test]
    fn test_display_order_comma() {
        assert_eq!(display_order("Smith, John", NameStyle::LastCommaFirst), "John Smith");
    }

    #[test]
    fn test_display_order_repairs_merged_case() {
        assert_eq!(
            display_order("SchroderAdams, Claudia", NameStyle::Auto),
            "Claudia Schroder Adams"
        );
        assert_eq!(
            display_order("Smith, ErnstLudwig", NameStyle::LastCommaFirst),
            "Ernst Ludwig Smith"
        );
    }

    #[test]
    fn test_display_order_last_initial() {
        assert_eq!(display_order("Mitchell G", NameStyle::LastInitial), "G Mitchell");
    }

    #[test]
    fn test_display_order_first_last_untouched() {
        assert_eq!(display_order("John Smith", NameStyle::FirstLast), "John Smith");
    }
}
