//! Award-id verification and target-funder flags for matched works.

use crate::catalog::{short_id, Grant};
use crate::similarity::title_ratio;

use super::types::{AwardMatchType, FundingCheck};

// Fuzzy award-id comparisons below this score do not count.
const FUZZY_AWARD_FLOOR: u8 = 70;

/// Strip separators and boilerplate so formatting variants compare equal.
fn normalize_award_id(award_id: &str) -> String {
    award_id
        .to_lowercase()
        .replace("grant", "")
        .replace("award", "")
        .replace([' ', '.', '-', '_', '#'], "")
}

/// Verify an award id against a work's grant list.
///
/// Ladder, strongest first: exact (100), normalized (95), containment
/// (85), fuzzy ratio of the normalized forms when it clears the floor.
pub fn check_award_id(grants: &[Grant], award_id: &str) -> FundingCheck {
    let mut result = FundingCheck::default();
    if award_id.is_empty() {
        return result;
    }

    let normalized_input = normalize_award_id(award_id);

    let mut best: Option<(&Grant, u8, AwardMatchType)> = None;

    for grant in grants {
        let Some(grant_award) = grant.award_id.as_deref().filter(|a| !a.is_empty()) else {
            continue;
        };

        if grant_award == award_id {
            result.award_id_match = true;
            result.award_id_match_type = Some(AwardMatchType::Exact);
            result.award_id_match_score = 100;
            result.matched_grant_award_id = Some(grant_award.to_string());
            result.matched_grant_funder = Some(grant.funder_display_name.clone());
            return result;
        }

        let normalized_grant = normalize_award_id(grant_award);
        let candidate = if !normalized_input.is_empty() && normalized_input == normalized_grant {
            Some((95, AwardMatchType::Normalized))
        } else if !normalized_input.is_empty()
            && !normalized_grant.is_empty()
            && (normalized_grant.contains(&normalized_input)
                || normalized_input.contains(&normalized_grant))
        {
            Some((85, AwardMatchType::Contains))
        } else {
            let score = title_ratio(&normalized_input, &normalized_grant);
            (score >= FUZZY_AWARD_FLOOR).then_some((score, AwardMatchType::Fuzzy))
        };

        if let Some((score, match_type)) = candidate {
            if best.map_or(true, |(_, s, _)| score > s) {
                best = Some((grant, score, match_type));
            }
        }
    }

    if let Some((grant, score, match_type)) = best {
        result.award_id_match = true;
        result.award_id_match_type = Some(match_type);
        result.award_id_match_score = score;
        result.matched_grant_award_id = grant.award_id.clone();
        result.matched_grant_funder = Some(grant.funder_display_name.clone());
    }

    result
}

/// Record which of the configured funders appear in a work's grants.
pub fn check_target_funders(check: &mut FundingCheck, grants: &[Grant], target_ids: &[String]) {
    if target_ids.is_empty() {
        return;
    }

    for grant in grants {
        let id = short_id(&grant.funder_id);
        if target_ids.iter().any(|t| short_id(t) == id)
            && !result_contains(&check.matched_target_funders, &grant.funder_id)
        {
            check.matched_target_funders.push(grant.funder_id.clone());
            if !grant.funder_display_name.is_empty() {
                check
                    .matched_target_funder_names
                    .push(grant.funder_display_name.clone());
            }
        }
    }

    check.has_target_funder = !check.matched_target_funders.is_empty();
}

fn result_contains(seen: &[String], id: &str) -> bool {
    seen.iter().any(|s| s == id)
}

/// Run the full funding verification for one matched work.
pub fn verify(grants: &[Grant], award_id: &str, target_ids: &[String]) -> FundingCheck {
    let mut check = check_award_id(grants, award_id);
    check_target_funders(&mut check, grants, target_ids);
    check
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(funder: &str, name: &str, award: Option<&str>) -> Grant {
        Grant {
            funder_id: funder.to_string(),
            funder_display_name: name.to_string(),
            award_id: award.map(str::to_string),
        }
    }

    #[test]
    fn test_exact_match_wins() {
        let grants = vec![grant("F1", "Agency", Some("NSA-123"))];
        let check = check_award_id(&grants, "NSA-123");
        assert!(check.award_id_match);
        assert_eq!(check.award_id_match_type, Some(AwardMatchType::Exact));
        assert_eq!(check.award_id_match_score, 100);
        assert_eq!(check.matched_grant_award_id.as_deref(), Some("NSA-123"));
    }

    #[test]
    fn test_normalized_match() {
        let grants = vec![grant("F1", "Agency", Some("Grant NSA 123"))];
        let check = check_award_id(&grants, "nsa-123");
        assert_eq!(check.award_id_match_type, Some(AwardMatchType::Normalized));
        assert_eq!(check.award_id_match_score, 95);
    }

    #[test]
    fn test_containment_match() {
        let grants = vec![grant("F1", "Agency", Some("NSA-123-SUPPLEMENT"))];
        let check = check_award_id(&grants, "NSA-123");
        assert_eq!(check.award_id_match_type, Some(AwardMatchType::Contains));
        assert_eq!(check.award_id_match_score, 85);
    }

    #[test]
    fn test_fuzzy_floor() {
        let grants = vec![grant("F1", "Agency", Some("XQ-999"))];
        let check = check_award_id(&grants, "AB-123");
        assert!(!check.award_id_match);
        assert_eq!(check.award_id_match_score, 0);
    }

    #[test]
    fn test_best_of_multiple_grants() {
        let grants = vec![
            grant("F1", "Agency A", Some("OTHER-1")),
            grant("F2", "Agency B", Some("NSA 123")),
        ];
        let check = check_award_id(&grants, "NSA-123");
        assert_eq!(check.award_id_match_type, Some(AwardMatchType::Normalized));
        assert_eq!(check.matched_grant_funder.as_deref(), Some("Agency B"));
    }

    #[test]
    fn test_target_funders() {
        let grants = vec![
            grant("https://openalex.org/F100", "Agency A", None),
            grant("https://openalex.org/F200", "Agency B", None),
        ];
        let check = verify(&grants, "", &["F200".to_string()]);
        assert!(check.has_target_funder);
        assert_eq!(
            check.matched_target_funders,
            vec!["https://openalex.org/F200".to_string()]
        );
        assert_eq!(check.matched_target_funder_names, vec!["Agency B".to_string()]);
    }

    #[test]
    fn test_no_targets_no_flag() {
        let grants = vec![grant("F1", "Agency", Some("NSA-123"))];
        let check = verify(&grants, "NSA-123", &[]);
        assert!(!check.has_target_funder);
        assert!(check.award_id_match);
    }
}
