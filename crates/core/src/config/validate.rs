use tracing::warn;

use crate::matcher::MatchMode;

use super::{types::Config, ConfigError};

const WEIGHT_TOLERANCE: f64 = 1e-9;

fn check_unit(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ValidationError(format!(
            "matching.{} must be in [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

/// Validate a loaded configuration before any matching starts.
///
/// A weight pair that does not sum to 1.0 or a threshold outside its
/// range rejects the whole run up front.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let m = &config.matching;

    check_unit("author_weight", m.author_weight)?;
    check_unit("affiliation_weight", m.affiliation_weight)?;
    if (m.author_weight + m.affiliation_weight - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(ConfigError::ValidationError(format!(
            "author_weight + affiliation_weight must equal 1.0, got {}",
            m.author_weight + m.affiliation_weight
        )));
    }

    check_unit("author_validation_threshold", m.author_validation_threshold)?;
    check_unit("name_matching_threshold", m.name_matching_threshold)?;
    check_unit(
        "affiliation_matching_threshold",
        m.affiliation_matching_threshold,
    )?;
    check_unit("minimum_affiliation_score", m.minimum_affiliation_score)?;
    check_unit(
        "institution_acceptance_threshold",
        m.institution_acceptance_threshold,
    )?;

    if m.similarity_threshold > 100 {
        return Err(ConfigError::ValidationError(format!(
            "matching.similarity_threshold must be in [0, 100], got {}",
            m.similarity_threshold
        )));
    }

    if m.year_tolerance < 0 || m.year_search_window < 0 {
        return Err(ConfigError::ValidationError(
            "year windows cannot be negative".to_string(),
        ));
    }

    if config.processing.concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "processing.concurrency cannot be 0".to_string(),
        ));
    }

    match config.mode {
        MatchMode::Title => {
            if config.input.field_mappings.title.is_none() {
                return Err(ConfigError::ValidationError(
                    "title mode requires input.field_mappings.title".to_string(),
                ));
            }
        }
        MatchMode::AuthorAffiliation => {
            if config.input.field_mappings.authors.is_none()
                || config.input.field_mappings.affiliation.is_none()
            {
                return Err(ConfigError::ValidationError(
                    "author_affiliation mode requires input.field_mappings.authors and .affiliation"
                        .to_string(),
                ));
            }
        }
    }

    if config.api.openalex.mailto.is_none() {
        warn!("no api.openalex.mailto configured; requests use the slower common pool");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn base_config() -> Config {
        load_config_from_str(
            r#"
[input]
path = "in.csv"

[output]
path = "out.csv"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults_validate() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut config = base_config();
        config.matching.author_weight = 0.5;
        config.matching.affiliation_weight = 0.7;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_weight_sum_tolerance() {
        let mut config = base_config();
        config.matching.author_weight = 0.1 + 0.2;
        config.matching.affiliation_weight = 0.7;
        // Floating-point noise within the tolerance is accepted
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut config = base_config();
        config.matching.minimum_affiliation_score = 1.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_author_mode_requires_mappings() {
        let mut config = base_config();
        config.mode = MatchMode::AuthorAffiliation;
        config.input.field_mappings.affiliation = None;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = base_config();
        config.processing.concurrency = 0;
        assert!(validate_config(&config).is_err());
    }
}
