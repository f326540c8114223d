use crate::config::{Config, RetrievalConfig, SCHEMA_VERSION};
use crate::error::{Result, StoryfindError, ValidationError};
use crate::retrieval::FusionConfig;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_retrieval(&config.retrieval, "retrieval", &mut errors);
        Self::validate_profiles(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(StoryfindError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_retrieval(
        retrieval: &RetrievalConfig,
        prefix: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        if retrieval.default_limit == 0 {
            errors.push(ValidationError::new(
                format!("{}.default_limit", prefix),
                "Default limit must be greater than 0",
            ));
        }

        if let Err(e) = FusionConfig::new(retrieval.lexical_weight, retrieval.semantic_weight) {
            errors.push(ValidationError::new(
                format!("{}.lexical_weight", prefix),
                e.to_string(),
            ));
        }

        let epsilon = retrieval.dedup_epsilon_secs;
        if !epsilon.is_finite() || epsilon < 0.0 {
            errors.push(ValidationError::new(
                format!("{}.dedup_epsilon_secs", prefix),
                format!("Dedup epsilon must be a non-negative number, got {}", epsilon),
            ));
        }

        Self::validate_threshold(
            retrieval.threshold_min,
            retrieval.threshold_max,
            prefix,
            errors,
        );
    }

    fn validate_threshold(min: f64, max: f64, prefix: &str, errors: &mut Vec<ValidationError>) {
        Self::validate_bound(prefix, "threshold_min", min, errors);
        Self::validate_bound(prefix, "threshold_max", max, errors);
        Self::validate_ordering(min, max, prefix, errors);
    }

    fn validate_bound(prefix: &str, key: &str, value: f64, errors: &mut Vec<ValidationError>) {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ValidationError::new(
                format!("{}.{}", prefix, key),
                format!("Threshold must be between 0.0 and 1.0, got {}", value),
            ));
        }
    }

    fn validate_ordering(min: f64, max: f64, prefix: &str, errors: &mut Vec<ValidationError>) {
        if min > max {
            errors.push(ValidationError::new(
                format!("{}.threshold_min", prefix),
                format!("Threshold minimum {} exceeds maximum {}", min, max),
            ));
        }
    }

    fn validate_profiles(config: &Config, errors: &mut Vec<ValidationError>) {
        let mut names: Vec<&String> = config.profiles.keys().collect();
        names.sort();

        // Only overridden fields are checked; the base section reports its own errors
        for name in names {
            let overrides = &config.profiles[name];
            let prefix = format!("profiles.{}", name);
            let base = &config.retrieval;

            if overrides.lexical_weight.is_some() || overrides.semantic_weight.is_some() {
                let lexical = overrides.lexical_weight.unwrap_or(base.lexical_weight);
                let semantic = overrides.semantic_weight.unwrap_or(base.semantic_weight);
                if let Err(e) = FusionConfig::new(lexical, semantic) {
                    errors.push(ValidationError::new(
                        format!("{}.lexical_weight", prefix),
                        e.to_string(),
                    ));
                }
            }

            if overrides.threshold_min.is_some() || overrides.threshold_max.is_some() {
                if let Some(min) = overrides.threshold_min {
                    Self::validate_bound(&prefix, "threshold_min", min, errors);
                }
                if let Some(max) = overrides.threshold_max {
                    Self::validate_bound(&prefix, "threshold_max", max, errors);
                }
                Self::validate_ordering(
                    overrides.threshold_min.unwrap_or(base.threshold_min),
                    overrides.threshold_max.unwrap_or(base.threshold_max),
                    &prefix,
                    errors,
                );
            }
        }
    }
}
