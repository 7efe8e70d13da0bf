use std::time::Duration;

use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }
}

/// Trait for validating configuration values
pub trait ConfigValidator<T> {
    /// Validate a configuration value
    fn validate(&self, value: &T) -> Result<(), ConfigError>;
}

/// Bounds for the resolution deadline
pub struct TimeoutValidator {
    pub min: Duration,
    pub max: Duration,
}

impl Default for TimeoutValidator {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(1),
            max: Duration::from_secs(60 * 60),
        }
    }
}

impl ConfigValidator<Duration> for TimeoutValidator {
    fn validate(&self, value: &Duration) -> Result<(), ConfigError> {
        if *value < self.min || *value > self.max {
            return Err(ConfigError::invalid_value(
                "resolve_timeout",
                format!("{:?}", value),
                format!("duration between {:?} and {:?}", self.min, self.max),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_validator() {
        let validator = TimeoutValidator::default();

        assert!(validator.validate(&Duration::from_secs(5)).is_ok());
        assert!(validator.validate(&Duration::from_millis(1)).is_ok());
        assert!(validator.validate(&Duration::ZERO).is_err());
        assert!(validator.validate(&Duration::from_secs(2 * 60 * 60)).is_err());
    }

    #[test]
    fn test_invalid_value_message() {
        let err = ConfigError::invalid_value("cycle_detection", "sometimes", "chain or global");
        assert_eq!(
            err.to_string(),
            "Invalid value for field 'cycle_detection': 'sometimes'. Expected: chain or global"
        );
    }
}
