//! Configuration errors. Everything else in a run is floored or clamped, so
//! these are the only failures a simulation can report, and they are all
//! raised before the first sample is processed.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} is a probability and must lie in [0, 1], got {value}")]
    ProbabilityOutOfRange { field: &'static str, value: f64 },

    #[error("{field} outside the valid range [{min}, {max}]")]
    InvalidRange {
        field: &'static str,
        min: f64,
        max: f64,
    },

    #[error("filter band [{low_hz}, {high_hz}] Hz must satisfy 0 < low < high < {nyquist_hz}")]
    FilterBand {
        low_hz: f64,
        high_hz: f64,
        nyquist_hz: f64,
    },

    #[error("filter order must be at least 1")]
    FilterOrder,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

pub(crate) fn finite(field: &'static str, value: f64) -> ConfigResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NonFinite { field, value })
    }
}

pub(crate) fn positive(field: &'static str, value: f64) -> ConfigResult<f64> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

pub(crate) fn non_negative(field: &'static str, value: f64) -> ConfigResult<f64> {
    finite(field, value)?;
    if value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

pub(crate) fn probability(field: &'static str, value: f64) -> ConfigResult<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::ProbabilityOutOfRange { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_classify_values() {
        assert_eq!(positive("fs", 250.0), Ok(250.0));
        assert!(matches!(
            positive("fs", 0.0),
            Err(ConfigError::NonPositive { field: "fs", .. })
        ));
        assert!(matches!(
            positive("fs", f64::NAN),
            Err(ConfigError::NonFinite { .. })
        ));
        assert_eq!(non_negative("jitter", 0.0), Ok(0.0));
        assert!(probability("drop_prob", 1.5).is_err());
        assert!(probability("drop_prob", f64::NAN).is_err());
    }

    #[test]
    fn messages_name_the_field() {
        let err = ConfigError::NonPositive {
            field: "tau_m",
            value: -1.0,
        };
        assert_eq!(err.to_string(), "tau_m must be positive, got -1");
    }
}
