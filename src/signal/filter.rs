use serde::{Deserialize, Serialize};

use super::SignalFilter;
use crate::core::biquad::{Cascade, Response};
use crate::error::{self, ConfigError, ConfigResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "FilterConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "FilterConfig::default_low_hz")]
    pub low_hz: f64,
    #[serde(default = "FilterConfig::default_high_hz")]
    pub high_hz: f64,
    #[serde(default = "FilterConfig::default_order")]
    pub order: usize,
}

impl FilterConfig {
    fn default_enabled() -> bool {
        true
    }
    fn default_low_hz() -> f64 {
        0.5
    }
    fn default_high_hz() -> f64 {
        40.0
    }
    fn default_order() -> usize {
        3
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn validate(&self, fs: f64) -> ConfigResult<()> {
        if !self.enabled {
            return Ok(());
        }
        error::positive("sample_rate_hz", fs)?;
        if self.order == 0 {
            return Err(ConfigError::FilterOrder);
        }
        let nyquist_hz = 0.5 * fs;
        let ordered = self.low_hz > 0.0 && self.low_hz < self.high_hz && self.high_hz < nyquist_hz;
        if !ordered {
            return Err(ConfigError::FilterBand {
                low_hz: self.low_hz,
                high_hz: self.high_hz,
                nyquist_hz,
            });
        }
        Ok(())
    }

    /// Builds the configured filter, or the identity when disabled.
    pub fn build(&self, fs: f64) -> ConfigResult<Box<dyn SignalFilter>> {
        self.validate(fs)?;
        if !self.enabled {
            return Ok(Box::new(Passthrough));
        }
        Ok(Box::new(ButterworthBandpass::new(
            fs,
            self.low_hz,
            self.high_hz,
            self.order,
        )?))
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            low_hz: Self::default_low_hz(),
            high_hz: Self::default_high_hz(),
            order: Self::default_order(),
        }
    }
}

/// Zero-phase Butterworth band-pass: high-pass and low-pass cascades of the
/// same order, applied forward and backward.
#[derive(Debug, Clone)]
pub struct ButterworthBandpass {
    cascade: Cascade,
}

impl ButterworthBandpass {
    pub fn new(fs: f64, low_hz: f64, high_hz: f64, order: usize) -> ConfigResult<Self> {
        FilterConfig {
            enabled: true,
            low_hz,
            high_hz,
            order,
        }
        .validate(fs)?;
        let cascade = Cascade::butterworth(Response::Highpass, order, low_hz, fs)
            .chain(Cascade::butterworth(Response::Lowpass, order, high_hz, fs));
        Ok(Self { cascade })
    }

    pub fn sections(&self) -> usize {
        self.cascade.len()
    }
}

impl SignalFilter for ButterworthBandpass {
    fn apply(&self, samples: &[f64]) -> Vec<f64> {
        self.cascade.filtfilt(samples)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl SignalFilter for Passthrough {
    fn apply(&self, samples: &[f64]) -> Vec<f64> {
        samples.to_vec()
    }
}
