use std::f64::consts::TAU;

use rand::Rng;
use rand_distr::{Distribution, Normal, StandardNormal};
use serde::{Deserialize, Serialize};

use super::SignalSource;
use crate::core::timebase::{Tick, Timebase};
use crate::error::{self, ConfigError, ConfigResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcgConfig {
    /// Intrinsic rate; 0 produces no beats at all.
    #[serde(default = "EcgConfig::default_heart_rate_bpm")]
    pub heart_rate_bpm: f64,
    /// Beat onset jitter as a fraction of the beat interval (Gaussian sigma).
    #[serde(default = "EcgConfig::default_jitter")]
    pub jitter: f64,
    #[serde(default)]
    pub drop_prob: f64,
    #[serde(default)]
    pub ectopic_prob: f64,
    #[serde(default = "EcgConfig::default_beat_width_s")]
    pub beat_width_s: f64,
    #[serde(default = "EcgConfig::default_ectopic_amplitude")]
    pub ectopic_amplitude: f64,
    #[serde(default = "EcgConfig::default_drift_amplitude")]
    pub drift_amplitude: f64,
    #[serde(default = "EcgConfig::default_drift_hz")]
    pub drift_hz: f64,
    #[serde(default = "EcgConfig::default_noise_std")]
    pub noise_std: f64,
}

impl EcgConfig {
    fn default_heart_rate_bpm() -> f64 {
        60.0
    }
    fn default_jitter() -> f64 {
        0.05
    }
    fn default_beat_width_s() -> f64 {
        0.02
    }
    fn default_ectopic_amplitude() -> f64 {
        0.8
    }
    fn default_drift_amplitude() -> f64 {
        0.05
    }
    fn default_drift_hz() -> f64 {
        0.25
    }
    fn default_noise_std() -> f64 {
        0.02
    }

    /// Beats only: no drift, no noise, no jitter.
    pub fn clean(heart_rate_bpm: f64) -> Self {
        Self {
            heart_rate_bpm,
            jitter: 0.0,
            drift_amplitude: 0.0,
            noise_std: 0.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        error::non_negative("signal.heart_rate_bpm", self.heart_rate_bpm)?;
        error::non_negative("signal.jitter", self.jitter)?;
        error::probability("signal.drop_prob", self.drop_prob)?;
        error::probability("signal.ectopic_prob", self.ectopic_prob)?;
        error::positive("signal.beat_width_s", self.beat_width_s)?;
        error::finite("signal.ectopic_amplitude", self.ectopic_amplitude)?;
        error::finite("signal.drift_amplitude", self.drift_amplitude)?;
        error::non_negative("signal.drift_hz", self.drift_hz)?;
        error::non_negative("signal.noise_std", self.noise_std)?;
        Ok(())
    }
}

impl Default for EcgConfig {
    fn default() -> Self {
        Self {
            heart_rate_bpm: Self::default_heart_rate_bpm(),
            jitter: Self::default_jitter(),
            drop_prob: 0.0,
            ectopic_prob: 0.0,
            beat_width_s: Self::default_beat_width_s(),
            ectopic_amplitude: Self::default_ectopic_amplitude(),
            drift_amplitude: Self::default_drift_amplitude(),
            drift_hz: Self::default_drift_hz(),
            noise_std: Self::default_noise_std(),
        }
    }
}

/// Generated samples plus the onsets that produced them.
#[derive(Debug, Clone, Default)]
pub struct SyntheticTrace {
    pub samples: Vec<f64>,
    pub beat_ticks: Vec<Tick>,
    pub ectopic_ticks: Vec<Tick>,
}

/// Pulse-train ECG stand-in: ramp-shaped beats on a jittered clock, with
/// dropped and ectopic beats, baseline drift and white noise.
#[derive(Debug, Clone)]
pub struct SyntheticEcg {
    config: EcgConfig,
    jitter: Option<Normal<f64>>,
}

impl SyntheticEcg {
    pub fn new(config: EcgConfig) -> ConfigResult<Self> {
        config.validate()?;
        let jitter = if config.heart_rate_bpm > 0.0 {
            let sigma = config.jitter * 60.0 / config.heart_rate_bpm;
            let normal = Normal::new(0.0, sigma).map_err(|_| ConfigError::NonFinite {
                field: "signal.jitter",
                value: sigma,
            })?;
            Some(normal)
        } else {
            None
        };
        Ok(Self { config, jitter })
    }

    pub fn config(&self) -> &EcgConfig {
        &self.config
    }

    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        time: &Timebase,
        duration_s: f64,
        rng: &mut R,
    ) -> SyntheticTrace {
        let n = time.n_samples(duration_s);
        let mut trace = SyntheticTrace {
            samples: vec![0.0; n],
            ..SyntheticTrace::default()
        };
        let cfg = &self.config;
        let width = time.sec_to_samples_floor(cfg.beat_width_s).max(1);

        if let Some(jitter) = &self.jitter {
            let interval = 60.0 / cfg.heart_rate_bpm;
            let mut next_beat = 0.0;
            while next_beat < duration_s {
                let onset = next_beat + jitter.sample(rng);
                next_beat += interval;
                if onset < 0.0 || rng.random::<f64>() < cfg.drop_prob {
                    continue;
                }
                let tick = time.sec_to_tick(onset);
                if add_ramp(&mut trace.samples, tick, width, 1.0) {
                    trace.beat_ticks.push(tick);
                }
                if rng.random::<f64>() < cfg.ectopic_prob {
                    let extra = onset + rng.random_range(0.2 * interval..0.5 * interval);
                    let tick = time.sec_to_tick(extra);
                    if add_ramp(&mut trace.samples, tick, width, cfg.ectopic_amplitude) {
                        trace.ectopic_ticks.push(tick);
                    }
                }
            }
        }

        for (i, x) in trace.samples.iter_mut().enumerate() {
            let t = time.tick_to_sec(i as Tick);
            *x += cfg.drift_amplitude * (TAU * cfg.drift_hz * t).sin();
            if cfg.noise_std > 0.0 {
                let z: f64 = StandardNormal.sample(rng);
                *x += cfg.noise_std * z;
            }
        }
        trace
    }
}

/// Adds a linear ramp-down of `peak` over `width` samples; false if `start` is past the end.
fn add_ramp(samples: &mut [f64], start: Tick, width: usize, peak: f64) -> bool {
    let start = start as usize;
    if start >= samples.len() {
        return false;
    }
    for (j, x) in samples[start..].iter_mut().take(width).enumerate() {
        *x += peak * (1.0 - j as f64 / width as f64);
    }
    true
}

impl SignalSource for SyntheticEcg {
    fn generate<R: Rng + ?Sized>(
        &self,
        time: &Timebase,
        duration_s: f64,
        rng: &mut R,
    ) -> Vec<f64> {
        self.synthesize(time, duration_s, rng).samples
    }
}
