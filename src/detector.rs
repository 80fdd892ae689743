//! Adaptive-threshold leaky integrate-and-fire beat detector.
//!
//! The detector converts a sampled signal into a drive current, integrates it
//! on a leaky membrane, and fires when the membrane crosses a threshold that
//! jumps on every spike and relaxes back toward a baseline. The baseline itself
//! is slowly nudged toward a target firing rate (homeostasis) and is the only
//! piece of state that survives from one [`AdaptiveThresholdDetector::run`] to
//! the next.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::stats;
use crate::core::timebase::{Tick, Timebase};
use crate::error::{self, ConfigError, ConfigResult};

const NORM_EPS: f64 = 1e-12;
const MAD_EPS: f64 = 1e-9;
const Z_MIN: f64 = -5.0;
const Z_MAX: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Membrane time constant (s).
    pub tau_m: f64,
    /// Threshold relaxation time constant (s).
    pub tau_theta: f64,
    /// Initial threshold baseline.
    pub theta_base: f64,
    /// Threshold jump per spike.
    pub theta_inc: f64,
    pub v_reset: f64,
    pub v_rest: f64,
    pub gain: f64,
    /// Standardized units below which the drive current is zero.
    pub dead_zone: f64,
    pub refractory_ms: f64,
    pub homeo_rate: f64,
    pub target_rate_hz: f64,
    pub homeo_window_s: f64,
    pub theta_base_min: f64,
    pub theta_base_max: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            tau_m: 0.03,
            tau_theta: 0.7,
            theta_base: 0.15,
            theta_inc: 0.35,
            v_reset: 0.0,
            v_rest: 0.0,
            gain: 3.0,
            dead_zone: 0.65,
            refractory_ms: 180.0,
            homeo_rate: 0.0008,
            target_rate_hz: 1.0,
            homeo_window_s: 6.0,
            theta_base_min: 0.001,
            theta_base_max: 1.0,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        error::positive("detector.tau_m", self.tau_m)?;
        error::positive("detector.tau_theta", self.tau_theta)?;
        error::non_negative("detector.theta_inc", self.theta_inc)?;
        error::finite("detector.v_reset", self.v_reset)?;
        error::finite("detector.v_rest", self.v_rest)?;
        error::non_negative("detector.gain", self.gain)?;
        error::finite("detector.dead_zone", self.dead_zone)?;
        error::non_negative("detector.refractory_ms", self.refractory_ms)?;
        error::non_negative("detector.homeo_rate", self.homeo_rate)?;
        error::non_negative("detector.target_rate_hz", self.target_rate_hz)?;
        error::positive("detector.homeo_window_s", self.homeo_window_s)?;
        error::positive("detector.theta_base_min", self.theta_base_min)?;
        error::finite("detector.theta_base_max", self.theta_base_max)?;
        if self.theta_base_min >= self.theta_base_max {
            return Err(ConfigError::InvalidRange {
                field: "detector.theta_base_min/theta_base_max",
                min: self.theta_base_min,
                max: self.theta_base_max,
            });
        }
        error::finite("detector.theta_base", self.theta_base)?;
        if !(self.theta_base_min..=self.theta_base_max).contains(&self.theta_base) {
            return Err(ConfigError::InvalidRange {
                field: "detector.theta_base",
                min: self.theta_base_min,
                max: self.theta_base_max,
            });
        }
        Ok(())
    }

    pub fn refractory_s(&self) -> f64 {
        self.refractory_ms / 1000.0
    }
}

/// One homeostatic adjustment of the threshold baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HomeostasisUpdate {
    pub tick: Tick,
    pub rate_hz: f64,
    pub theta_base: f64,
}

/// Per-sample output of one detector pass. All vectors share the input length.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectorTrace {
    pub current: Vec<f64>,
    pub v: Vec<f64>,
    pub theta: Vec<f64>,
    pub spikes: Vec<bool>,
    pub homeostasis: Vec<HomeostasisUpdate>,
}

impl DetectorTrace {
    pub fn len(&self) -> usize {
        self.spikes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spikes.is_empty()
    }

    pub fn spike_count(&self) -> usize {
        self.spikes.iter().filter(|&&s| s).count()
    }

    pub fn spike_ticks(&self) -> Vec<Tick> {
        self.spikes
            .iter()
            .enumerate()
            .filter_map(|(i, &s)| s.then_some(i as Tick))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct AdaptiveThresholdDetector {
    time: Timebase,
    config: DetectorConfig,
    theta_base: f64,
    spike_ticks: Vec<Tick>,
    runs: usize,
}

impl AdaptiveThresholdDetector {
    pub fn new(time: Timebase, config: DetectorConfig) -> Result<Self, ConfigError> {
        error::positive("sample_rate_hz", time.fs)?;
        config.validate()?;
        Ok(Self {
            time,
            theta_base: config.theta_base,
            config,
            spike_ticks: Vec::new(),
            runs: 0,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Current (homeostatically adjusted) threshold baseline.
    pub fn theta_base(&self) -> f64 {
        self.theta_base
    }

    /// Spike ticks of the most recent run.
    pub fn spike_ticks(&self) -> &[Tick] {
        &self.spike_ticks
    }

    pub fn spike_times(&self) -> Vec<f64> {
        self.spike_ticks
            .iter()
            .map(|&t| self.time.tick_to_sec(t))
            .collect()
    }

    /// Number of completed passes over a signal.
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Normalize, robust-standardize, clip, and rectify the signal into a drive current.
    pub fn drive_current(&self, signal: &[f64]) -> Vec<f64> {
        let Some((lo, hi)) = stats::min_max(signal) else {
            return Vec::new();
        };
        let span = hi - lo;
        let norm: Vec<f64> = if span > 0.0 {
            signal.iter().map(|&x| (x - lo) / (span + NORM_EPS)).collect()
        } else {
            signal.iter().map(|&x| x - lo).collect()
        };

        let center = stats::median(&norm);
        let spread = stats::median_abs_deviation(&norm, center) + MAD_EPS;
        let gain = self.config.gain;
        let dead_zone = self.config.dead_zone;
        norm.iter()
            .map(|&x| {
                let z = ((x - center) / spread).clamp(Z_MIN, Z_MAX);
                gain * (z - dead_zone).max(0.0)
            })
            .collect()
    }

    /// Simulate the neuron over the whole signal.
    ///
    /// Membrane and threshold traces start fresh; the spike history used by
    /// homeostasis is rebuilt from scratch, while the threshold baseline
    /// continues from wherever the previous run left it.
    pub fn run(&mut self, signal: &[f64]) -> DetectorTrace {
        let n = signal.len();
        let cfg = self.config.clone();
        let current = self.drive_current(signal);
        let mut v = vec![cfg.v_rest; n];
        let mut theta = vec![self.theta_base; n];
        let mut spikes = vec![false; n];
        let mut homeostasis = Vec::new();
        self.spike_ticks.clear();

        let dt = self.time.dt();
        let refractory_s = cfg.refractory_s();
        let window = self
            .time
            .sec_to_samples_floor(cfg.homeo_window_s)
            .max(1);
        let mut last_spike_s: Option<f64> = None;

        for t in 0..n.saturating_sub(1) {
            v[t + 1] = v[t] + dt * (-(v[t] - cfg.v_rest) / cfg.tau_m + current[t]);

            let now_s = self.time.tick_to_sec(t as Tick);
            let refractory = last_spike_s.is_some_and(|s| now_s - s < refractory_s);
            if !refractory && v[t + 1] >= theta[t] {
                spikes[t + 1] = true;
                v[t + 1] = cfg.v_reset;
                theta[t + 1] = theta[t] + cfg.theta_inc;
                last_spike_s = Some(now_s);
                self.spike_ticks.push((t + 1) as Tick);
            } else {
                let relax = dt * (-(theta[t] - self.theta_base) / cfg.tau_theta);
                theta[t + 1] = (theta[t] + relax).max(cfg.theta_base_min);
            }

            if t > 0 && t % window == 0 {
                homeostasis.push(self.homeostatic_update((t + 1) as Tick));
            }
        }

        self.runs += 1;
        DetectorTrace {
            current,
            v,
            theta,
            spikes,
            homeostasis,
        }
    }

    fn homeostatic_update(&mut self, now: Tick) -> HomeostasisUpdate {
        let window_s = self.config.homeo_window_s;
        let since_s = self.time.tick_to_sec(now) - window_s;
        let recent = self
            .spike_ticks
            .iter()
            .filter(|&&s| self.time.tick_to_sec(s) >= since_s)
            .count();
        let rate_hz = recent as f64 / window_s;
        // Firing above target raises the baseline, firing below lowers it.
        let delta = self.config.homeo_rate * (rate_hz - self.config.target_rate_hz);
        self.theta_base = (self.theta_base + delta)
            .clamp(self.config.theta_base_min, self.config.theta_base_max);
        debug!(
            tick = now,
            rate_hz,
            theta_base = self.theta_base,
            "detector homeostasis"
        );
        HomeostasisUpdate {
            tick: now,
            rate_hz,
            theta_base: self.theta_base,
        }
    }
}
