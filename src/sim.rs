//! Closed-loop orchestration: signal -> detector -> pacer -> artifact -> detector.
//!
//! A captured pace changes the substrate the detector sees, so the artifact is
//! written into the observed signal and the detector is re-run over the whole
//! updated signal before the loop moves to the next sample.

use std::fmt;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::timebase::{Tick, Timebase};
use crate::detector::{AdaptiveThresholdDetector, DetectorConfig, DetectorTrace};
use crate::error::{self, ConfigResult};
use crate::pacer::{ControllerState, PacerConfig, PacingController};
use crate::signal::{EcgConfig, FilterConfig, SignalFilter, SignalSource, SyntheticEcg};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "RunConfig::default_duration_s")]
    pub duration_s: f64,
    #[serde(default = "RunConfig::default_sample_rate_hz")]
    pub sample_rate_hz: f64,
    #[serde(default = "RunConfig::default_seed")]
    pub seed: u64,
    /// Peak of the ramp written into the observed signal by a captured pace.
    #[serde(default = "RunConfig::default_artifact_amplitude")]
    pub artifact_amplitude: f64,
}

impl RunConfig {
    fn default_duration_s() -> f64 {
        20.0
    }
    fn default_sample_rate_hz() -> f64 {
        250.0
    }
    fn default_seed() -> u64 {
        7
    }
    fn default_artifact_amplitude() -> f64 {
        0.9
    }

    pub fn validate(&self) -> ConfigResult<()> {
        error::positive("simulation.duration_s", self.duration_s)?;
        error::positive("simulation.sample_rate_hz", self.sample_rate_hz)?;
        error::finite("simulation.artifact_amplitude", self.artifact_amplitude)?;
        Ok(())
    }

    pub fn timebase(&self) -> Timebase {
        Timebase::new(self.sample_rate_hz)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            duration_s: Self::default_duration_s(),
            sample_rate_hz: Self::default_sample_rate_hz(),
            seed: Self::default_seed(),
            artifact_amplitude: Self::default_artifact_amplitude(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub signal: EcgConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub pacer: PacerConfig,
}

impl SimConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.run.validate()?;
        self.signal.validate()?;
        self.filter.validate(self.run.sample_rate_hz)?;
        self.detector.validate()?;
        self.pacer.validate()?;
        Ok(())
    }
}

/// Counts for a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub intrinsic_beats: usize,
    pub detector_spikes: usize,
    pub paced: usize,
    pub captured: usize,
    pub capture_rate: Option<f64>,
    pub sensed: usize,
    pub detector_runs: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Intrinsic beats generated: {}", self.intrinsic_beats)?;
        writeln!(f, "Detector spikes (final pass): {}", self.detector_spikes)?;
        writeln!(f, "Paced pulses delivered: {}", self.paced)?;
        writeln!(f, "Pacing captures: {}", self.captured)?;
        if let Some(rate) = self.capture_rate {
            writeln!(f, "Capture rate: {:.1}%", 100.0 * rate)?;
        }
        writeln!(f, "Senses accepted by controller: {}", self.sensed)?;
        write!(f, "Detector passes: {}", self.detector_runs)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub sample_rate_hz: f64,
    pub t: Vec<f64>,
    /// Filtered substrate before any pacing artifact.
    pub intrinsic: Vec<f64>,
    /// Substrate with every captured-pace artifact added.
    pub observed: Vec<f64>,
    /// Onsets of generated intrinsic beats; empty for externally supplied signals.
    pub beat_ticks: Vec<Tick>,
    /// Detector output of the last pass over `observed`.
    pub detector: DetectorTrace,
    pub spike_times: Vec<f64>,
    pub paced_times: Vec<f64>,
    pub captured_times: Vec<f64>,
    pub sensed_times: Vec<f64>,
    pub theta_base: f64,
    pub detector_runs: usize,
    pub controller: ControllerState,
}

impl SimulationReport {
    pub fn summary(&self) -> Summary {
        let paced = self.paced_times.len();
        let captured = self.captured_times.len();
        Summary {
            intrinsic_beats: self.beat_ticks.len(),
            detector_spikes: self.detector.spike_count(),
            paced,
            captured,
            capture_rate: (paced > 0).then(|| captured as f64 / paced as f64),
            sensed: self.sensed_times.len(),
            detector_runs: self.detector_runs,
        }
    }
}

pub struct ClosedLoopSimulator {
    config: SimConfig,
    time: Timebase,
    source: SyntheticEcg,
    filter: Box<dyn SignalFilter>,
    detector: AdaptiveThresholdDetector,
    controller: PacingController,
}

impl ClosedLoopSimulator {
    pub fn new(config: SimConfig) -> ConfigResult<Self> {
        config.validate()?;
        let time = config.run.timebase();
        let source = SyntheticEcg::new(config.signal.clone())?;
        let filter = config.filter.build(time.fs)?;
        let detector = AdaptiveThresholdDetector::new(time, config.detector.clone())?;
        let controller = PacingController::new(time, config.pacer.clone())?;
        Ok(Self {
            config,
            time,
            source,
            filter,
            detector,
            controller,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn timebase(&self) -> Timebase {
        self.time
    }

    pub fn run(&self) -> SimulationReport {
        self.run_with_seed(self.config.run.seed)
    }

    /// Generates the built-in synthetic ECG and closes the loop over it.
    pub fn run_with_seed(&self, seed: u64) -> SimulationReport {
        let mut rng = StdRng::seed_from_u64(seed);
        let substrate = self
            .source
            .synthesize(&self.time, self.config.run.duration_s, &mut rng);
        let intrinsic = self.filter.apply(&substrate.samples);
        let mut report = self.close_loop(intrinsic, &mut rng);
        report.beat_ticks = substrate.beat_ticks;
        report
    }

    /// Closes the loop over any signal source; the same RNG drives generation
    /// and capture draws.
    pub fn run_with_source<S: SignalSource>(&self, source: &S, seed: u64) -> SimulationReport {
        let mut rng = StdRng::seed_from_u64(seed);
        let raw = source.generate(&self.time, self.config.run.duration_s, &mut rng);
        let intrinsic = self.filter.apply(&raw);
        self.close_loop(intrinsic, &mut rng)
    }

    /// Closes the loop over an already filtered signal.
    pub fn run_on_signal(&self, intrinsic: Vec<f64>, seed: u64) -> SimulationReport {
        let mut rng = StdRng::seed_from_u64(seed);
        self.close_loop(intrinsic, &mut rng)
    }

    fn artifact_width(&self) -> usize {
        self.time
            .sec_to_samples_floor(self.config.pacer.pulse_width_s())
            .max(1)
    }

    fn close_loop(&self, intrinsic: Vec<f64>, rng: &mut StdRng) -> SimulationReport {
        let n = intrinsic.len();
        let mut detector = self.detector.clone();
        let mut controller = self.controller.clone();
        let width = self.artifact_width();
        let amplitude = self.config.run.artifact_amplitude;

        info!(
            samples = n,
            fs = self.time.fs,
            escape_ticks = controller.escape_ticks(),
            "closed loop start"
        );

        let mut observed = intrinsic.clone();
        let mut trace = detector.run(&observed);
        let mut paced = Vec::new();
        let mut captured = Vec::new();
        let mut sensed = Vec::new();

        for i in 0..n {
            let tick = i as Tick;
            let outcome = controller.step(tick, trace.spikes[i], rng);
            if outcome.accepted {
                sensed.push(tick);
            }
            if outcome.pace {
                paced.push(tick);
            }
            if outcome.pace && outcome.captured {
                captured.push(tick);
                inject_artifact(&mut observed, i, width, amplitude);
                trace = detector.run(&observed);
                debug!(
                    tick,
                    spikes = trace.spike_count(),
                    theta_base = detector.theta_base(),
                    "detector re-run after capture"
                );
            }
        }

        let to_secs = |ticks: &[Tick]| -> Vec<f64> {
            ticks.iter().map(|&t| self.time.tick_to_sec(t)).collect()
        };
        let report = SimulationReport {
            sample_rate_hz: self.time.fs,
            t: self.time.time_axis(n),
            intrinsic,
            observed,
            beat_ticks: Vec::new(),
            spike_times: detector.spike_times(),
            paced_times: to_secs(&paced),
            captured_times: to_secs(&captured),
            sensed_times: to_secs(&sensed),
            theta_base: detector.theta_base(),
            detector_runs: detector.runs(),
            controller: controller.state().clone(),
            detector: trace,
        };
        info!(
            paced = paced.len(),
            captured = captured.len(),
            sensed = sensed.len(),
            detector_runs = report.detector_runs,
            "closed loop done"
        );
        report
    }
}

/// Adds a linear ramp-down artifact starting at `start`, truncated at the end of the signal.
pub fn inject_artifact(observed: &mut [f64], start: usize, width: usize, amplitude: f64) {
    let width = width.max(1);
    for (j, x) in observed.iter_mut().skip(start).take(width).enumerate() {
        *x += amplitude * (1.0 - j as f64 / width as f64);
    }
}

/// One full run with the default signal and filter settings.
pub fn run(
    duration_s: f64,
    sample_rate_hz: f64,
    intrinsic_rate_bpm: f64,
    detector: DetectorConfig,
    pacer: PacerConfig,
    seed: u64,
) -> ConfigResult<SimulationReport> {
    let config = SimConfig {
        run: RunConfig {
            duration_s,
            sample_rate_hz,
            seed,
            ..RunConfig::default()
        },
        signal: EcgConfig {
            heart_rate_bpm: intrinsic_rate_bpm,
            ..EcgConfig::default()
        },
        filter: FilterConfig::default(),
        detector,
        pacer,
    };
    Ok(ClosedLoopSimulator::new(config)?.run())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_ramps_down_and_truncates() {
        let mut x = vec![0.0; 6];
        inject_artifact(&mut x, 2, 4, 0.8);
        assert_eq!(x[..2], [0.0, 0.0]);
        assert!((x[2] - 0.8).abs() < 1e-12);
        assert!((x[3] - 0.6).abs() < 1e-12);
        assert!((x[5] - 0.2).abs() < 1e-12);

        let mut tail = vec![0.0; 3];
        inject_artifact(&mut tail, 2, 10, 1.0);
        assert_eq!(tail, vec![0.0, 0.0, 1.0]);
        inject_artifact(&mut tail, 7, 2, 1.0);
        assert_eq!(tail, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn default_pulse_width_is_one_sample() {
        let sim = ClosedLoopSimulator::new(SimConfig::default()).unwrap();
        assert_eq!(sim.artifact_width(), 1);
    }

    #[test]
    fn sub_sample_duration_gives_an_empty_report() {
        let report = run(
            0.001,
            250.0,
            60.0,
            DetectorConfig::default(),
            PacerConfig::default(),
            1,
        )
        .expect("positive duration is valid");
        assert!(report.t.is_empty());
        assert!(report.observed.is_empty());
        assert!(report.detector.is_empty());
        assert!(report.paced_times.is_empty());
        assert!(report.sensed_times.is_empty());
        assert_eq!(report.detector_runs, 1);
        assert_eq!(report.summary().capture_rate, None);
    }

    #[test]
    fn summary_reports_capture_rate() {
        let sim = ClosedLoopSimulator::new(SimConfig {
            signal: EcgConfig::clean(0.0),
            filter: FilterConfig::disabled(),
            run: RunConfig {
                duration_s: 5.0,
                ..RunConfig::default()
            },
            ..SimConfig::default()
        })
        .unwrap();
        let report = sim.run();
        let summary = report.summary();
        assert_eq!(summary.paced, 4);
        assert_eq!(summary.intrinsic_beats, 0);
        let rate = summary.capture_rate.expect("paced at least once");
        assert_eq!(rate, summary.captured as f64 / 4.0);
        assert_eq!(summary.detector_runs, 1 + summary.captured);
        assert!(summary.to_string().contains("Paced pulses delivered: 4"));
    }
}
