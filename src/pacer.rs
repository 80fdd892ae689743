//! Single-chamber ventricular demand pacing (VVI).
//!
//! The controller consumes one detector flag per sample. Sensing is gated by a
//! post-pace blanking window and a post-sense refractory window; a pace is
//! delivered whenever the escape interval elapses without a qualifying event.
//! All timing is kept in ticks so that window edges are exact.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::timebase::{Tick, Timebase};
use crate::error::{self, ConfigResult};

/// Logistic steepness of the capture model (per mV).
pub const CAPTURE_STEEPNESS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PacingMode {
    /// Ventricle paced, ventricle sensed, inhibited on sense.
    #[default]
    #[serde(rename = "VVI")]
    Vvi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacerConfig {
    pub mode: PacingMode,
    pub lower_rate_bpm: f64,
    pub blanking_ms: f64,
    pub refractory_ms: f64,
    pub pulse_amplitude_mv: f64,
    pub pulse_width_ms: f64,
    pub capture_threshold_mv: f64,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            mode: PacingMode::Vvi,
            lower_rate_bpm: 50.0,
            blanking_ms: 40.0,
            refractory_ms: 200.0,
            pulse_amplitude_mv: 2.5,
            pulse_width_ms: 0.5,
            capture_threshold_mv: 1.1,
        }
    }
}

impl PacerConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        error::positive("pacer.lower_rate_bpm", self.lower_rate_bpm)?;
        error::non_negative("pacer.blanking_ms", self.blanking_ms)?;
        error::non_negative("pacer.refractory_ms", self.refractory_ms)?;
        error::non_negative("pacer.pulse_amplitude_mv", self.pulse_amplitude_mv)?;
        error::non_negative("pacer.pulse_width_ms", self.pulse_width_ms)?;
        error::finite("pacer.capture_threshold_mv", self.capture_threshold_mv)?;
        Ok(())
    }

    pub fn escape_interval_s(&self) -> f64 {
        60.0 / self.lower_rate_bpm
    }

    pub fn pulse_width_s(&self) -> f64 {
        self.pulse_width_ms / 1000.0
    }
}

/// Probability that a pulse of `amplitude_mv` captures the myocardium.
pub fn capture_probability(amplitude_mv: f64, threshold_mv: f64) -> f64 {
    1.0 / (1.0 + (-CAPTURE_STEEPNESS * (amplitude_mv - threshold_mv)).exp())
}

/// Where the controller sits at a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PacerPhase {
    /// Just paced; sensing disabled.
    Blanked,
    /// Just sensed; new senses are duplicates.
    Refractory,
    /// Sensing enabled, escape interval still running.
    Idle,
    /// Sensing enabled and the escape interval has elapsed.
    PaceDue,
}

impl PacerPhase {
    pub fn accepts_sense(self) -> bool {
        matches!(self, PacerPhase::Idle | PacerPhase::PaceDue)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaceEvent {
    pub tick: Tick,
    pub captured: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StepOutcome {
    pub pace: bool,
    pub captured: bool,
    pub accepted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControllerState {
    /// Tick of the last accepted sense or pace. The escape timer starts at 0.
    pub last_event: Tick,
    pub blank_until: Tick,
    pub refract_until: Tick,
    pub pacing_history: Vec<PaceEvent>,
    pub sensed_history: Vec<Tick>,
}

#[derive(Debug, Clone)]
pub struct PacingController {
    time: Timebase,
    config: PacerConfig,
    escape_ticks: Tick,
    blanking_ticks: Tick,
    refractory_ticks: Tick,
    state: ControllerState,
}

impl PacingController {
    pub fn new(time: Timebase, config: PacerConfig) -> ConfigResult<Self> {
        error::positive("sample_rate_hz", time.fs)?;
        config.validate()?;
        let escape_ticks = time.sec_to_tick(config.escape_interval_s()).max(1);
        let blanking_ticks = time.sec_to_tick(config.blanking_ms / 1000.0);
        let refractory_ticks = time.sec_to_tick(config.refractory_ms / 1000.0);
        Ok(Self {
            time,
            config,
            escape_ticks,
            blanking_ticks,
            refractory_ticks,
            state: ControllerState::default(),
        })
    }

    pub fn reset(&mut self) {
        self.state = ControllerState::default();
    }

    pub fn config(&self) -> &PacerConfig {
        &self.config
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn escape_ticks(&self) -> Tick {
        self.escape_ticks
    }

    pub fn blanking_ticks(&self) -> Tick {
        self.blanking_ticks
    }

    pub fn refractory_ticks(&self) -> Tick {
        self.refractory_ticks
    }

    /// Capture probability of the programmed pulse.
    pub fn capture_probability(&self) -> f64 {
        capture_probability(
            self.config.pulse_amplitude_mv,
            self.config.capture_threshold_mv,
        )
    }

    pub fn pacing_times(&self) -> Vec<f64> {
        self.state
            .pacing_history
            .iter()
            .map(|p| self.time.tick_to_sec(p.tick))
            .collect()
    }

    pub fn sensed_times(&self) -> Vec<f64> {
        self.state
            .sensed_history
            .iter()
            .map(|&t| self.time.tick_to_sec(t))
            .collect()
    }

    fn escape_elapsed(&self, tick: Tick) -> bool {
        tick.saturating_sub(self.state.last_event) >= self.escape_ticks
    }

    pub fn phase_at(&self, tick: Tick) -> PacerPhase {
        if tick < self.state.blank_until {
            PacerPhase::Blanked
        } else if tick < self.state.refract_until {
            PacerPhase::Refractory
        } else if self.escape_elapsed(tick) {
            PacerPhase::PaceDue
        } else {
            PacerPhase::Idle
        }
    }

    /// Advance one sample: sense handling first, then the pace decision.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        tick: Tick,
        detector_spike: bool,
        rng: &mut R,
    ) -> StepOutcome {
        let mut outcome = StepOutcome::default();

        if detector_spike && self.phase_at(tick).accepts_sense() {
            self.accept_sense(tick);
            outcome.accepted = true;
        }

        // Blanking gates sensing only; the escape deadline is always honored.
        if self.escape_elapsed(tick) {
            outcome.pace = true;
            outcome.captured = self.deliver_pace(tick, rng);
        }

        outcome
    }

    fn accept_sense(&mut self, tick: Tick) {
        self.state.sensed_history.push(tick);
        self.state.last_event = tick;
        self.state.refract_until = self
            .state
            .refract_until
            .max(tick.saturating_add(self.refractory_ticks));
    }

    fn deliver_pace<R: Rng + ?Sized>(&mut self, tick: Tick, rng: &mut R) -> bool {
        self.state.last_event = tick;
        self.state.blank_until = self
            .state
            .blank_until
            .max(tick.saturating_add(self.blanking_ticks));
        let p = self.capture_probability();
        let captured = rng.random_bool(p);
        self.state.pacing_history.push(PaceEvent { tick, captured });
        debug!(tick, p, captured, "pace delivered");
        captured
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const FS: f64 = 250.0;

    fn controller(config: PacerConfig) -> PacingController {
        PacingController::new(Timebase::new(FS), config).expect("valid config")
    }

    #[test]
    fn tick_conversions_from_defaults() {
        let pc = controller(PacerConfig::default());
        assert_eq!(pc.escape_ticks(), 300);
        assert_eq!(pc.blanking_ticks(), 10);
        assert_eq!(pc.refractory_ticks(), 50);
    }

    #[test]
    fn asystole_paces_every_escape_interval() {
        let mut pc = controller(PacerConfig::default());
        let mut rng = StdRng::seed_from_u64(1);
        for tick in 0..5000 {
            pc.step(tick, false, &mut rng);
        }
        let ticks: Vec<Tick> = pc.state().pacing_history.iter().map(|p| p.tick).collect();
        assert_eq!(ticks.len(), 16);
        assert_eq!(ticks[0], 300);
        assert!(ticks.windows(2).all(|w| w[1] - w[0] == 300));
        assert!(pc.state().sensed_history.is_empty());
    }

    #[test]
    fn regular_senses_inhibit_pacing() {
        let mut pc = controller(PacerConfig::default());
        let mut rng = StdRng::seed_from_u64(2);
        let mut accepted = 0;
        for tick in 0..5000 {
            let out = pc.step(tick, tick % 200 == 50, &mut rng);
            assert!(!out.pace, "paced at {tick}");
            accepted += out.accepted as usize;
        }
        assert_eq!(accepted, 25);
        assert_eq!(pc.state().sensed_history.len(), 25);
    }

    #[test]
    fn blanking_hides_pace_artifact() {
        let mut pc = controller(PacerConfig::default());
        let mut rng = StdRng::seed_from_u64(3);
        for tick in 0..300 {
            pc.step(tick, false, &mut rng);
        }
        let out = pc.step(300, false, &mut rng);
        assert!(out.pace);
        assert_eq!(pc.phase_at(305), PacerPhase::Blanked);
        let out = pc.step(305, true, &mut rng);
        assert!(!out.accepted);
        assert_eq!(pc.phase_at(310), PacerPhase::Idle);
        let out = pc.step(310, true, &mut rng);
        assert!(out.accepted);
        assert_eq!(pc.state().sensed_history, vec![310]);
    }

    #[test]
    fn refractory_rejects_duplicate_senses() {
        let mut pc = controller(PacerConfig::default());
        let mut rng = StdRng::seed_from_u64(4);
        assert!(pc.step(100, true, &mut rng).accepted);
        assert_eq!(pc.phase_at(120), PacerPhase::Refractory);
        assert!(!pc.step(120, true, &mut rng).accepted);
        assert!(!pc.step(149, true, &mut rng).accepted);
        assert!(pc.step(150, true, &mut rng).accepted);
        assert_eq!(pc.state().sensed_history, vec![100, 150]);
        assert_eq!(pc.state().last_event, 150);
    }

    #[test]
    fn phase_reaches_pace_due_after_escape() {
        let pc = controller(PacerConfig::default());
        assert_eq!(pc.phase_at(0), PacerPhase::Idle);
        assert_eq!(pc.phase_at(299), PacerPhase::Idle);
        assert_eq!(pc.phase_at(300), PacerPhase::PaceDue);
        assert!(PacerPhase::PaceDue.accepts_sense());
        assert!(!PacerPhase::Blanked.accepts_sense());
    }

    #[test]
    fn sense_on_escape_deadline_inhibits_pace() {
        // The sense restarts the escape timer before the pace decision runs.
        let mut pc = controller(PacerConfig::default());
        let mut rng = StdRng::seed_from_u64(5);
        let out = pc.step(300, true, &mut rng);
        assert!(out.accepted);
        assert!(!out.pace);
    }

    #[test]
    fn capture_probability_is_monotonic() {
        let threshold = 1.1;
        let mut prev = 0.0;
        for k in 0..60 {
            let amp = k as f64 * 0.1;
            let p = capture_probability(amp, threshold);
            assert!(p > prev, "p({amp}) = {p} not above {prev}");
            assert!((0.0..=1.0).contains(&p));
            prev = p;
        }
        assert!((capture_probability(threshold, threshold) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn capture_follows_amplitude_extremes() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut strong = controller(PacerConfig {
            pulse_amplitude_mv: 12.0,
            ..PacerConfig::default()
        });
        let mut weak = controller(PacerConfig {
            pulse_amplitude_mv: 0.0,
            capture_threshold_mv: 12.0,
            ..PacerConfig::default()
        });
        for tick in 0..3000 {
            strong.step(tick, false, &mut rng);
            weak.step(tick, false, &mut rng);
        }
        assert!(strong.state().pacing_history.iter().all(|p| p.captured));
        assert!(weak.state().pacing_history.iter().all(|p| !p.captured));
    }

    #[test]
    fn reset_clears_state() {
        let mut pc = controller(PacerConfig::default());
        let mut rng = StdRng::seed_from_u64(7);
        for tick in 0..1000 {
            pc.step(tick, tick == 40, &mut rng);
        }
        assert!(pc.state().blank_until > 0);
        pc.reset();
        assert_eq!(pc.state(), &ControllerState::default());
    }

    #[test]
    fn rejects_invalid_config() {
        let tb = Timebase::new(FS);
        let zero_rate = PacerConfig {
            lower_rate_bpm: 0.0,
            ..PacerConfig::default()
        };
        assert!(PacingController::new(tb, zero_rate).is_err());
        let nan_threshold = PacerConfig {
            capture_threshold_mv: f64::NAN,
            ..PacerConfig::default()
        };
        assert!(PacingController::new(tb, nan_threshold).is_err());
    }

    #[test]
    fn mode_tag_round_trips() {
        let text = toml::to_string(&PacerConfig::default()).expect("serialize");
        assert!(text.contains("mode = \"VVI\""));
        let bad = "mode = \"DDD\"";
        assert!(toml::from_str::<PacerConfig>(bad).is_err());
    }
}
