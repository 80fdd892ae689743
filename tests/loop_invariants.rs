use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pacesim::core::timebase::{Tick, Timebase};
use pacesim::detector::DetectorConfig;
use pacesim::pacer::{PacerConfig, PacingController};
use pacesim::signal::EcgConfig;
use pacesim::sim::{self, ClosedLoopSimulator, RunConfig, SimConfig};

#[test]
fn controller_timers_never_move_backwards() {
    let mut pc = PacingController::new(Timebase::new(250.0), PacerConfig::default()).unwrap();
    let mut spikes = StdRng::seed_from_u64(21);
    let mut capture = StdRng::seed_from_u64(22);
    let mut prev = pc.state().clone();
    for tick in 0..20_000 as Tick {
        let spike = spikes.random_bool(0.02);
        pc.step(tick, spike, &mut capture);
        let state = pc.state();
        assert!(state.blank_until >= prev.blank_until, "tick {tick}");
        assert!(state.refract_until >= prev.refract_until, "tick {tick}");
        assert!(state.last_event >= prev.last_event, "tick {tick}");
        assert!(tick - state.last_event < pc.escape_ticks(), "tick {tick}");
        prev = state.clone();
    }
}

#[test]
fn final_spike_train_respects_detector_refractory() {
    let detector = DetectorConfig::default();
    let report =
        sim::run(30.0, 250.0, 70.0, detector.clone(), PacerConfig::default(), 4).unwrap();
    let min_gap = detector.refractory_s() - 1e-9;
    for pair in report.spike_times.windows(2) {
        assert!(pair[1] - pair[0] >= min_gap, "spikes {pair:?}");
    }
    assert_eq!(report.spike_times.len(), report.detector.spike_count());
}

#[test]
fn threshold_stays_above_floor_and_baseline_in_bounds() {
    let detector = DetectorConfig {
        homeo_rate: 0.05,
        homeo_window_s: 1.0,
        ..DetectorConfig::default()
    };
    for rate in [0.0, 40.0, 120.0] {
        let report =
            sim::run(20.0, 250.0, rate, detector.clone(), PacerConfig::default(), 8).unwrap();
        assert!(
            report
                .detector
                .theta
                .iter()
                .all(|&th| th >= detector.theta_base_min),
            "rate {rate}"
        );
        assert!(report.theta_base >= detector.theta_base_min);
        assert!(report.theta_base <= detector.theta_base_max);
        for update in &report.detector.homeostasis {
            assert!(update.theta_base >= detector.theta_base_min);
            assert!(update.theta_base <= detector.theta_base_max);
        }
    }
}

#[test]
fn same_seed_reproduces_the_run() {
    let config = SimConfig {
        signal: EcgConfig {
            heart_rate_bpm: 45.0,
            drop_prob: 0.2,
            ectopic_prob: 0.1,
            ..EcgConfig::default()
        },
        ..SimConfig::default()
    };
    let sim = ClosedLoopSimulator::new(config).unwrap();
    let a = sim.run_with_seed(17);
    let b = sim.run_with_seed(17);
    assert_eq!(a.observed, b.observed);
    assert_eq!(a.detector.spikes, b.detector.spikes);
    assert_eq!(a.paced_times, b.paced_times);
    assert_eq!(a.captured_times, b.captured_times);
    assert_eq!(a.sensed_times, b.sensed_times);
    assert_eq!(a.theta_base, b.theta_base);
}

#[test]
fn report_series_share_one_length() {
    let sim = ClosedLoopSimulator::new(SimConfig {
        run: RunConfig {
            duration_s: 7.3,
            ..RunConfig::default()
        },
        ..SimConfig::default()
    })
    .unwrap();
    let report = sim.run();
    let n = (7.3_f64 * 250.0).round() as usize;
    assert_eq!(report.t.len(), n);
    assert_eq!(report.intrinsic.len(), n);
    assert_eq!(report.observed.len(), n);
    assert_eq!(report.detector.len(), n);
    assert_eq!(report.detector.current.len(), n);

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["paced_times"].is_array());
    assert_eq!(json["detector"]["spikes"].as_array().map(Vec::len), Some(n));
}

#[test]
fn invalid_inputs_are_reported_before_running() {
    let run = |duration_s: f64, rate: f64, pacer: PacerConfig| {
        sim::run(duration_s, 250.0, rate, DetectorConfig::default(), pacer, 1)
    };
    assert!(run(0.0, 60.0, PacerConfig::default()).is_err());
    assert!(run(10.0, -5.0, PacerConfig::default()).is_err());
    let pacer = PacerConfig {
        lower_rate_bpm: 0.0,
        ..PacerConfig::default()
    };
    assert!(run(10.0, 60.0, pacer).is_err());
}
