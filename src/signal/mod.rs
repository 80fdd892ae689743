//! Signal substrate for the loop: a sampled source and a smoothing filter.
//!
//! The simulator only depends on the two traits below; `SyntheticEcg` and
//! `ButterworthBandpass` are the implementations it ships with.

pub mod ecg;
pub mod filter;

use rand::Rng;

use crate::core::timebase::Timebase;

pub use ecg::{EcgConfig, SyntheticEcg, SyntheticTrace};
pub use filter::{ButterworthBandpass, FilterConfig, Passthrough};

/// Produces a fixed-rate real-valued signal covering `[0, duration_s)`.
pub trait SignalSource {
    fn generate<R: Rng + ?Sized>(
        &self,
        time: &Timebase,
        duration_s: f64,
        rng: &mut R,
    ) -> Vec<f64>;
}

/// Length-preserving smoothing operator applied to a whole signal.
pub trait SignalFilter: std::fmt::Debug {
    fn apply(&self, samples: &[f64]) -> Vec<f64>;
}
